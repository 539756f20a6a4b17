// End-to-end workflow tests over in-memory collaborator fakes
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use video_audit::config::AuditConfig;
use video_audit::indexer_client::{IndexingResult, IndexingStatus, VideoIndexer};
use video_audit::llm_client::CompletionModel;
use video_audit::rulebase::{RuleChunk, RuleRetriever};
use video_audit::workflow::{AuditPhase, AuditState, AuditWorkflow};

// ---- fakes ----------------------------------------------------------------

struct FakeIndexer {
    /// Statuses returned by successive poll_status calls; the last
    /// entry repeats forever.
    statuses: Vec<IndexingStatus>,
    result: IndexingResult,
    submit_error: Option<String>,
    polls: AtomicUsize,
}

impl FakeIndexer {
    fn completing(transcript: &str, on_screen_text: &str) -> Self {
        Self {
            statuses: vec![IndexingStatus::Pending, IndexingStatus::Complete],
            result: IndexingResult {
                transcript: transcript.to_string(),
                on_screen_text: on_screen_text.to_string(),
            },
            submit_error: None,
            polls: AtomicUsize::new(0),
        }
    }

    fn never_finishing() -> Self {
        Self {
            statuses: vec![IndexingStatus::Pending],
            result: IndexingResult {
                transcript: String::new(),
                on_screen_text: String::new(),
            },
            submit_error: None,
            polls: AtomicUsize::new(0),
        }
    }

    fn failing_with(reason: &str) -> Self {
        Self {
            statuses: vec![IndexingStatus::Failed {
                reason: reason.to_string(),
            }],
            result: IndexingResult {
                transcript: String::new(),
                on_screen_text: String::new(),
            },
            submit_error: None,
            polls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VideoIndexer for FakeIndexer {
    async fn submit(&self, _video_url: &str) -> Result<String, String> {
        match &self.submit_error {
            Some(e) => Err(e.clone()),
            None => Ok("job-1".to_string()),
        }
    }

    async fn poll_status(&self, _job_id: &str) -> Result<IndexingStatus, String> {
        let i = self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.statuses[i.min(self.statuses.len() - 1)].clone())
    }

    async fn fetch_result(&self, _job_id: &str) -> Result<IndexingResult, String> {
        Ok(self.result.clone())
    }
}

struct FakeRetriever {
    chunks: Result<Vec<RuleChunk>, String>,
    calls: AtomicUsize,
}

impl FakeRetriever {
    fn returning(chunks: Vec<RuleChunk>) -> Self {
        Self {
            chunks: Ok(chunks),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            chunks: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleRetriever for FakeRetriever {
    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<RuleChunk>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.chunks.clone()
    }
}

struct FakeModel {
    response: String,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl FakeModel {
    fn replying(response: &str) -> Self {
        Self {
            response: response.to_string(),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for FakeModel {
    async fn complete(
        &self,
        prompt: &str,
        _response_schema: &serde_json::Value,
    ) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.response.clone())
    }
}

// ---- helpers --------------------------------------------------------------

fn fast_config() -> AuditConfig {
    AuditConfig {
        poll_interval: Duration::from_millis(5),
        extraction_timeout: Duration::from_millis(50),
        ..AuditConfig::default()
    }
}

fn health_rule() -> RuleChunk {
    RuleChunk {
        text: "Health claims must be substantiated".to_string(),
        source_document: "brand_rules.pdf".to_string(),
        score: 0.93,
        chunk_id: "chunk-12".to_string(),
    }
}

const VIOLATION_VERDICT: &str = r#"{
    "violations": [{
        "category": "health_claim",
        "description": "Unsubstantiated claim that the product cures diseases",
        "severity": "high",
        "evidence": "This product cures all diseases",
        "rule_reference": "brand_rules.pdf#chunk-12"
    }],
    "overall_compliant": false
}"#;

const COMPLIANT_VERDICT: &str = r#"{"violations": [], "overall_compliant": true}"#;

fn assert_exactly_one_outcome(state: &AuditState) {
    assert!(
        state.verdict.is_some() != state.error.is_some(),
        "exactly one of verdict/error must be set, got verdict={:?} error={:?}",
        state.verdict,
        state.error
    );
    assert!(state.phase.is_terminal());
}

// ---- scenarios ------------------------------------------------------------

#[tokio::test]
async fn clean_pass_flags_health_claim() {
    let retriever = Arc::new(FakeRetriever::returning(vec![health_rule()]));
    let model = Arc::new(FakeModel::replying(VIOLATION_VERDICT));
    let workflow = AuditWorkflow::new(
        Arc::new(FakeIndexer::completing(
            "This product cures all diseases",
            "LIMITED OFFER",
        )),
        retriever.clone(),
        model.clone(),
        fast_config(),
    );

    let state = workflow
        .run_audit("https://example.com/ad", CancellationToken::new())
        .await;

    assert_exactly_one_outcome(&state);
    assert_eq!(state.phase, AuditPhase::DoneSuccess);
    assert_eq!(state.stage_trace, vec!["extraction", "judgment"]);
    assert_eq!(state.retrieved_rules, vec![health_rule()]);

    let verdict = state.verdict.unwrap();
    assert!(!verdict.overall_compliant);
    assert_eq!(verdict.violations.len(), 1);
    assert_eq!(verdict.violations[0].category, "health_claim");

    // the prompt grounded the model in both the rule and the content
    let prompt = model.last_prompt().unwrap();
    assert!(prompt.contains("Health claims must be substantiated"));
    assert!(prompt.contains("This product cures all diseases"));
    assert!(prompt.contains("LIMITED OFFER"));
    assert_eq!(retriever.call_count(), 1);
}

#[tokio::test]
async fn retrieval_outage_is_recoverable_and_skips_the_model() {
    let model = Arc::new(FakeModel::replying(COMPLIANT_VERDICT));
    let workflow = AuditWorkflow::new(
        Arc::new(FakeIndexer::completing("some speech", "")),
        Arc::new(FakeRetriever::failing("qdrant unreachable")),
        model.clone(),
        fast_config(),
    );

    let state = workflow
        .run_audit("https://example.com/v", CancellationToken::new())
        .await;

    assert_exactly_one_outcome(&state);
    let error = state.error.unwrap();
    assert_eq!(error.stage, "retrieval");
    assert!(error.recoverable);
    assert!(state.verdict.is_none());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn extraction_timeout_is_recoverable_and_judgment_never_runs() {
    let retriever = Arc::new(FakeRetriever::returning(vec![health_rule()]));
    let model = Arc::new(FakeModel::replying(COMPLIANT_VERDICT));
    let workflow = AuditWorkflow::new(
        Arc::new(FakeIndexer::never_finishing()),
        retriever.clone(),
        model.clone(),
        fast_config(),
    );

    let state = workflow
        .run_audit("https://example.com/v", CancellationToken::new())
        .await;

    assert_exactly_one_outcome(&state);
    let error = state.error.unwrap();
    assert_eq!(error.stage, "extraction");
    assert!(error.recoverable);

    // short-circuit: judgment never entered, nothing downstream ran
    assert_eq!(state.stage_trace, vec!["extraction"]);
    assert_eq!(retriever.call_count(), 0);
    assert_eq!(model.call_count(), 0);
    assert!(state.verdict.is_none());
}

#[tokio::test]
async fn invalid_input_failure_is_not_retryable() {
    let workflow = AuditWorkflow::new(
        Arc::new(FakeIndexer::failing_with("Unsupported URL: ftp://nope")),
        Arc::new(FakeRetriever::returning(vec![])),
        Arc::new(FakeModel::replying(COMPLIANT_VERDICT)),
        fast_config(),
    );

    let state = workflow
        .run_audit("ftp://nope", CancellationToken::new())
        .await;

    assert_exactly_one_outcome(&state);
    let error = state.error.unwrap();
    assert_eq!(error.stage, "extraction");
    assert!(!error.recoverable);
}

#[tokio::test]
async fn empty_content_skips_retrieval_but_still_terminates() {
    let retriever = Arc::new(FakeRetriever::returning(vec![health_rule()]));
    let model = Arc::new(FakeModel::replying(COMPLIANT_VERDICT));
    let workflow = AuditWorkflow::new(
        Arc::new(FakeIndexer::completing("", "")),
        retriever.clone(),
        model.clone(),
        fast_config(),
    );

    let state = workflow
        .run_audit("https://example.com/silent", CancellationToken::new())
        .await;

    assert_exactly_one_outcome(&state);
    assert_eq!(state.phase, AuditPhase::DoneSuccess);

    // extraction succeeded with empty-but-present text
    assert_eq!(state.raw_transcript.as_deref(), Some(""));
    assert_eq!(state.on_screen_text.as_deref(), Some(""));

    // no extractable text: retrieval skipped, judgment still reached
    assert_eq!(retriever.call_count(), 0);
    assert!(state.retrieved_rules.is_empty());
    assert_eq!(model.call_count(), 1);
    assert!(state.verdict.unwrap().overall_compliant);
}

#[tokio::test]
async fn schema_violation_is_a_final_judgment_error() {
    // missing overall_compliant
    let workflow = AuditWorkflow::new(
        Arc::new(FakeIndexer::completing("some speech", "")),
        Arc::new(FakeRetriever::returning(vec![health_rule()])),
        Arc::new(FakeModel::replying(r#"{"violations": []}"#)),
        fast_config(),
    );

    let state = workflow
        .run_audit("https://example.com/v", CancellationToken::new())
        .await;

    assert_exactly_one_outcome(&state);
    let error = state.error.unwrap();
    assert_eq!(error.stage, "judgment");
    assert!(!error.recoverable);
    assert!(state.verdict.is_none());
}

#[tokio::test]
async fn cancellation_stops_the_poll_loop() {
    let config = AuditConfig {
        poll_interval: Duration::from_millis(5),
        // long enough that only cancellation can end the loop quickly
        extraction_timeout: Duration::from_secs(30),
        ..AuditConfig::default()
    };
    let workflow = AuditWorkflow::new(
        Arc::new(FakeIndexer::never_finishing()),
        Arc::new(FakeRetriever::returning(vec![])),
        Arc::new(FakeModel::replying(COMPLIANT_VERDICT)),
        config,
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let state = workflow.run_audit("https://example.com/v", cancel).await;

    assert_exactly_one_outcome(&state);
    let error = state.error.unwrap();
    assert_eq!(error.stage, "extraction");
    assert!(error.recoverable);
    assert!(error.message.contains("cancelled"));
}

#[tokio::test]
async fn trace_grows_monotonically_across_stages() {
    let workflow = AuditWorkflow::new(
        Arc::new(FakeIndexer::completing("speech", "text")),
        Arc::new(FakeRetriever::returning(vec![health_rule()])),
        Arc::new(FakeModel::replying(COMPLIANT_VERDICT)),
        fast_config(),
    );

    let state = workflow
        .run_audit("https://example.com/v", CancellationToken::new())
        .await;

    // every stage entered exactly once, in pipeline order
    assert_eq!(state.stage_trace, vec!["extraction", "judgment"]);
    assert_exactly_one_outcome(&state);
}
