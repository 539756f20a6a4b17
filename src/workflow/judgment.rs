// Retrieval-and-judgment node: query, top-k search, prompt, parse
use std::sync::Arc;

use async_trait::async_trait;

use crate::llm_client::CompletionModel;
use crate::rulebase::{RuleChunk, RuleRetriever};
use crate::verdict;

use super::error::StageError;
use super::graph::AuditNode;
use super::state::{AuditPhase, AuditState};

/// Combines the extracted text into a retrieval query, grounds the
/// prompt in the top-k rule fragments, and parses the model's reply
/// into a verdict. Exactly one model call per audit; transient retry
/// belongs to the LLM client.
pub struct JudgmentNode {
    retriever: Arc<dyn RuleRetriever>,
    model: Arc<dyn CompletionModel>,
    top_k: usize,
}

impl JudgmentNode {
    pub fn new(
        retriever: Arc<dyn RuleRetriever>,
        model: Arc<dyn CompletionModel>,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            model,
            top_k,
        }
    }

    async fn judge(&self, state: &mut AuditState) -> Result<(), StageError> {
        // Graph sequencing guarantees extraction ran; empty strings
        // are legitimate (silent video, no overlays).
        let transcript = state.raw_transcript.clone().unwrap_or_default();
        let on_screen_text = state.on_screen_text.clone().unwrap_or_default();

        match build_query(&transcript, &on_screen_text) {
            Some(query) => {
                let rules = self
                    .retriever
                    .search(&query, self.top_k)
                    .await
                    .map_err(StageError::RetrievalFailed)?;
                tracing::info!(
                    audit_id = %state.audit_id,
                    chunks = rules.len(),
                    "retrieved rule context"
                );
                state.retrieved_rules = rules;
            }
            None => {
                // A video with no extractable text cannot be matched
                // against content rules; judgment still runs so the
                // audit terminates with a verdict instead of hanging.
                tracing::info!(audit_id = %state.audit_id, "no extractable text, skipping retrieval");
            }
        }

        let prompt = build_prompt(&state.retrieved_rules, &transcript, &on_screen_text);
        let raw = self
            .model
            .complete(&prompt, &verdict::response_schema())
            .await
            .map_err(StageError::ModelCompletionFailed)?;

        let parsed = verdict::parse_verdict(&raw).map_err(StageError::VerdictSchemaInvalid)?;
        tracing::info!(
            audit_id = %state.audit_id,
            violations = parsed.violations.len(),
            compliant = parsed.overall_compliant,
            "verdict accepted"
        );
        state.verdict = Some(parsed);
        Ok(())
    }
}

#[async_trait]
impl AuditNode for JudgmentNode {
    fn name(&self) -> &'static str {
        "judgment"
    }

    fn phase(&self) -> AuditPhase {
        AuditPhase::Judging
    }

    async fn run(&self, mut state: AuditState) -> AuditState {
        if let Err(e) = self.judge(&mut state).await {
            tracing::warn!(audit_id = %state.audit_id, "judgment failed: {}", e);
            state.record_error(e);
        }
        state
    }
}

/// Concatenated retrieval query, or None when the video yielded no
/// text at all (retrieval is skipped in that case).
fn build_query(transcript: &str, on_screen_text: &str) -> Option<String> {
    let query = format!("{}\n{}", transcript.trim(), on_screen_text.trim());
    let query = query.trim();
    if query.is_empty() {
        None
    } else {
        Some(query.to_string())
    }
}

fn build_prompt(rules: &[RuleChunk], transcript: &str, on_screen_text: &str) -> String {
    let mut prompt = String::from(
        "Audit the following video content for compliance against the rulebook excerpts \
         provided as grounding context. Report every violation you can substantiate from \
         the content, citing the rule it breaches.\n\n",
    );

    if rules.is_empty() {
        prompt.push_str(
            "## Rulebook context\nNo rules were retrieved. If the content below is empty or \
             insufficient to audit, return an empty violations list with a single \
             \"insufficient_content\" note only if a violation field would apply; otherwise \
             report the content as compliant.\n\n",
        );
    } else {
        prompt.push_str("## Rulebook context (ranked by relevance)\n");
        for (i, chunk) in rules.iter().enumerate() {
            prompt.push_str(&format!(
                "[{}] ({} / {})\n{}\n\n",
                i + 1,
                chunk.source_document,
                chunk.chunk_id,
                chunk.text
            ));
        }
    }

    prompt.push_str(&format!(
        "## Content under review\n### Spoken transcript\n{}\n\n### On-screen text\n{}\n\n",
        transcript, on_screen_text
    ));

    prompt.push_str(
        "## Output\nRespond with a single JSON object matching the mandated schema: \
         {\"violations\": [{\"category\", \"description\", \"severity\" (low|medium|high), \
         \"evidence\", \"rule_reference\"}], \"overall_compliant\": bool}. No other text.",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_none_when_both_texts_empty() {
        assert!(build_query("", "").is_none());
        assert!(build_query("  ", "\n").is_none());
        assert_eq!(build_query("hello", "").as_deref(), Some("hello"));
        assert_eq!(build_query("", "SALE").as_deref(), Some("SALE"));
    }

    #[test]
    fn prompt_embeds_rules_and_content() {
        let rules = vec![RuleChunk {
            text: "Health claims must be substantiated".to_string(),
            source_document: "brand_rules.pdf".to_string(),
            score: 0.91,
            chunk_id: "c-12".to_string(),
        }];

        let prompt = build_prompt(&rules, "This product cures all diseases", "BUY NOW");
        assert!(prompt.contains("Health claims must be substantiated"));
        assert!(prompt.contains("brand_rules.pdf"));
        assert!(prompt.contains("This product cures all diseases"));
        assert!(prompt.contains("BUY NOW"));
        assert!(prompt.contains("overall_compliant"));
    }

    #[test]
    fn prompt_without_rules_flags_insufficient_content() {
        let prompt = build_prompt(&[], "", "");
        assert!(prompt.contains("No rules were retrieved"));
    }
}
