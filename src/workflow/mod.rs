// Audit workflow - two-stage pipeline over a shared state object
pub mod error;
pub mod extraction;
pub mod graph;
pub mod judgment;
pub mod state;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AuditConfig;
use crate::indexer_client::VideoIndexer;
use crate::llm_client::CompletionModel;
use crate::rulebase::RuleRetriever;

pub use error::StageError;
pub use graph::{AuditGraph, AuditNode};
pub use state::{AuditPhase, AuditState, ErrorRecord};

use extraction::ExtractionNode;
use judgment::JudgmentNode;

/// Wires the collaborators into the audit graph and exposes the sole
/// entry point. One instance serves all audits; every run gets a
/// fresh state and fresh nodes.
pub struct AuditWorkflow {
    indexer: Arc<dyn VideoIndexer>,
    retriever: Arc<dyn RuleRetriever>,
    model: Arc<dyn CompletionModel>,
    config: AuditConfig,
}

impl AuditWorkflow {
    pub fn new(
        indexer: Arc<dyn VideoIndexer>,
        retriever: Arc<dyn RuleRetriever>,
        model: Arc<dyn CompletionModel>,
        config: AuditConfig,
    ) -> Self {
        Self {
            indexer,
            retriever,
            model,
            config,
        }
    }

    /// Run one audit to a terminal state. Blocking from the caller's
    /// point of view; `cancel` propagates a caller disconnect down to
    /// whichever external call is currently waiting.
    pub async fn run_audit(&self, video_url: &str, cancel: CancellationToken) -> AuditState {
        let graph = AuditGraph::new(vec![
            Arc::new(ExtractionNode::new(
                self.indexer.clone(),
                self.config.poll_interval,
                self.config.extraction_timeout,
                cancel,
            )),
            Arc::new(JudgmentNode::new(
                self.retriever.clone(),
                self.model.clone(),
                self.config.retrieval_top_k,
            )),
        ]);

        graph.run(AuditState::new(video_url)).await
    }
}
