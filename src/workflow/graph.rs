// AuditGraph - linear node sequence with first-error-wins short-circuit
use super::state::{AuditPhase, AuditState};
use async_trait::async_trait;
use std::sync::Arc;

/// A single pipeline stage over the shared state. Nodes take the state
/// by value and hand it back, writing only the fields they own; a node
/// that cannot complete its contract records an error on the state and
/// never panics past the graph boundary.
#[async_trait]
pub trait AuditNode: Send + Sync {
    fn name(&self) -> &'static str;
    fn phase(&self) -> AuditPhase;
    async fn run(&self, state: AuditState) -> AuditState;
}

/// The workflow graph: a fixed node sequence plus one rule, evaluated
/// after every node rather than at fixed points - once `state.error`
/// is set, no further node executes. Nodes added later inherit the
/// short-circuit without extra bookkeeping.
pub struct AuditGraph {
    nodes: Vec<Arc<dyn AuditNode>>,
}

impl AuditGraph {
    pub fn new(nodes: Vec<Arc<dyn AuditNode>>) -> Self {
        Self { nodes }
    }

    /// Run the graph to a terminal state. Always returns the state,
    /// success or error, never an unhandled fault.
    pub async fn run(&self, mut state: AuditState) -> AuditState {
        tracing::info!(audit_id = %state.audit_id, url = %state.video_url, "starting audit");

        for node in &self.nodes {
            if state.has_error() {
                break;
            }
            state.enter_stage(node.name(), node.phase());
            tracing::info!(audit_id = %state.audit_id, stage = node.name(), "entering stage");
            state = node.run(state).await;
        }

        state.mark_terminal();
        match &state.error {
            Some(err) => tracing::warn!(
                audit_id = %state.audit_id,
                stage = %err.stage,
                recoverable = err.recoverable,
                "audit finished with error: {}",
                err.message
            ),
            None => tracing::info!(audit_id = %state.audit_id, "✅ audit completed"),
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::AuditVerdict;
    use crate::workflow::error::StageError;

    struct FailingNode;

    #[async_trait]
    impl AuditNode for FailingNode {
        fn name(&self) -> &'static str {
            "extraction"
        }
        fn phase(&self) -> AuditPhase {
            AuditPhase::Extracting
        }
        async fn run(&self, mut state: AuditState) -> AuditState {
            state.record_error(StageError::ExtractionTimeout { timeout_secs: 1 });
            state
        }
    }

    struct VerdictNode;

    #[async_trait]
    impl AuditNode for VerdictNode {
        fn name(&self) -> &'static str {
            "judgment"
        }
        fn phase(&self) -> AuditPhase {
            AuditPhase::Judging
        }
        async fn run(&self, mut state: AuditState) -> AuditState {
            state.verdict = Some(AuditVerdict {
                violations: vec![],
                overall_compliant: true,
            });
            state
        }
    }

    #[tokio::test]
    async fn error_short_circuits_later_nodes() {
        let graph = AuditGraph::new(vec![Arc::new(FailingNode), Arc::new(VerdictNode)]);
        let state = graph.run(AuditState::new("https://example.com/v")).await;

        // judgment must never execute once an error is set
        assert_eq!(state.stage_trace, vec!["extraction"]);
        assert!(state.verdict.is_none());
        assert!(state.error.is_some());
        assert_eq!(state.phase, AuditPhase::DoneError);
    }

    #[tokio::test]
    async fn clean_run_reaches_success_terminal() {
        let graph = AuditGraph::new(vec![Arc::new(VerdictNode)]);
        let state = graph.run(AuditState::new("https://example.com/v")).await;

        assert!(state.verdict.is_some());
        assert!(state.error.is_none());
        assert_eq!(state.phase, AuditPhase::DoneSuccess);
    }
}
