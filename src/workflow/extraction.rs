// Content extraction node: download, submit, poll to terminal, fetch
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::indexer_client::{IndexingStatus, VideoIndexer};
use crate::ytdlp_client::is_invalid_input_failure;

use super::error::StageError;
use super::graph::AuditNode;
use super::state::{AuditPhase, AuditState};

/// Drives the external indexing provider to completion and populates
/// the state with transcript and on-screen text. On success both
/// fields are set - empty strings are valid outcomes, never None.
pub struct ExtractionNode {
    indexer: Arc<dyn VideoIndexer>,
    poll_interval: Duration,
    deadline: Duration,
    cancel: CancellationToken,
}

impl ExtractionNode {
    pub fn new(
        indexer: Arc<dyn VideoIndexer>,
        poll_interval: Duration,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            indexer,
            poll_interval,
            deadline,
            cancel,
        }
    }

    async fn extract(&self, state: &mut AuditState) -> Result<(), StageError> {
        let job_id = self
            .indexer
            .submit(&state.video_url)
            .await
            .map_err(|reason| {
                let invalid_input = is_invalid_input_failure(&reason);
                StageError::ExtractionFailed {
                    reason,
                    invalid_input,
                }
            })?;

        // Fixed-interval poll until the job reaches a terminal status,
        // bounded by an overall deadline.
        let started = Instant::now();
        loop {
            let status = self
                .indexer
                .poll_status(&job_id)
                .await
                .map_err(|reason| StageError::ExtractionFailed {
                    reason,
                    invalid_input: false,
                })?;

            match status {
                IndexingStatus::Complete => break,
                IndexingStatus::Failed { reason } => {
                    let invalid_input = is_invalid_input_failure(&reason);
                    return Err(StageError::ExtractionFailed {
                        reason,
                        invalid_input,
                    });
                }
                IndexingStatus::Pending => {
                    tracing::debug!(audit_id = %state.audit_id, job_id = %job_id, "indexing job still pending");
                }
            }

            if started.elapsed() >= self.deadline {
                return Err(StageError::ExtractionTimeout {
                    timeout_secs: self.deadline.as_secs(),
                });
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(StageError::Cancelled("polling the indexing job"));
                }
                _ = sleep(self.poll_interval) => {}
            }
        }

        let result = self
            .indexer
            .fetch_result(&job_id)
            .await
            .map_err(|reason| StageError::ExtractionFailed {
                reason,
                invalid_input: false,
            })?;

        tracing::info!(
            audit_id = %state.audit_id,
            transcript_chars = result.transcript.len(),
            ocr_chars = result.on_screen_text.len(),
            "extraction complete"
        );

        state.raw_transcript = Some(result.transcript);
        state.on_screen_text = Some(result.on_screen_text);
        Ok(())
    }
}

#[async_trait]
impl AuditNode for ExtractionNode {
    fn name(&self) -> &'static str {
        "extraction"
    }

    fn phase(&self) -> AuditPhase {
        AuditPhase::Extracting
    }

    async fn run(&self, mut state: AuditState) -> AuditState {
        if let Err(e) = self.extract(&mut state).await {
            tracing::warn!(audit_id = %state.audit_id, "extraction failed: {}", e);
            state.record_error(e);
        }
        state
    }
}
