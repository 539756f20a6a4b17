// Stage failure taxonomy with recoverability classification
use thiserror::Error;

use super::state::ErrorRecord;

pub const STAGE_EXTRACTION: &str = "extraction";
pub const STAGE_RETRIEVAL: &str = "retrieval";
pub const STAGE_JUDGMENT: &str = "judgment";

/// Everything a pipeline stage can fail with. The variant decides the
/// stage tag and whether the caller may retry the same audit, so no
/// call site classifies failures ad hoc.
#[derive(Debug, Error)]
pub enum StageError {
    /// Remote indexing job never reached a terminal status
    #[error("indexing job did not reach a terminal status within {timeout_secs}s")]
    ExtractionTimeout { timeout_secs: u64 },

    /// Download or indexing failed. `invalid_input` marks failures
    /// caused by the video URL itself (unsupported, unreachable),
    /// which no retry can fix.
    #[error("extraction failed: {reason}")]
    ExtractionFailed { reason: String, invalid_input: bool },

    /// Caller went away while the extraction poll loop was waiting
    #[error("audit cancelled while {0}")]
    Cancelled(&'static str),

    #[error("rulebook retrieval failed: {0}")]
    RetrievalFailed(String),

    /// Transient provider condition (rate limit, 5xx, transport)
    #[error("model completion failed: {0}")]
    ModelCompletionFailed(String),

    /// Model output did not match the verdict schema. Not retried:
    /// malformed output usually means prompt/schema drift, not load.
    #[error("model output did not match the verdict schema: {0}")]
    VerdictSchemaInvalid(String),
}

impl StageError {
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::ExtractionTimeout { .. }
            | StageError::ExtractionFailed { .. }
            | StageError::Cancelled(_) => STAGE_EXTRACTION,
            StageError::RetrievalFailed(_) => STAGE_RETRIEVAL,
            StageError::ModelCompletionFailed(_) | StageError::VerdictSchemaInvalid(_) => {
                STAGE_JUDGMENT
            }
        }
    }

    pub fn recoverable(&self) -> bool {
        match self {
            StageError::ExtractionTimeout { .. } => true,
            StageError::ExtractionFailed { invalid_input, .. } => !invalid_input,
            StageError::Cancelled(_) => true,
            StageError::RetrievalFailed(_) => true,
            StageError::ModelCompletionFailed(_) => true,
            StageError::VerdictSchemaInvalid(_) => false,
        }
    }

    pub fn into_record(self) -> ErrorRecord {
        ErrorRecord {
            stage: self.stage().to_string(),
            recoverable: self.recoverable(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_taxonomy() {
        assert!(StageError::ExtractionTimeout { timeout_secs: 600 }.recoverable());
        assert!(StageError::RetrievalFailed("down".into()).recoverable());
        assert!(StageError::ModelCompletionFailed("429".into()).recoverable());
        assert!(!StageError::VerdictSchemaInvalid("missing field".into()).recoverable());

        let transient = StageError::ExtractionFailed {
            reason: "provider hiccup".into(),
            invalid_input: false,
        };
        assert!(transient.recoverable());

        let bad_url = StageError::ExtractionFailed {
            reason: "Unsupported URL".into(),
            invalid_input: true,
        };
        assert!(!bad_url.recoverable());
        assert_eq!(bad_url.stage(), STAGE_EXTRACTION);
    }

    #[test]
    fn record_carries_stage_tag() {
        let rec = StageError::RetrievalFailed("qdrant unreachable".into()).into_record();
        assert_eq!(rec.stage, "retrieval");
        assert!(rec.recoverable);
        assert!(rec.message.contains("qdrant unreachable"));
    }
}
