// Deployment-tunable audit constants, read from the environment
use std::str::FromStr;
use std::time::Duration;

/// Tunables for one audit run. None of the defaults are load-bearing
/// for correctness; they exist so operators can trade latency against
/// provider cost without a rebuild.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// k for the top-k rulebook similarity query
    pub retrieval_top_k: usize,
    /// Fixed interval between indexing-job status polls
    pub poll_interval: Duration,
    /// Overall deadline for the indexing job to reach a terminal status
    pub extraction_timeout: Duration,
    /// Per-request timeout for the model completion call
    pub model_timeout: Duration,
    /// Root directory for per-audit media scratch dirs
    pub media_dir: std::path::PathBuf,
}

impl AuditConfig {
    pub fn from_env() -> Self {
        Self {
            retrieval_top_k: env_parse("RETRIEVAL_TOP_K", 5),
            poll_interval: Duration::from_secs(env_parse("EXTRACTION_POLL_INTERVAL_SECS", 10)),
            extraction_timeout: Duration::from_secs(env_parse("EXTRACTION_TIMEOUT_SECS", 600)),
            model_timeout: Duration::from_secs(env_parse("MODEL_TIMEOUT_SECS", 120)),
            media_dir: std::env::var("MEDIA_DIR")
                .unwrap_or_else(|_| "downloads".to_string())
                .into(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retrieval_top_k: 5,
            poll_interval: Duration::from_secs(10),
            extraction_timeout: Duration::from_secs(600),
            model_timeout: Duration::from_secs(120),
            media_dir: "downloads".into(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable {}={}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
