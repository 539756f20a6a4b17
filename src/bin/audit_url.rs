// One-shot CLI front end: audit a single video URL and print the result
use std::sync::Arc;

use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;

use video_audit::config::AuditConfig;
use video_audit::embeddings::QueryEmbedder;
use video_audit::indexer_client::HttpVideoIndexer;
use video_audit::llm_client::ClaudeClient;
use video_audit::rulebase::QdrantRulebase;
use video_audit::workflow::AuditWorkflow;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🛡️  Video Audit - one-shot run");
    println!("==========================================");

    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let video_url = match std::env::args().nth(1) {
        Some(url) => url,
        None => {
            eprintln!("Usage: audit_url <video_url>");
            std::process::exit(2);
        }
    };

    let config = AuditConfig::from_env();
    std::fs::create_dir_all(&config.media_dir)?;

    let indexer = HttpVideoIndexer::new(
        require_env("INDEXER_BASE_URL")?,
        require_env("INDEXER_API_KEY")?,
        &config.media_dir,
    );
    let embedder = QueryEmbedder::new(require_env("VOYAGE_API_KEY")?);
    let rulebase = QdrantRulebase::new(
        &require_env("QDRANT_URL")?,
        std::env::var("QDRANT_API_KEY").ok(),
        std::env::var("QDRANT_COLLECTION").unwrap_or_else(|_| "rulebook".to_string()),
        embedder,
    )?;
    let model = ClaudeClient::new(require_env("ANTHROPIC_API_KEY")?, config.model_timeout);

    let workflow = AuditWorkflow::new(
        Arc::new(indexer),
        Arc::new(rulebase),
        Arc::new(model),
        config,
    );

    let state = workflow.run_audit(&video_url, CancellationToken::new()).await;

    match (&state.verdict, &state.error) {
        (Some(verdict), None) => {
            println!("✅ Audit complete ({} rules consulted)", state.retrieved_rules.len());
            println!("{}", serde_json::to_string_pretty(verdict)?);
            Ok(())
        }
        (_, Some(error)) => {
            eprintln!(
                "❌ Audit failed at {} stage: {} (retryable: {})",
                error.stage, error.message, error.recoverable
            );
            std::process::exit(1);
        }
        _ => {
            eprintln!("❌ Audit finished without a verdict or an error");
            std::process::exit(1);
        }
    }
}

fn require_env(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("{} must be set in the environment", key))
}
