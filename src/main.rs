use std::sync::Arc;

use tower_http::cors::CorsLayer;

use video_audit::config::AuditConfig;
use video_audit::embeddings::QueryEmbedder;
use video_audit::handlers::{self, AppState};
use video_audit::indexer_client::HttpVideoIndexer;
use video_audit::llm_client::ClaudeClient;
use video_audit::rulebase::QdrantRulebase;
use video_audit::workflow::AuditWorkflow;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    let config = AuditConfig::from_env();

    if let Err(e) = std::fs::create_dir_all(&config.media_dir) {
        tracing::warn!("Failed to create media directory: {}", e);
    } else {
        tracing::info!("Media directory ready (for yt-dlp scratch dirs)");
    }

    let workflow = build_workflow(config).expect("Failed to build audit workflow");

    let shared_state = Arc::new(AppState { workflow });

    let app = handlers::routes(shared_state).layer(CorsLayer::permissive());

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("🛡️ Audit service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind server address");
    axum::serve(listener, app)
        .await
        .expect("Server error");
}

fn build_workflow(config: AuditConfig) -> Result<AuditWorkflow, String> {
    let indexer_base_url = require_env("INDEXER_BASE_URL")?;
    let indexer_api_key = require_env("INDEXER_API_KEY")?;
    let indexer = HttpVideoIndexer::new(indexer_base_url, indexer_api_key, &config.media_dir);

    let qdrant_url = require_env("QDRANT_URL")?;
    let qdrant_api_key = std::env::var("QDRANT_API_KEY").ok();
    let collection =
        std::env::var("QDRANT_COLLECTION").unwrap_or_else(|_| "rulebook".to_string());
    let embedder = QueryEmbedder::new(require_env("VOYAGE_API_KEY")?);
    let rulebase = QdrantRulebase::new(&qdrant_url, qdrant_api_key, collection, embedder)?;

    let model = ClaudeClient::new(require_env("ANTHROPIC_API_KEY")?, config.model_timeout);

    Ok(AuditWorkflow::new(
        Arc::new(indexer),
        Arc::new(rulebase),
        Arc::new(model),
        config,
    ))
}

fn require_env(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("{} must be set", key))
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, fmt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,video_audit=trace,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,video_audit=info,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for production (easier for log aggregation)
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("🛡️ Video audit service starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Build mode: {}",
        if cfg!(debug_assertions) { "development" } else { "production" }
    );

    let indexer_configured = std::env::var("INDEXER_BASE_URL").is_ok();
    let qdrant_configured = std::env::var("QDRANT_URL").is_ok();
    let voyage_configured = std::env::var("VOYAGE_API_KEY").is_ok();
    let anthropic_configured = std::env::var("ANTHROPIC_API_KEY").is_ok();

    tracing::info!(
        "Configuration - Indexer: {}, Qdrant: {}, Voyage: {}, Anthropic: {}",
        if indexer_configured { "✅" } else { "❌" },
        if qdrant_configured { "✅" } else { "❌" },
        if voyage_configured { "✅" } else { "❌" },
        if anthropic_configured { "✅" } else { "❌" }
    );

    Ok(())
}
