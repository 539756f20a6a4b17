// HTTP front end
pub mod audit;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};

use crate::workflow::AuditWorkflow;

pub struct AppState {
    pub workflow: AuditWorkflow,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/audit", post(audit::run_audit))
        .route("/health", get(health))
        .layer(Extension(state))
}

async fn health() -> &'static str {
    "ok"
}
