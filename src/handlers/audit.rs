// POST /api/audit - run one audit and translate the final state
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::verdict::AuditVerdict;

use super::AppState;

#[derive(Deserialize)]
pub struct AuditRequest {
    pub video_url: String,
}

#[derive(Serialize)]
pub struct AuditResponse {
    pub audit_id: Uuid,
    pub video_url: String,
    pub verdict: AuditVerdict,
    pub rules_consulted: usize,
    pub stage_trace: Vec<String>,
}

/// Error envelope: `retryable` tells the caller whether resubmitting
/// the same URL may succeed.
#[derive(Serialize)]
pub struct AuditErrorResponse {
    pub audit_id: Uuid,
    pub stage: String,
    pub message: String,
    pub retryable: bool,
}

pub async fn run_audit(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<AuditRequest>,
) -> impl IntoResponse {
    let url = request.video_url.trim();
    if url.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
        return (
            StatusCode::BAD_REQUEST,
            "video_url must be an http(s) URL".to_string(),
        )
            .into_response();
    }

    // Dropping the request future cancels the token via the guard,
    // so a disconnected caller stops the extraction poll loop.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let final_state = state.workflow.run_audit(url, cancel).await;

    match (final_state.verdict, final_state.error) {
        (Some(verdict), None) => {
            let response = AuditResponse {
                audit_id: final_state.audit_id,
                video_url: final_state.video_url,
                verdict,
                rules_consulted: final_state.retrieved_rules.len(),
                stage_trace: final_state.stage_trace,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        (None, Some(error)) => {
            let status = if error.recoverable {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            let response = AuditErrorResponse {
                audit_id: final_state.audit_id,
                stage: error.stage,
                message: error.message,
                retryable: error.recoverable,
            };
            (status, Json(response)).into_response()
        }
        // The graph guarantees exactly one terminal outcome; anything
        // else is a wiring bug worth surfacing loudly.
        (verdict, error) => {
            tracing::error!(
                audit_id = %final_state.audit_id,
                has_verdict = verdict.is_some(),
                has_error = error.is_some(),
                "audit finished without exactly one terminal outcome"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "audit produced an inconsistent terminal state".to_string(),
            )
                .into_response()
        }
    }
}
