//! HTTP API routes for the revision engine
//!
//! Thin JSON wrappers around excerpt selection, patch application and the
//! two-attempt revision workflow.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

pub mod revision;

use crate::app_state::AppState;

#[derive(Clone)]
pub struct ApiState {
    pub app_state: AppState,
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/revision/excerpts", post(revision::select_excerpts))
        .route("/revision/apply", post(revision::apply_patches))
        .route("/revision/revise", post(revision::revise_document))
}

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "reviser",
            "version": env!("CARGO_PKG_VERSION"),
            "ai_configured": state.app_state.orchestrator().is_some(),
        })),
    )
}
