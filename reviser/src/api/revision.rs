//! Revision API endpoints
//!
//! `/revision/excerpts` and `/revision/apply` expose the two pure engine
//! functions. `/revision/revise` runs the full workflow against the
//! configured AI endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use shared_types::{ExcerptOptions, Patch, RevisionDiagnostics, RevisionHistoryEntry, RevisionMode};

use crate::api::ApiState;
use crate::excerpt;
use crate::patch;
use crate::revision::{RevisionError, RevisionRequest};

/// Revision error codes for machine-readable error responses
#[derive(Debug, Clone, Copy)]
pub enum RevisionErrorCode {
    NotConfigured,
    RevisionFailed,
    UpstreamError,
}

impl RevisionErrorCode {
    fn as_str(&self) -> &'static str {
        match self {
            RevisionErrorCode::NotConfigured => "NOT_CONFIGURED",
            RevisionErrorCode::RevisionFailed => "REVISION_FAILED",
            RevisionErrorCode::UpstreamError => "UPSTREAM_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            RevisionErrorCode::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            RevisionErrorCode::RevisionFailed => StatusCode::UNPROCESSABLE_ENTITY,
            RevisionErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RevisionErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
pub struct RevisionErrorResponse {
    error: RevisionErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<RevisionDiagnostics>,
}

fn revision_error(
    code: RevisionErrorCode,
    message: impl Into<String>,
    diagnostics: Option<RevisionDiagnostics>,
) -> axum::response::Response {
    let body = Json(RevisionErrorResponse {
        error: RevisionErrorDetail {
            code: code.as_str().to_string(),
            message: message.into(),
        },
        diagnostics,
    });
    (code.status_code(), body).into_response()
}

/// Request to select excerpts
#[derive(Debug, Deserialize)]
pub struct ExcerptRequest {
    pub document: String,
    pub instruction: String,
    pub max_sections: Option<usize>,
    pub include_intro_outro: Option<bool>,
}

pub async fn select_excerpts(
    State(_state): State<ApiState>,
    Json(req): Json<ExcerptRequest>,
) -> impl IntoResponse {
    let defaults = ExcerptOptions::default();
    let options = ExcerptOptions {
        max_sections: req.max_sections.unwrap_or(defaults.max_sections),
        include_intro_outro: req
            .include_intro_outro
            .unwrap_or(defaults.include_intro_outro),
    };
    let selection = excerpt::select(&req.document, &req.instruction, &options);
    (StatusCode::OK, Json(selection))
}

/// Request to apply patches
#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub document: String,
    pub patches: Vec<Patch>,
}

pub async fn apply_patches(
    State(_state): State<ApiState>,
    Json(req): Json<ApplyRequest>,
) -> impl IntoResponse {
    let result = patch::apply_patches(&req.document, &req.patches);
    if !result.failures.is_empty() {
        tracing::info!(
            applied = result.applied_count,
            failed = result.failures.len(),
            "Patch batch partially applied"
        );
    }
    (StatusCode::OK, Json(result))
}

/// Response for a successful revision
#[derive(Debug, Serialize)]
pub struct ReviseResponse {
    pub text: String,
    pub mode: RevisionMode,
    pub history_entry: RevisionHistoryEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<RevisionDiagnostics>,
}

pub async fn revise_document(
    State(state): State<ApiState>,
    Json(req): Json<RevisionRequest>,
) -> axum::response::Response {
    let Some(orchestrator) = state.app_state.orchestrator() else {
        return revision_error(
            RevisionErrorCode::NotConfigured,
            "No AI revision endpoint is configured",
            None,
        );
    };
    let expose_diagnostics = state.app_state.config().expose_diagnostics;

    match orchestrator.revise(&req).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ReviseResponse {
                text: outcome.text,
                mode: outcome.mode,
                history_entry: outcome.history_entry,
                diagnostics: expose_diagnostics.then_some(outcome.diagnostics),
            }),
        )
            .into_response(),
        Err(RevisionError::Exhausted {
            message,
            diagnostics,
        }) => revision_error(
            RevisionErrorCode::RevisionFailed,
            message,
            expose_diagnostics.then(|| *diagnostics),
        ),
        Err(e) => revision_error(RevisionErrorCode::UpstreamError, e.to_string(), None),
    }
}
