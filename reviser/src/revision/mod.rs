//! Revision workflow - excerpts -> AI patches -> apply, with one escalation
//!
//! Drives a single revision request through:
//!
//! IDLE -> EXCERPTING(initial) -> AWAIT_AI -> APPLYING -> DONE
//!                                                     \-> EXCERPTING(escalated) -> AWAIT_AI -> APPLYING -> DONE | FAILED
//!
//! The AI collaborator sits behind the [`RevisionModel`] trait. Its patches
//! are untrusted: they are applied with [`crate::patch::apply_patches`] and
//! any failure sends the request into the second attempt, which uses a
//! larger excerpt budget. There is no third attempt.
//!
//! ```rust,ignore
//! let orchestrator = RevisionOrchestrator::new(HttpRevisionModel::from_config(&config.ai)?);
//! let outcome = orchestrator.revise(&request).await?;
//! store.save(outcome.text, outcome.history_entry);
//! ```

pub mod client;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{
    AttemptOutcome, AttemptReport, ExcerptOptions, Patch, RevisionDiagnostics,
    RevisionHistoryEntry, RevisionMode,
};

use crate::excerpt;
use crate::patch::apply_patches;

pub use client::HttpRevisionModel;

const NO_USABLE_REPLY_MESSAGE: &str = "The AI did not return any usable edits for this request. \
Please be more specific, for example by naming the exact section header you want changed.";
const PATCHES_FAILED_MESSAGE: &str = "The suggested edits could not be matched against the document. \
Please be more specific, for example by naming the exact section header you want changed.";

// ============================================================================
// Core Types
// ============================================================================

/// Error types for the revision workflow
#[derive(Debug, thiserror::Error, Clone)]
pub enum RevisionError {
    /// The AI endpoint could not be reached or answered with garbage
    #[error("AI request failed: {0}")]
    Transport(String),
    /// The HTTP client could not be constructed
    #[error("AI client setup failed: {0}")]
    Client(String),
    /// Both attempts ended without an applicable result
    #[error("{message}")]
    Exhausted {
        message: String,
        diagnostics: Box<RevisionDiagnostics>,
    },
}

/// What the calling workflow asks to have revised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRequest {
    pub document: String,
    pub instruction: String,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub original_prompt: Option<String>,
    #[serde(default)]
    pub requires_signature: bool,
}

impl RevisionRequest {
    pub fn new(document: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            instruction: instruction.into(),
            document_type: None,
            original_prompt: None,
            requires_signature: false,
        }
    }
}

/// Payload handed to the AI collaborator for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub excerpts: Vec<String>,
    pub revision_prompt: String,
    pub document_type: Option<String>,
    pub original_prompt: Option<String>,
    pub requires_signature: bool,
}

/// What the AI collaborator answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    /// Anchor patches; `malformed` holds decode errors for entries that
    /// were not a known patch shape
    Patches {
        patches: Vec<Patch>,
        malformed: Vec<String>,
    },
    /// Legacy mode: the whole revised document
    Content(String),
    /// Neither patches nor content
    Empty,
}

/// Excerpt budgets for the first and the escalated attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevisionBudgets {
    pub initial: ExcerptOptions,
    pub escalated: ExcerptOptions,
}

impl Default for RevisionBudgets {
    fn default() -> Self {
        Self {
            initial: ExcerptOptions {
                max_sections: 3,
                include_intro_outro: false,
            },
            escalated: ExcerptOptions {
                max_sections: 6,
                include_intro_outro: true,
            },
        }
    }
}

/// Workflow phases, logged as the request moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionPhase {
    Excerpting,
    AwaitAi,
    Applying,
    Done,
    Failed,
}

impl RevisionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excerpting => "excerpting",
            Self::AwaitAi => "await_ai",
            Self::Applying => "applying",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Successful revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionOutcome {
    pub text: String,
    pub mode: RevisionMode,
    pub history_entry: RevisionHistoryEntry,
    pub diagnostics: RevisionDiagnostics,
}

// ============================================================================
// RevisionModel Trait
// ============================================================================

/// Seam to the external AI revision endpoint
#[async_trait]
pub trait RevisionModel: Send + Sync {
    async fn propose(&self, request: &ModelRequest) -> Result<ModelReply, RevisionError>;
}

#[async_trait]
impl<T: RevisionModel + ?Sized> RevisionModel for Arc<T> {
    async fn propose(&self, request: &ModelRequest) -> Result<ModelReply, RevisionError> {
        (**self).propose(request).await
    }
}

// ============================================================================
// RevisionOrchestrator
// ============================================================================

pub struct RevisionOrchestrator<M: RevisionModel> {
    model: M,
    budgets: RevisionBudgets,
}

impl<M: RevisionModel> RevisionOrchestrator<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            budgets: RevisionBudgets::default(),
        }
    }

    pub fn with_budgets(mut self, budgets: RevisionBudgets) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn budgets(&self) -> RevisionBudgets {
        self.budgets
    }

    /// Run the two-attempt workflow for `request`.
    pub async fn revise(
        &self,
        request: &RevisionRequest,
    ) -> Result<RevisionOutcome, RevisionError> {
        let mut diagnostics = RevisionDiagnostics {
            request_id: ulid::Ulid::new().to_string(),
            attempts: Vec::with_capacity(2),
        };

        let plan = [self.budgets.initial, self.budgets.escalated];
        for (attempt, options) in (1u8..).zip(plan) {
            Self::enter(&diagnostics.request_id, attempt, RevisionPhase::Excerpting);
            let selection = excerpt::select(&request.document, &request.instruction, &options);
            let model_request = ModelRequest {
                excerpts: selection.excerpts,
                revision_prompt: request.instruction.clone(),
                document_type: request.document_type.clone(),
                original_prompt: request.original_prompt.clone(),
                requires_signature: request.requires_signature,
            };
            tracing::info!(
                request_id = %diagnostics.request_id,
                attempt,
                max_sections = options.max_sections,
                include_intro_outro = options.include_intro_outro,
                excerpts = model_request.excerpts.len(),
                "Requesting AI patches"
            );
            let mut report = AttemptReport {
                attempt,
                max_sections: options.max_sections,
                include_intro_outro: options.include_intro_outro,
                excerpt_count: model_request.excerpts.len(),
                excerpt_headers: selection.headers,
                patch_count: 0,
                applied_count: 0,
                malformed: Vec::new(),
                failures: Vec::new(),
                outcome: AttemptOutcome::NoUsableReply,
            };

            Self::enter(&diagnostics.request_id, attempt, RevisionPhase::AwaitAi);
            let reply = match self.model.propose(&model_request).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(
                        request_id = %diagnostics.request_id,
                        attempt,
                        error = %e,
                        "AI revision request failed"
                    );
                    return Err(e);
                }
            };

            match reply {
                ModelReply::Content(text) if !text.trim().is_empty() => {
                    report.outcome = AttemptOutcome::FullText;
                    diagnostics.attempts.push(report);
                    return Ok(self.finish(request, text, RevisionMode::FullText, diagnostics));
                }
                ModelReply::Patches { patches, malformed }
                    if !patches.is_empty() || !malformed.is_empty() =>
                {
                    Self::enter(&diagnostics.request_id, attempt, RevisionPhase::Applying);
                    let result = apply_patches(&request.document, &patches);
                    report.patch_count = patches.len();
                    report.applied_count = result.applied_count;
                    report.failures = result.failures;
                    report.malformed = malformed;

                    if report.failures.is_empty() && report.malformed.is_empty() {
                        report.outcome = AttemptOutcome::Applied;
                        diagnostics.attempts.push(report);
                        return Ok(self.finish(
                            request,
                            result.text,
                            RevisionMode::Patches,
                            diagnostics,
                        ));
                    }
                    report.outcome = AttemptOutcome::PatchesFailed;
                }
                _ => {}
            }

            tracing::warn!(
                request_id = %diagnostics.request_id,
                attempt,
                outcome = ?report.outcome,
                excerpts = report.excerpt_count,
                patches = report.patch_count,
                failures = report.failures.len(),
                malformed = report.malformed.len(),
                "Revision attempt did not produce an applicable result"
            );
            diagnostics.attempts.push(report);
        }

        Self::enter(&diagnostics.request_id, 2, RevisionPhase::Failed);
        let message = match diagnostics.attempts.last().map(|a| a.outcome) {
            Some(AttemptOutcome::NoUsableReply) => NO_USABLE_REPLY_MESSAGE,
            _ => PATCHES_FAILED_MESSAGE,
        };
        Err(RevisionError::Exhausted {
            message: message.to_string(),
            diagnostics: Box::new(diagnostics),
        })
    }

    fn finish(
        &self,
        request: &RevisionRequest,
        text: String,
        mode: RevisionMode,
        diagnostics: RevisionDiagnostics,
    ) -> RevisionOutcome {
        let attempt = diagnostics.attempts.len() as u8;
        Self::enter(&diagnostics.request_id, attempt, RevisionPhase::Done);
        tracing::info!(
            request_id = %diagnostics.request_id,
            attempts = attempt,
            mode = ?mode,
            "Revision applied"
        );
        RevisionOutcome {
            text,
            mode,
            history_entry: RevisionHistoryEntry::now(request.instruction.clone()),
            diagnostics,
        }
    }

    fn enter(request_id: &str, attempt: u8, phase: RevisionPhase) {
        tracing::debug!(request_id, attempt, phase = phase.as_str(), "Revision phase");
    }
}
