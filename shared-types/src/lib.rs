//! Shared types between the revision engine and the editor UI
//!
//! These types are used by both:
//! - the `reviser` backend (excerpt selection, patch application, orchestration)
//! - the TypeScript editor, through the generated bindings
//!
//! Serializable with serde for JSON over HTTP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Patches
// ============================================================================

fn keep_anchors_default() -> bool {
    true
}

/// A single anchor-based edit proposed by the AI collaborator.
///
/// Patches never carry offsets. Every position is located by verbatim
/// anchor text that must occur exactly once in the current document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "revision.ts")]
pub enum Patch {
    /// Replace the single occurrence of `old_text` with `new_text`
    ReplaceExact { old_text: String, new_text: String },

    /// Splice `insert_text` immediately after `after_anchor`
    InsertAfter {
        after_anchor: String,
        insert_text: String,
    },

    /// Replace the span bounded by two anchors
    ReplaceBetween {
        start_anchor: String,
        end_anchor: String,
        new_text: String,
        #[serde(default = "keep_anchors_default")]
        keep_anchors: bool,
    },

    /// Delete the span bounded by two anchors
    DeleteBetween {
        start_anchor: String,
        end_anchor: String,
        #[serde(default = "keep_anchors_default")]
        keep_anchors: bool,
    },
}

impl Patch {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Patch::ReplaceExact { .. } => "replace_exact",
            Patch::InsertAfter { .. } => "insert_after",
            Patch::ReplaceBetween { .. } => "replace_between",
            Patch::DeleteBetween { .. } => "delete_between",
        }
    }
}

/// Why a patch could not be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "revision.ts")]
pub enum PatchFailureKind {
    EmptyAnchor,
    AnchorNotFound,
    AnchorNotUnique,
    AnchorOrder,
}

/// A patch that was rejected, with its position in the input list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "revision.ts")]
pub struct PatchFailure {
    pub patch_index: usize,
    pub patch: Patch,
    pub kind: PatchFailureKind,
    /// Human-readable cause, e.g. "old_text not unique"
    pub reason: String,
}

/// Output of applying a patch list to a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "revision.ts")]
pub struct ApplyResult {
    pub text: String,
    pub applied_count: usize,
    pub failures: Vec<PatchFailure>,
}

// ============================================================================
// Excerpts
// ============================================================================

/// Budget for one excerpt selection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "revision.ts")]
pub struct ExcerptOptions {
    pub max_sections: usize,
    pub include_intro_outro: bool,
}

impl Default for ExcerptOptions {
    fn default() -> Self {
        Self {
            max_sections: 3,
            include_intro_outro: false,
        }
    }
}

/// How the document was cut into excerpts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "revision.ts")]
pub enum SelectionMode {
    /// Small document, sent whole
    WholeDocument,
    /// `##` header-delimited sections
    Sections,
    /// Fixed-size chunks (no headers found)
    Chunks,
}

// ============================================================================
// Revision workflow
// ============================================================================

/// How a successful revision was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "revision.ts")]
pub enum RevisionMode {
    Patches,
    FullText,
}

/// Entry appended to a document's revision history by the calling workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "revision.ts")]
pub struct RevisionHistoryEntry {
    pub prompt: String,
    pub timestamp: DateTime<Utc>,
}

impl RevisionHistoryEntry {
    pub fn now(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Result of one orchestration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "revision.ts")]
pub enum AttemptOutcome {
    Applied,
    FullText,
    PatchesFailed,
    NoUsableReply,
}

/// Diagnostic record of one excerpt -> AI -> apply attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "revision.ts")]
pub struct AttemptReport {
    /// 1-based attempt number
    pub attempt: u8,
    pub max_sections: usize,
    pub include_intro_outro: bool,
    pub excerpt_count: usize,
    pub excerpt_headers: Vec<String>,
    pub patch_count: usize,
    pub applied_count: usize,
    /// Decode errors for patch entries the AI returned in an unknown shape
    pub malformed: Vec<String>,
    pub failures: Vec<PatchFailure>,
    pub outcome: AttemptOutcome,
}

/// Full diagnostic payload for one revision request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "revision.ts")]
pub struct RevisionDiagnostics {
    pub request_id: String,
    pub attempts: Vec<AttemptReport>,
}
