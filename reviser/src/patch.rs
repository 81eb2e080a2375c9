//! Anchor-based patch application
//!
//! Applies AI-proposed [`Patch`] operations to a document, one after the
//! other, each against the text produced by the patches before it. A patch
//! that cannot be located unambiguously is recorded as a [`PatchFailure`]
//! and skipped; it never aborts the batch and never rolls back earlier
//! successes.

use shared_types::{ApplyResult, Patch, PatchFailure, PatchFailureKind};

/// Why an anchor lookup or span resolution failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    #[error("{0} is empty")]
    Empty(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} not unique")]
    NotUnique(&'static str),
    #[error("end_anchor precedes start_anchor")]
    OutOfOrder,
}

impl AnchorError {
    pub fn kind(&self) -> PatchFailureKind {
        match self {
            AnchorError::Empty(_) => PatchFailureKind::EmptyAnchor,
            AnchorError::NotFound(_) => PatchFailureKind::AnchorNotFound,
            AnchorError::NotUnique(_) => PatchFailureKind::AnchorNotUnique,
            AnchorError::OutOfOrder => PatchFailureKind::AnchorOrder,
        }
    }
}

/// Locate `needle` in `haystack`, requiring exactly one occurrence.
///
/// Overlapping matches count: "aa" is not unique in "aaa". `field` names
/// the patch field in error messages.
pub fn find_unique(
    haystack: &str,
    needle: &str,
    field: &'static str,
) -> Result<usize, AnchorError> {
    if needle.is_empty() {
        return Err(AnchorError::Empty(field));
    }
    let first = haystack.find(needle).ok_or(AnchorError::NotFound(field))?;

    let step = needle.chars().next().map(char::len_utf8).unwrap_or(1);
    if haystack[first + step..].contains(needle) {
        return Err(AnchorError::NotUnique(field));
    }
    Ok(first)
}

/// Byte offsets of a resolved start/end anchor pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AnchorSpan {
    start: usize,
    start_end: usize,
    end: usize,
    end_end: usize,
}

fn resolve_span(
    text: &str,
    start_anchor: &str,
    end_anchor: &str,
) -> Result<AnchorSpan, AnchorError> {
    let start = find_unique(text, start_anchor, "start_anchor")?;
    let end = find_unique(text, end_anchor, "end_anchor")?;
    let start_end = start + start_anchor.len();
    if end < start_end {
        return Err(AnchorError::OutOfOrder);
    }
    Ok(AnchorSpan {
        start,
        start_end,
        end,
        end_end: end + end_anchor.len(),
    })
}

fn splice(text: &str, from: usize, to: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() - (to - from) + replacement.len());
    out.push_str(&text[..from]);
    out.push_str(replacement);
    out.push_str(&text[to..]);
    out
}

/// Apply a single patch to `text`, returning the new text.
pub fn apply_patch(text: &str, patch: &Patch) -> Result<String, AnchorError> {
    match patch {
        Patch::ReplaceExact { old_text, new_text } => {
            let at = find_unique(text, old_text, "old_text")?;
            Ok(splice(text, at, at + old_text.len(), new_text))
        }
        Patch::InsertAfter {
            after_anchor,
            insert_text,
        } => {
            let at = find_unique(text, after_anchor, "after_anchor")? + after_anchor.len();
            Ok(splice(text, at, at, insert_text))
        }
        Patch::ReplaceBetween {
            start_anchor,
            end_anchor,
            new_text,
            keep_anchors,
        } => {
            let span = resolve_span(text, start_anchor, end_anchor)?;
            if *keep_anchors {
                Ok(splice(text, span.start_end, span.end, new_text))
            } else {
                Ok(splice(text, span.start, span.end_end, new_text))
            }
        }
        Patch::DeleteBetween {
            start_anchor,
            end_anchor,
            keep_anchors,
        } => {
            let span = resolve_span(text, start_anchor, end_anchor)?;
            if *keep_anchors {
                Ok(splice(text, span.start_end, span.end, ""))
            } else {
                Ok(splice(text, span.start, span.end_end, ""))
            }
        }
    }
}

/// Apply `patches` in order. Each patch sees the output of every earlier
/// patch that succeeded; failures are collected, not raised.
pub fn apply_patches(text: &str, patches: &[Patch]) -> ApplyResult {
    let mut current = text.to_string();
    let mut applied_count = 0usize;
    let mut failures = Vec::new();

    for (patch_index, patch) in patches.iter().enumerate() {
        match apply_patch(&current, patch) {
            Ok(next) => {
                current = next;
                applied_count += 1;
            }
            Err(err) => {
                tracing::debug!(
                    patch_index,
                    patch_type = patch.kind_str(),
                    reason = %err,
                    "Patch rejected"
                );
                failures.push(PatchFailure {
                    patch_index,
                    patch: patch.clone(),
                    kind: err.kind(),
                    reason: err.to_string(),
                });
            }
        }
    }

    ApplyResult {
        text: current,
        applied_count,
        failures,
    }
}
