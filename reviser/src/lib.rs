//! Reviser - document revision patch engine
//!
//! Lets an AI assistant revise long documents without regenerating them:
//! a few relevant excerpts go out, anchor-based patches come back and are
//! applied with strict uniqueness checks. Exposed as a library and as a
//! small HTTP service.

pub mod api;
pub mod app_state;
pub mod config;
pub mod excerpt;
pub mod patch;
pub mod revision;

pub use excerpt::{select_excerpts, ExcerptSelection};
pub use patch::apply_patches;
pub use revision::{RevisionOrchestrator, RevisionRequest};
