//! Mail Triage — incremental, LLM-backed mailbox triage.
//!
//! One run: list threads past the watermark, classify each with the
//! configured oracle, apply the deterministic mutation policy, and commit
//! the watermark per successful thread.

pub mod config;
pub mod cursor;
pub mod error;
pub mod mailbox;
pub mod oracle;
pub mod triage;
