//! Mailbox backend abstraction.
//!
//! The triage loop talks to the mailbox exclusively through the [`Mailbox`]
//! trait: listing candidate threads, reading the latest message, and the
//! handful of mutations the transition engine can emit. Label and category
//! identifiers cross this boundary as backend strings — the typed mutation
//! set lives in the triage layer.

pub mod gmail;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MailboxError;

pub use gmail::GmailMailbox;
pub use memory::MemoryMailbox;

/// One conversation thread as seen by the selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    /// Backend-native thread id.
    pub id: String,
    /// Subject of the thread's first message.
    pub subject: String,
    /// Timestamp of the newest message in the thread.
    pub last_message_at: DateTime<Utc>,
    /// Whether the thread currently sits in the inbox.
    pub in_inbox: bool,
    /// Whether the thread carries the importance marker.
    pub is_important: bool,
}

/// A single message, reduced to what the classification prompt needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
    /// Sender address.
    pub from: String,
    /// To recipients.
    pub to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Mailbox backend capability.
///
/// Every mutation must be idempotent: re-adding a present label or
/// re-archiving an archived thread is a no-op, never an error.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// List threads that are candidates for triage, with enough metadata
    /// for watermark filtering. Order is unspecified — the selector sorts.
    async fn list_candidate_threads(&self) -> Result<Vec<ThreadSummary>, MailboxError>;

    /// Fetch the newest message of a thread.
    async fn latest_message(&self, thread_id: &str) -> Result<EmailMessage, MailboxError>;

    /// Add a user label by name, creating the label if it does not exist.
    async fn add_label(&self, thread_id: &str, name: &str) -> Result<(), MailboxError>;

    /// Remove a user label by name. Removing an absent label is a no-op.
    async fn remove_label(&self, thread_id: &str, name: &str) -> Result<(), MailboxError>;

    /// Apply a provider-level category tag, distinct from user labels.
    async fn apply_category(&self, thread_id: &str, tag: &str) -> Result<(), MailboxError>;

    /// Move the thread out of the inbox.
    async fn archive(&self, thread_id: &str) -> Result<(), MailboxError>;

    /// Move the thread (back) into the inbox.
    async fn move_to_inbox(&self, thread_id: &str) -> Result<(), MailboxError>;

    /// Set or clear the importance marker.
    async fn set_important(&self, thread_id: &str, important: bool) -> Result<(), MailboxError>;
}
