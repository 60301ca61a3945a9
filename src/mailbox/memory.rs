//! In-memory mailbox backend.
//!
//! Backs the test suite and doubles as a dry-run target. State transitions
//! follow the same idempotence rules the trait demands from real backends.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::MailboxError;
use crate::mailbox::{EmailMessage, Mailbox, ThreadSummary};

/// Full state of one in-memory thread.
#[derive(Debug, Clone)]
pub struct ThreadState {
    pub summary: ThreadSummary,
    pub messages: Vec<EmailMessage>,
    pub labels: BTreeSet<String>,
    pub categories: BTreeSet<String>,
}

/// In-memory [`Mailbox`] implementation.
#[derive(Default)]
pub struct MemoryMailbox {
    threads: Mutex<HashMap<String, ThreadState>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a thread with its messages.
    pub async fn seed(&self, summary: ThreadSummary, messages: Vec<EmailMessage>) {
        let id = summary.id.clone();
        self.threads.lock().await.insert(
            id,
            ThreadState {
                summary,
                messages,
                labels: BTreeSet::new(),
                categories: BTreeSet::new(),
            },
        );
    }

    /// Snapshot a thread's full state, `None` if unknown.
    pub async fn snapshot(&self, thread_id: &str) -> Option<ThreadState> {
        self.threads.lock().await.get(thread_id).cloned()
    }

    async fn with_thread<R>(
        &self,
        thread_id: &str,
        f: impl FnOnce(&mut ThreadState) -> R,
    ) -> Result<R, MailboxError> {
        let mut threads = self.threads.lock().await;
        let state = threads
            .get_mut(thread_id)
            .ok_or_else(|| MailboxError::ThreadNotFound(thread_id.to_string()))?;
        Ok(f(state))
    }
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    async fn list_candidate_threads(&self) -> Result<Vec<ThreadSummary>, MailboxError> {
        Ok(self
            .threads
            .lock()
            .await
            .values()
            .map(|t| t.summary.clone())
            .collect())
    }

    async fn latest_message(&self, thread_id: &str) -> Result<EmailMessage, MailboxError> {
        let newest = self
            .with_thread(thread_id, |t| {
                t.messages
                    .iter()
                    .max_by_key(|m| m.timestamp)
                    .cloned()
            })
            .await?;
        newest.ok_or_else(|| MailboxError::Decode(format!("thread {thread_id} has no messages")))
    }

    async fn add_label(&self, thread_id: &str, name: &str) -> Result<(), MailboxError> {
        self.with_thread(thread_id, |t| {
            t.labels.insert(name.to_string());
        })
        .await
    }

    async fn remove_label(&self, thread_id: &str, name: &str) -> Result<(), MailboxError> {
        self.with_thread(thread_id, |t| {
            t.labels.remove(name);
        })
        .await
    }

    async fn apply_category(&self, thread_id: &str, tag: &str) -> Result<(), MailboxError> {
        self.with_thread(thread_id, |t| {
            t.categories.insert(tag.to_string());
        })
        .await
    }

    async fn archive(&self, thread_id: &str) -> Result<(), MailboxError> {
        self.with_thread(thread_id, |t| {
            t.summary.in_inbox = false;
        })
        .await
    }

    async fn move_to_inbox(&self, thread_id: &str) -> Result<(), MailboxError> {
        self.with_thread(thread_id, |t| {
            t.summary.in_inbox = true;
        })
        .await
    }

    async fn set_important(&self, thread_id: &str, important: bool) -> Result<(), MailboxError> {
        self.with_thread(thread_id, |t| {
            t.summary.is_important = important;
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    fn summary(id: &str) -> ThreadSummary {
        ThreadSummary {
            id: id.into(),
            subject: "Test".into(),
            last_message_at: Utc.timestamp_millis_opt(1_000).unwrap(),
            in_inbox: true,
            is_important: false,
        }
    }

    fn message(millis: i64, body: &str) -> EmailMessage {
        EmailMessage {
            timestamp: Utc.timestamp_millis_opt(millis).unwrap(),
            from: "alice@example.com".into(),
            to: vec!["me@example.com".into()],
            subject: "Test".into(),
            body: body.into(),
        }
    }

    #[tokio::test]
    async fn latest_message_picks_newest() {
        let mailbox = MemoryMailbox::new();
        mailbox
            .seed(summary("t1"), vec![message(1_000, "old"), message(2_000, "new")])
            .await;
        let msg = mailbox.latest_message("t1").await.unwrap();
        assert_eq!(msg.body, "new");
    }

    #[tokio::test]
    async fn mutations_are_idempotent() {
        let mailbox = MemoryMailbox::new();
        mailbox.seed(summary("t1"), vec![message(1_000, "hi")]).await;

        mailbox.add_label("t1", "Receipts").await.unwrap();
        mailbox.add_label("t1", "Receipts").await.unwrap();
        mailbox.archive("t1").await.unwrap();
        mailbox.archive("t1").await.unwrap();
        mailbox.remove_label("t1", "not-there").await.unwrap();

        let state = mailbox.snapshot("t1").await.unwrap();
        assert_eq!(state.labels.len(), 1);
        assert!(!state.summary.in_inbox);
    }

    #[tokio::test]
    async fn unknown_thread_errors() {
        let mailbox = MemoryMailbox::new();
        let err = mailbox.archive("ghost").await.unwrap_err();
        assert!(matches!(err, MailboxError::ThreadNotFound(_)));
    }
}
