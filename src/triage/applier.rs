//! Mutation applier — executes a mutation list against the mailbox.
//!
//! This is the only place where the typed mutation set is translated into
//! backend string identifiers. Mutations run strictly in the order the
//! transition engine emitted them; idempotence is the backend's contract,
//! so re-applying a list is always safe.

use crate::error::MailboxError;
use crate::mailbox::Mailbox;
use crate::triage::types::{CategoryTag, Mutation, TriageLabel};

/// Backend label name for a triage label.
pub fn label_name(label: TriageLabel) -> &'static str {
    match label {
        TriageLabel::Receipts => "Receipts",
        TriageLabel::Notices => "Notices",
        TriageLabel::NoticesOtp => "Notices/OTP",
        TriageLabel::NoticesStatus => "Notices/Status",
        TriageLabel::Feeds => "Feeds",
        TriageLabel::Handwritten => "Handwritten",
        TriageLabel::ActionRequired => "Action Required",
    }
}

/// Backend identifier for a provider category tag.
pub fn category_tag_id(tag: CategoryTag) -> &'static str {
    match tag {
        CategoryTag::Promotions => "CATEGORY_PROMOTIONS",
        CategoryTag::Updates => "CATEGORY_UPDATES",
    }
}

/// Apply a mutation list to one thread, in order.
///
/// Stops at the first failing mutation; anything already applied stays
/// applied. The caller treats that as a failed conversation and retries the
/// whole list on a later run.
pub async fn apply(
    mailbox: &dyn Mailbox,
    thread_id: &str,
    mutations: &[Mutation],
) -> Result<(), MailboxError> {
    for mutation in mutations {
        match mutation {
            Mutation::ApplyCategory(tag) => {
                mailbox.apply_category(thread_id, category_tag_id(*tag)).await?
            }
            Mutation::AddLabel(label) => {
                mailbox.add_label(thread_id, label_name(*label)).await?
            }
            Mutation::RemoveLabel(label) => {
                mailbox.remove_label(thread_id, label_name(*label)).await?
            }
            Mutation::Archive => mailbox.archive(thread_id).await?,
            Mutation::MoveToInbox => mailbox.move_to_inbox(thread_id).await?,
            Mutation::MarkImportant => mailbox.set_important(thread_id, true).await?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::mailbox::{EmailMessage, MemoryMailbox, ThreadSummary};

    async fn seeded_mailbox() -> MemoryMailbox {
        let mailbox = MemoryMailbox::new();
        mailbox
            .seed(
                ThreadSummary {
                    id: "t1".into(),
                    subject: "Receipt".into(),
                    last_message_at: Utc.timestamp_millis_opt(1_000).unwrap(),
                    in_inbox: true,
                    is_important: false,
                },
                vec![EmailMessage {
                    timestamp: Utc.timestamp_millis_opt(1_000).unwrap(),
                    from: "shop@example.com".into(),
                    to: vec!["me@example.com".into()],
                    subject: "Receipt".into(),
                    body: "Thanks for your order".into(),
                }],
            )
            .await;
        mailbox
    }

    #[tokio::test]
    async fn applies_in_order_and_translates_names() {
        let mailbox = seeded_mailbox().await;
        let mutations = [
            Mutation::ApplyCategory(CategoryTag::Updates),
            Mutation::AddLabel(TriageLabel::NoticesOtp),
            Mutation::AddLabel(TriageLabel::ActionRequired),
            Mutation::Archive,
            Mutation::MoveToInbox,
        ];
        apply(&mailbox, "t1", &mutations).await.unwrap();

        let state = mailbox.snapshot("t1").await.unwrap();
        assert!(state.categories.contains("CATEGORY_UPDATES"));
        assert!(state.labels.contains("Notices/OTP"));
        assert!(state.labels.contains("Action Required"));
        // MoveToInbox came after Archive, so the thread ends in the inbox.
        assert!(state.summary.in_inbox);
    }

    #[tokio::test]
    async fn applying_twice_equals_applying_once() {
        let mutations = [
            Mutation::ApplyCategory(CategoryTag::Promotions),
            Mutation::Archive,
            Mutation::AddLabel(TriageLabel::Handwritten),
            Mutation::RemoveLabel(TriageLabel::ActionRequired),
            Mutation::MarkImportant,
        ];

        let once = seeded_mailbox().await;
        apply(&once, "t1", &mutations).await.unwrap();

        let twice = seeded_mailbox().await;
        apply(&twice, "t1", &mutations).await.unwrap();
        apply(&twice, "t1", &mutations).await.unwrap();

        let a = once.snapshot("t1").await.unwrap();
        let b = twice.snapshot("t1").await.unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.categories, b.categories);
        assert_eq!(a.summary.in_inbox, b.summary.in_inbox);
        assert_eq!(a.summary.is_important, b.summary.is_important);
    }

    #[tokio::test]
    async fn unknown_thread_fails_without_panicking() {
        let mailbox = MemoryMailbox::new();
        let err = apply(&mailbox, "ghost", &[Mutation::Archive])
            .await
            .unwrap_err();
        assert!(matches!(err, MailboxError::ThreadNotFound(_)));
    }
}
