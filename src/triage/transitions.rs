//! Transition engine — classification result to ordered mutation list.
//!
//! Pure and deterministic. Ordering is load-bearing: the inbox/importance
//! override runs after every archive decision and may reverse an archive
//! emitted earlier in the same pass (a promotional email written by a
//! person gets archived, then pulled back into the inbox).
//!
//! Folder and importance decisions look only at the current thread flags
//! and the latest classification, never at conversation history.

use crate::mailbox::ThreadSummary;
use crate::triage::types::{Category, CategoryTag, ClassificationResult, Mutation, TriageLabel};

/// The slice of thread state the policy reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadFlags {
    pub in_inbox: bool,
    pub is_important: bool,
}

impl From<&ThreadSummary> for ThreadFlags {
    fn from(summary: &ThreadSummary) -> Self {
        Self {
            in_inbox: summary.in_inbox,
            is_important: summary.is_important,
        }
    }
}

/// Map a classification to the ordered mutation list for one thread.
pub fn plan(result: &ClassificationResult, flags: ThreadFlags) -> Vec<Mutation> {
    let mut mutations = Vec::new();

    match result.category {
        Category::Promotions => {
            mutations.push(Mutation::ApplyCategory(CategoryTag::Promotions));
            mutations.push(Mutation::Archive);
        }
        Category::Notices | Category::NoticesStatus => {
            mutations.push(Mutation::ApplyCategory(CategoryTag::Updates));
        }
        Category::Receipts | Category::Feeds => {
            if !flags.is_important && flags.in_inbox {
                mutations.push(Mutation::Archive);
            }
        }
        Category::NoticesOtp | Category::Others => {}
    }

    // Category label, independent of the folder rules above.
    if let Some(label) = result.category.label() {
        mutations.push(Mutation::AddLabel(label));
    }

    // Handwritten is the negation of machine_generated.
    if !result.machine_generated {
        mutations.push(Mutation::AddLabel(TriageLabel::Handwritten));
    }

    if result.action_required {
        mutations.push(Mutation::AddLabel(TriageLabel::ActionRequired));
    } else {
        mutations.push(Mutation::RemoveLabel(TriageLabel::ActionRequired));
    }

    // Second archive pass: informational mail with nothing to act on leaves
    // the inbox even when the first pass kept it.
    if matches!(
        result.category,
        Category::Notices | Category::NoticesStatus | Category::Receipts | Category::Feeds
    ) && !result.action_required
    {
        mutations.push(Mutation::Archive);
    }

    // Final override. Must stay after all archive decisions.
    if result.time_sensitive || !result.machine_generated {
        mutations.push(Mutation::MoveToInbox);
    }
    if result.time_sensitive && !result.machine_generated {
        mutations.push(Mutation::MarkImportant);
    }

    mutations
}
