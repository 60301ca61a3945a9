//! Classification and mutation types.
//!
//! The classification schema is fixed to one canonical version: a closed
//! category enum plus three booleans. "Handwritten" is not a schema field —
//! it is derived from the negation of `machine_generated` by the transition
//! engine. Unknown fields are rejected so a drifted oracle payload surfaces
//! as a parse failure instead of being silently accepted.

use serde::{Deserialize, Serialize};

/// Email category, hierarchical: `Notices` has `OTP` and `Status` subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Receipts,
    Notices,
    #[serde(rename = "Notices/OTP")]
    NoticesOtp,
    #[serde(rename = "Notices/Status")]
    NoticesStatus,
    Feeds,
    Promotions,
    Others,
}

impl Category {
    /// Backend label name for this category, `None` for categories that
    /// never get a user label.
    pub fn label(self) -> Option<TriageLabel> {
        match self {
            Category::Receipts => Some(TriageLabel::Receipts),
            Category::Notices => Some(TriageLabel::Notices),
            Category::NoticesOtp => Some(TriageLabel::NoticesOtp),
            Category::NoticesStatus => Some(TriageLabel::NoticesStatus),
            Category::Feeds => Some(TriageLabel::Feeds),
            Category::Promotions | Category::Others => None,
        }
    }

    /// All category wire names, in schema order.
    pub const WIRE_NAMES: [&'static str; 7] = [
        "Receipts",
        "Notices",
        "Notices/OTP",
        "Notices/Status",
        "Feeds",
        "Promotions",
        "Others",
    ];
}

/// One classification, as decoded from the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationResult {
    pub category: Category,
    /// Urgent — needs to be seen or replied to immediately.
    pub time_sensitive: bool,
    /// Machine-generated rather than authored by a person.
    pub machine_generated: bool,
    /// The user has to do something with this email.
    pub action_required: bool,
}

/// User labels the transition engine can add or remove.
///
/// A closed set; translation to backend label strings happens only in the
/// mutation applier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageLabel {
    Receipts,
    Notices,
    NoticesOtp,
    NoticesStatus,
    Feeds,
    Handwritten,
    ActionRequired,
}

/// Provider-level category tags, distinct from user labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryTag {
    Promotions,
    Updates,
}

/// One mailbox mutation. The transition engine emits these in a significant
/// order; the applier must preserve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    ApplyCategory(CategoryTag),
    AddLabel(TriageLabel),
    RemoveLabel(TriageLabel),
    Archive,
    MoveToInbox,
    MarkImportant,
}
