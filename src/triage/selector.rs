//! Batch selector — which threads get triaged this run.
//!
//! Keeps threads newer than the watermark whose subject does not match the
//! exclusion pattern, oldest first. Ascending order is what makes
//! per-thread watermark commits correct: committing after thread N can
//! never skip an unprocessed older thread.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::ConfigError;
use crate::mailbox::ThreadSummary;

/// Filters and orders candidate threads.
#[derive(Debug)]
pub struct BatchSelector {
    exclude_subject: Regex,
}

impl BatchSelector {
    /// Build a selector with the given subject exclusion pattern. The
    /// pattern guards against reprocessing the scheduler's own failure
    /// notifications.
    pub fn new(exclude_subject: &str) -> Result<Self, ConfigError> {
        let exclude_subject =
            Regex::new(exclude_subject).map_err(|e| ConfigError::InvalidValue {
                key: "exclude_subject".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { exclude_subject })
    }

    /// Derive this run's batch from a fresh listing. Restartable: calling
    /// again with a new listing re-derives the batch from scratch.
    pub fn select(
        &self,
        watermark: DateTime<Utc>,
        threads: Vec<ThreadSummary>,
    ) -> Vec<ThreadSummary> {
        let mut batch: Vec<ThreadSummary> = threads
            .into_iter()
            .filter(|t| t.last_message_at > watermark)
            .filter(|t| !self.exclude_subject.is_match(&t.subject))
            .collect();
        batch.sort_by_key(|t| t.last_message_at);
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn thread(id: &str, millis: i64, subject: &str) -> ThreadSummary {
        ThreadSummary {
            id: id.into(),
            subject: subject.into(),
            last_message_at: Utc.timestamp_millis_opt(millis).unwrap(),
            in_inbox: true,
            is_important: false,
        }
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn keeps_only_threads_past_the_watermark() {
        let selector = BatchSelector::new("never-matches").unwrap();
        let batch = selector.select(
            at(1_000),
            vec![
                thread("old", 500, "a"),
                thread("boundary", 1_000, "b"),
                thread("new", 1_500, "c"),
            ],
        );
        // Strictly greater: the boundary thread was already committed.
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, "new");
    }

    #[test]
    fn orders_ascending_by_last_message_timestamp() {
        let selector = BatchSelector::new("never-matches").unwrap();
        let batch = selector.select(
            at(0),
            vec![
                thread("c", 3_000, "x"),
                thread("a", 1_000, "y"),
                thread("b", 2_000, "z"),
            ],
        );
        let ids: Vec<&str> = batch.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn excludes_failure_notification_subjects() {
        let selector = BatchSelector::new("mail-triage run failures").unwrap();
        let batch = selector.select(
            at(0),
            vec![
                thread("t1", 1_000, "Summary of mail-triage run failures"),
                thread("t2", 2_000, "Your receipt"),
            ],
        );
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, "t2");
    }

    #[test]
    fn empty_listing_selects_nothing() {
        let selector = BatchSelector::new("x").unwrap();
        assert!(selector.select(at(0), Vec::new()).is_empty());
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = BatchSelector::new("(unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn selection_matches_set_definition() {
        // Output = {t : t.last_message_at > W and not excluded(t.subject)}.
        let selector = BatchSelector::new("excluded").unwrap();
        let threads = vec![
            thread("a", 100, "keep"),
            thread("b", 200, "excluded subject"),
            thread("c", 300, "keep"),
            thread("d", 50, "keep"),
        ];
        let batch = selector.select(at(99), threads);
        let ids: Vec<&str> = batch.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
    }
}
