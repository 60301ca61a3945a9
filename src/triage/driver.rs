//! Loop driver — Selector → Oracle → Transition Engine → Applier → Cursor.
//!
//! One conversation at a time, in the selector's ascending order. The
//! watermark commits after each individually successful conversation, so a
//! crash mid-run resumes exactly after the last committed one. A failing
//! conversation is logged and skipped without a commit; mutations it
//! already applied stay applied (at-least-once mutation application,
//! exactly-once watermark advance).
//!
//! Nothing here runs concurrently on purpose: the polling oracle blocking
//! the loop is the backpressure against the classification backend, and
//! keeping one conversation in flight keeps the watermark semantics
//! trivial. Preventing overlapping runs is the external scheduler's job.

use std::sync::Arc;

use tracing::{error, info};

use crate::cursor::Cursor;
use crate::error::Result;
use crate::mailbox::{Mailbox, ThreadSummary};
use crate::oracle::ClassificationOracle;
use crate::triage::applier;
use crate::triage::prompt::build_prompt;
use crate::triage::selector::BatchSelector;
use crate::triage::transitions::{self, ThreadFlags};
use crate::triage::types::ClassificationResult;

/// Outcome counts for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Threads the selector picked this run.
    pub selected: usize,
    /// Threads classified, mutated, and committed.
    pub processed: usize,
    /// Threads that failed and will be retried on a later run (unless a
    /// later thread's commit moves the watermark past them).
    pub failed: usize,
}

/// The triage loop.
pub struct TriageLoop {
    mailbox: Arc<dyn Mailbox>,
    oracle: Arc<dyn ClassificationOracle>,
    selector: BatchSelector,
    body_limit: usize,
}

impl TriageLoop {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        oracle: Arc<dyn ClassificationOracle>,
        selector: BatchSelector,
        body_limit: usize,
    ) -> Self {
        Self {
            mailbox,
            oracle,
            selector,
            body_limit,
        }
    }

    /// Run one triage pass over everything past the cursor.
    pub async fn run(&self, cursor: &mut Cursor<'_>) -> Result<RunReport> {
        let listing = self.mailbox.list_candidate_threads().await?;
        let batch = self.selector.select(cursor.value(), listing);

        let mut report = RunReport {
            selected: batch.len(),
            ..RunReport::default()
        };
        info!("[{}] thread(s) need triage", batch.len());

        for thread in batch {
            match self.process_one(&thread).await {
                Ok(result) => {
                    // Commit point: this thread is done forever, even if a
                    // later run would classify it differently.
                    cursor.advance(thread.last_message_at).await?;
                    report.processed += 1;
                    info!(
                        thread = %thread.id,
                        category = ?result.category,
                        watermark = %cursor.value(),
                        "Thread committed"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        thread = %thread.id,
                        subject = %thread.subject,
                        error = %e,
                        "Triage failed for thread; watermark not advanced"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn process_one(&self, thread: &ThreadSummary) -> Result<ClassificationResult> {
        let message = self.mailbox.latest_message(&thread.id).await?;
        let prompt = build_prompt(&message, self.body_limit);

        let result = self.oracle.classify(&prompt).await?;
        info!(
            thread = %thread.id,
            subject = %message.subject,
            category = ?result.category,
            time_sensitive = result.time_sensitive,
            machine_generated = result.machine_generated,
            action_required = result.action_required,
            "Classified"
        );

        let mutations = transitions::plan(&result, ThreadFlags::from(thread));
        applier::apply(self.mailbox.as_ref(), &thread.id, &mutations).await?;
        Ok(result)
    }
}
