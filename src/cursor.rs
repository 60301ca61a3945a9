//! Progress cursor — one monotonic watermark timestamp.
//!
//! The watermark marks the last-message timestamp of the most recently
//! committed conversation. It only moves forward: once the loop advances
//! past a conversation, that conversation is excluded from every future
//! scan, even if some of its mutations failed (fail-open).

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{SettingsStore, WATERMARK_KEY};
use crate::error::ConfigError;

/// Watermark cursor persisted through the settings store.
///
/// An explicit object passed into the loop driver — never a global. The
/// in-memory value mirrors what was last committed to the store.
pub struct Cursor<'a> {
    store: &'a dyn SettingsStore,
    value: DateTime<Utc>,
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

impl<'a> Cursor<'a> {
    /// Load the watermark. A missing or unparseable value is fatal: running
    /// without a cursor would reprocess the entire mailbox.
    pub async fn load(store: &'a dyn SettingsStore) -> Result<Cursor<'a>, ConfigError> {
        let raw = store
            .require(
                WATERMARK_KEY,
                "Seed it with the epoch-millisecond timestamp to start from.",
            )
            .await?;
        let millis: i64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: WATERMARK_KEY.to_string(),
            message: format!("expected epoch milliseconds, got {raw:?}"),
        })?;
        let value =
            DateTime::from_timestamp_millis(millis).ok_or_else(|| ConfigError::InvalidValue {
                key: WATERMARK_KEY.to_string(),
                message: format!("{millis} is out of range"),
            })?;
        Ok(Self { store, value })
    }

    /// The current watermark.
    pub fn value(&self) -> DateTime<Utc> {
        self.value
    }

    /// Advance and persist the watermark. Non-forward moves are ignored so
    /// the cursor can never regress.
    pub async fn advance(&mut self, to: DateTime<Utc>) -> Result<(), ConfigError> {
        if to <= self.value {
            debug!(current = %self.value, requested = %to, "Ignoring non-forward cursor move");
            return Ok(());
        }
        self.store
            .set(WATERMARK_KEY, &to.timestamp_millis().to_string())
            .await?;
        self.value = to;
        Ok(())
    }
}
