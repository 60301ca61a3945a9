//! Error types for Mail Triage.

use std::time::Duration;

/// Top-level error type for the triage loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

/// Configuration-related errors.
///
/// Missing keys are fatal: the driver refuses to start a run without
/// credentials and a watermark, before touching the mailbox.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {key}. {hint}")]
    MissingKey { key: String, hint: String },

    #[error("Invalid value for setting {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse settings file: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mailbox backend errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Mailbox API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode message payload: {0}")]
    Decode(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),
}

/// Classification oracle errors.
///
/// Every variant fails only the current conversation; the loop driver logs
/// it and moves on without advancing the watermark.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Non-success response anywhere in either protocol. Never auto-retried.
    #[error("Oracle transport failed during {stage}: {reason}")]
    Transport { stage: String, reason: String },

    /// The model explicitly declined to classify.
    #[error("Oracle refused to classify: {0}")]
    Refusal(String),

    /// The payload came back but does not match the classification schema.
    #[error("Oracle payload failed schema validation: {reason}")]
    Parse { reason: String },

    /// The polling deadline elapsed. The remote job may still be executing;
    /// no cancellation is attempted.
    #[error("Timed out after {deadline:?} waiting for the classification job")]
    Timeout { deadline: Duration },

    /// The job reached a terminal status other than "completed".
    #[error("Classification job ended with status {status:?}")]
    JobFailed { status: String },

    /// A full scan of the session history found no assistant text block.
    #[error("No assistant reply found in session history")]
    AssistantReplyMissing,
}

impl From<reqwest::Error> for MailboxError {
    fn from(e: reqwest::Error) -> Self {
        MailboxError::Http(e.to_string())
    }
}

/// Result type alias for the triage loop.
pub type Result<T> = std::result::Result<T, Error>;
