//! Polling oracle — assistants session protocol with an asynchronous job.
//!
//! One classification walks through: create session (skipped for a borrowed
//! session) → post the prompt → start a job → poll its status on a fixed
//! interval under a hard wall-clock deadline → read the newest assistant
//! text out of the session history → delete the session if we created it.
//!
//! The deadline bounds total latency under the external execution ceiling;
//! the interval trades latency against request volume. On timeout the
//! remote job may still be running — nothing is cancelled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::OracleError;
use crate::oracle::{ClassificationOracle, decode_payload};
use crate::triage::types::ClassificationResult;

// ── Protocol types ──────────────────────────────────────────────────

/// Remote job status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    /// Any other terminal status, carried verbatim for diagnostics.
    Other(String),
}

impl JobStatus {
    pub fn from_wire(status: &str) -> Self {
        match status {
            "queued" => JobStatus::Queued,
            "in_progress" => JobStatus::InProgress,
            "completed" => JobStatus::Completed,
            other => JobStatus::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Other(s) => s,
        }
    }

    /// Still worth polling?
    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::InProgress)
    }
}

/// A freshly started job: id plus the status the backend reported at start.
#[derive(Debug, Clone)]
pub struct StartedJob {
    pub id: String,
    pub status: JobStatus,
}

/// One content block inside a session message.
#[derive(Debug, Clone)]
pub struct ContentBlock {
    /// Block type as reported by the backend ("text", "image_file", ...).
    pub kind: String,
    /// Text value, present only for text blocks.
    pub text: Option<String>,
}

/// One message in the session history.
#[derive(Debug, Clone)]
pub struct SessionMessage {
    /// Author role; the oracle's replies carry "assistant".
    pub role: String,
    pub blocks: Vec<ContentBlock>,
}

/// Remote session protocol, as a capability so the polling state machine
/// can be driven against a scripted fake.
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn create_session(&self) -> Result<String, OracleError>;

    async fn post_message(&self, session_id: &str, content: &str) -> Result<(), OracleError>;

    async fn start_job(&self, session_id: &str) -> Result<StartedJob, OracleError>;

    async fn job_status(&self, session_id: &str, job_id: &str) -> Result<JobStatus, OracleError>;

    /// Session history, newest message first.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>, OracleError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), OracleError>;
}

// ── Polling oracle ──────────────────────────────────────────────────

/// Oracle backend that drives the session protocol.
pub struct PollingOracle {
    api: Arc<dyn SessionApi>,
    /// Caller-supplied session. Borrowed: never deleted by us.
    borrowed_session: Option<String>,
    poll_interval: Duration,
    deadline: Duration,
}

impl PollingOracle {
    pub fn new(api: Arc<dyn SessionApi>, poll_interval: Duration, deadline: Duration) -> Self {
        Self {
            api,
            borrowed_session: None,
            poll_interval,
            deadline,
        }
    }

    /// Reuse an existing session instead of creating one per call. The
    /// session stays alive after every exchange.
    pub fn with_borrowed_session(mut self, session_id: String) -> Self {
        self.borrowed_session = Some(session_id);
        self
    }

    /// Run one full exchange and return the assistant's raw text reply.
    pub async fn ask(&self, prompt: &str) -> Result<String, OracleError> {
        let (session_id, owned) = match &self.borrowed_session {
            Some(id) => (id.clone(), false),
            None => (self.api.create_session().await?, true),
        };

        let outcome = self.exchange(&session_id, prompt).await;

        // Cleanup is best-effort and must never mask the outcome.
        if owned {
            if let Err(e) = self.api.delete_session(&session_id).await {
                warn!(session = %session_id, error = %e, "Session cleanup failed");
            }
        }
        outcome
    }

    async fn exchange(&self, session_id: &str, prompt: &str) -> Result<String, OracleError> {
        self.api.post_message(session_id, prompt).await?;

        let job = self.api.start_job(session_id).await?;
        debug!(session = %session_id, job = %job.id, "Classification job started");

        let started = tokio::time::Instant::now();
        let mut status = job.status;
        while status.is_pending() {
            if started.elapsed() >= self.deadline {
                return Err(OracleError::Timeout {
                    deadline: self.deadline,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            status = self.api.job_status(session_id, &job.id).await?;
        }

        if status != JobStatus::Completed {
            return Err(OracleError::JobFailed {
                status: status.as_wire().to_string(),
            });
        }

        let history = self.api.list_messages(session_id).await?;
        extract_assistant_text(&history).ok_or(OracleError::AssistantReplyMissing)
    }
}

#[async_trait]
impl ClassificationOracle for PollingOracle {
    async fn classify(&self, prompt: &str) -> Result<ClassificationResult, OracleError> {
        let raw = self.ask(prompt).await?;
        decode_payload(&raw)
    }
}

/// Scan the history (newest first) for the first assistant message carrying
/// a text block, and return that block's text. Tolerates interleaved user
/// messages and non-text assistant output.
fn extract_assistant_text(newest_first: &[SessionMessage]) -> Option<String> {
    newest_first
        .iter()
        .filter(|m| m.role == "assistant")
        .find_map(|m| {
            m.blocks
                .iter()
                .find(|b| b.kind == "text")
                .and_then(|b| b.text.clone())
        })
}

/// Borrowed session ids must look like session ids before we send them.
pub fn validated_session_id(id: &str) -> Result<String, OracleError> {
    if id.starts_with("thread_") {
        Ok(id.to_string())
    } else {
        Err(OracleError::Transport {
            stage: "configuration".to_string(),
            reason: format!("invalid session id {id:?}, expected a thread_ prefix"),
        })
    }
}

// ── OpenAI Assistants v2 implementation ─────────────────────────────

/// [`SessionApi`] over the OpenAI Assistants v2 REST protocol: sessions are
/// threads, jobs are runs.
pub struct OpenAiSessionApi {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    assistant_id: String,
}

impl OpenAiSessionApi {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        assistant_id: &str,
    ) -> Result<Self, OracleError> {
        if !assistant_id.starts_with("asst_") {
            return Err(OracleError::Transport {
                stage: "configuration".to_string(),
                reason: format!("invalid assistant id {assistant_id:?}, expected an asst_ prefix"),
            });
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            assistant_id: assistant_id.to_string(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .header("OpenAI-Beta", "assistants=v2")
    }

    /// Send and decode, converting any non-success into a transport error
    /// tagged with the protocol stage.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        stage: &str,
    ) -> Result<Value, OracleError> {
        let response = builder.send().await.map_err(|e| OracleError::Transport {
            stage: stage.to_string(),
            reason: e.to_string(),
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| OracleError::Transport {
            stage: stage.to_string(),
            reason: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(OracleError::Transport {
                stage: stage.to_string(),
                reason: format!("HTTP {status}: {}", text.chars().take(500).collect::<String>()),
            });
        }
        serde_json::from_str(&text).map_err(|e| OracleError::Transport {
            stage: stage.to_string(),
            reason: format!("body is not JSON: {e}"),
        })
    }

    fn id_from(value: &Value, stage: &str) -> Result<String, OracleError> {
        value["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| OracleError::Transport {
                stage: stage.to_string(),
                reason: "response missing id".to_string(),
            })
    }
}

#[async_trait]
impl SessionApi for OpenAiSessionApi {
    async fn create_session(&self) -> Result<String, OracleError> {
        let body = self
            .send(self.request(reqwest::Method::POST, "/threads"), "create session")
            .await?;
        Self::id_from(&body, "create session")
    }

    async fn post_message(&self, session_id: &str, content: &str) -> Result<(), OracleError> {
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/threads/{session_id}/messages"),
            )
            .json(&json!({ "role": "user", "content": content })),
            "post message",
        )
        .await?;
        Ok(())
    }

    async fn start_job(&self, session_id: &str) -> Result<StartedJob, OracleError> {
        let body = self
            .send(
                self.request(reqwest::Method::POST, &format!("/threads/{session_id}/runs"))
                    .json(&json!({ "assistant_id": self.assistant_id })),
                "start job",
            )
            .await?;
        Ok(StartedJob {
            id: Self::id_from(&body, "start job")?,
            status: JobStatus::from_wire(body["status"].as_str().unwrap_or("queued")),
        })
    }

    async fn job_status(&self, session_id: &str, job_id: &str) -> Result<JobStatus, OracleError> {
        let body = self
            .send(
                self.request(
                    reqwest::Method::GET,
                    &format!("/threads/{session_id}/runs/{job_id}"),
                ),
                "poll job",
            )
            .await?;
        let status = body["status"].as_str().ok_or_else(|| OracleError::Transport {
            stage: "poll job".to_string(),
            reason: "run response missing status".to_string(),
        })?;
        Ok(JobStatus::from_wire(status))
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>, OracleError> {
        // The API returns messages newest-first, matching the trait contract.
        let body = self
            .send(
                self.request(
                    reqwest::Method::GET,
                    &format!("/threads/{session_id}/messages"),
                ),
                "list messages",
            )
            .await?;
        let messages = body["data"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|m| SessionMessage {
                role: m["role"].as_str().unwrap_or_default().to_string(),
                blocks: m["content"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|block| ContentBlock {
                        kind: block["type"].as_str().unwrap_or_default().to_string(),
                        text: block["text"]["value"].as_str().map(String::from),
                    })
                    .collect(),
            })
            .collect();
        Ok(messages)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), OracleError> {
        self.send(
            self.request(reqwest::Method::DELETE, &format!("/threads/{session_id}")),
            "delete session",
        )
        .await?;
        Ok(())
    }
}
