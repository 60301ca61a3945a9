//! Gmail REST backend for the [`Mailbox`] trait.
//!
//! Talks to the Gmail API v1 over HTTPS with a bearer token. Threads are
//! listed from the inbox, mutations go through `threads.modify`, and user
//! labels are resolved name → id with create-if-absent semantics. System
//! label ids (`INBOX`, `IMPORTANT`, `CATEGORY_*`) are used directly.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::MailboxError;
use crate::mailbox::{EmailMessage, Mailbox, ThreadSummary};

const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail-backed mailbox.
pub struct GmailMailbox {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    /// Cache of user label name → label id.
    label_ids: Mutex<HashMap<String, String>>,
}

impl GmailMailbox {
    pub fn new(token: SecretString) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
            label_ids: Mutex::new(HashMap::new()),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, MailboxError> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .query(query)
            .send()
            .await?;
        Self::into_json(resp).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, MailboxError> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await?;
        Self::into_json(resp).await
    }

    async fn into_json(resp: reqwest::Response) -> Result<Value, MailboxError> {
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(MailboxError::Api {
                status: status.as_u16(),
                message: text.chars().take(500).collect(),
            });
        }
        serde_json::from_str(&text).map_err(|e| MailboxError::Decode(e.to_string()))
    }

    /// Add/remove label ids on a thread. Gmail treats redundant adds and
    /// removes as no-ops, which gives us idempotence for free.
    async fn modify(
        &self,
        thread_id: &str,
        add: &[&str],
        remove: &[&str],
    ) -> Result<(), MailboxError> {
        self.post(
            &format!("/users/me/threads/{thread_id}/modify"),
            json!({ "addLabelIds": add, "removeLabelIds": remove }),
        )
        .await?;
        Ok(())
    }

    /// Resolve a user label name to its id, creating the label if absent.
    async fn user_label_id(&self, name: &str) -> Result<String, MailboxError> {
        if let Some(id) = self.label_ids.lock().await.get(name) {
            return Ok(id.clone());
        }

        let listing = self.get("/users/me/labels", &[]).await?;
        {
            let mut cache = self.label_ids.lock().await;
            for label in listing["labels"].as_array().into_iter().flatten() {
                if let (Some(label_name), Some(id)) =
                    (label["name"].as_str(), label["id"].as_str())
                {
                    cache.insert(label_name.to_string(), id.to_string());
                }
            }
            if let Some(id) = cache.get(name) {
                return Ok(id.clone());
            }
        }

        debug!(label = %name, "Creating missing user label");
        let created = self
            .post(
                "/users/me/labels",
                json!({
                    "name": name,
                    "labelListVisibility": "labelShow",
                    "messageListVisibility": "show",
                }),
            )
            .await?;
        let id = created["id"]
            .as_str()
            .ok_or_else(|| MailboxError::Decode("label create response missing id".into()))?
            .to_string();
        self.label_ids
            .lock()
            .await
            .insert(name.to_string(), id.clone());
        Ok(id)
    }

    /// Like [`user_label_id`] but without creating: removal of a label that
    /// was never created is a no-op.
    async fn existing_label_id(&self, name: &str) -> Result<Option<String>, MailboxError> {
        if let Some(id) = self.label_ids.lock().await.get(name) {
            return Ok(Some(id.clone()));
        }
        let listing = self.get("/users/me/labels", &[]).await?;
        let mut cache = self.label_ids.lock().await;
        for label in listing["labels"].as_array().into_iter().flatten() {
            if let (Some(label_name), Some(id)) = (label["name"].as_str(), label["id"].as_str()) {
                cache.insert(label_name.to_string(), id.to_string());
            }
        }
        Ok(cache.get(name).cloned())
    }
}

#[async_trait]
impl Mailbox for GmailMailbox {
    async fn list_candidate_threads(&self) -> Result<Vec<ThreadSummary>, MailboxError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("labelIds", "INBOX"), ("maxResults", "100")];
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.as_str()));
            }
            let page = self.get("/users/me/threads", &query).await?;
            for thread in page["threads"].as_array().into_iter().flatten() {
                if let Some(id) = thread["id"].as_str() {
                    ids.push(id.to_string());
                }
            }
            match page["nextPageToken"].as_str() {
                Some(token) => page_token = Some(token.to_string()),
                None => break,
            }
        }

        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            let thread = self
                .get(
                    &format!("/users/me/threads/{id}"),
                    &[("format", "metadata"), ("metadataHeaders", "Subject")],
                )
                .await?;
            summaries.push(summary_from_thread(&thread)?);
        }
        Ok(summaries)
    }

    async fn latest_message(&self, thread_id: &str) -> Result<EmailMessage, MailboxError> {
        let thread = self
            .get(
                &format!("/users/me/threads/{thread_id}"),
                &[("format", "full")],
            )
            .await?;
        newest_message(&thread)
    }

    async fn add_label(&self, thread_id: &str, name: &str) -> Result<(), MailboxError> {
        let id = self.user_label_id(name).await?;
        self.modify(thread_id, &[&id], &[]).await
    }

    async fn remove_label(&self, thread_id: &str, name: &str) -> Result<(), MailboxError> {
        match self.existing_label_id(name).await? {
            Some(id) => self.modify(thread_id, &[], &[&id]).await,
            None => Ok(()),
        }
    }

    async fn apply_category(&self, thread_id: &str, tag: &str) -> Result<(), MailboxError> {
        self.modify(thread_id, &[tag], &[]).await
    }

    async fn archive(&self, thread_id: &str) -> Result<(), MailboxError> {
        self.modify(thread_id, &[], &["INBOX"]).await
    }

    async fn move_to_inbox(&self, thread_id: &str) -> Result<(), MailboxError> {
        self.modify(thread_id, &["INBOX"], &[]).await
    }

    async fn set_important(&self, thread_id: &str, important: bool) -> Result<(), MailboxError> {
        if important {
            self.modify(thread_id, &["IMPORTANT"], &[]).await
        } else {
            self.modify(thread_id, &[], &["IMPORTANT"]).await
        }
    }
}

// ── Response parsing ────────────────────────────────────────────────

/// Build a [`ThreadSummary`] from a `threads.get` response.
fn summary_from_thread(thread: &Value) -> Result<ThreadSummary, MailboxError> {
    let id = thread["id"]
        .as_str()
        .ok_or_else(|| MailboxError::Decode("thread missing id".into()))?
        .to_string();
    let messages = thread["messages"]
        .as_array()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| MailboxError::Decode(format!("thread {id} has no messages")))?;

    let last_message_at = messages
        .iter()
        .filter_map(internal_date)
        .max()
        .ok_or_else(|| MailboxError::Decode(format!("thread {id} has no internalDate")))?;

    // Subject comes from the first message; folder and importance state is
    // the union over the thread's messages, matching how Gmail surfaces it.
    let subject = header(&messages[0], "Subject").unwrap_or_default().to_string();
    let has_label = |wanted: &str| {
        messages.iter().any(|m| {
            m["labelIds"]
                .as_array()
                .into_iter()
                .flatten()
                .any(|l| l.as_str() == Some(wanted))
        })
    };

    Ok(ThreadSummary {
        id,
        subject,
        last_message_at,
        in_inbox: has_label("INBOX"),
        is_important: has_label("IMPORTANT"),
    })
}

/// Extract the newest message of a `format=full` thread response.
fn newest_message(thread: &Value) -> Result<EmailMessage, MailboxError> {
    let (timestamp, newest) = thread["messages"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|m| internal_date(m).map(|ts| (ts, m)))
        .max_by_key(|(ts, _)| *ts)
        .ok_or_else(|| MailboxError::Decode("thread has no dated messages".into()))?;

    Ok(EmailMessage {
        timestamp,
        from: header(newest, "From").unwrap_or_default().to_string(),
        to: split_addresses(header(newest, "To").unwrap_or_default()),
        subject: header(newest, "Subject").unwrap_or_default().to_string(),
        body: plain_body(&newest["payload"]).unwrap_or_default(),
    })
}

/// Parse the `internalDate` epoch-millisecond string.
fn internal_date(message: &Value) -> Option<DateTime<Utc>> {
    let millis: i64 = message["internalDate"].as_str()?.parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}

/// Look up a header by name, case-insensitively.
fn header<'v>(message: &'v Value, name: &str) -> Option<&'v str> {
    message["payload"]["headers"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|h| {
            h["name"]
                .as_str()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .and_then(|h| h["value"].as_str())
}

/// Depth-first search of the MIME tree for the first `text/plain` part.
fn plain_body(payload: &Value) -> Option<String> {
    if payload["mimeType"].as_str() == Some("text/plain") {
        if let Some(data) = payload["body"]["data"].as_str() {
            return decode_body(data);
        }
    }
    for part in payload["parts"].as_array().into_iter().flatten() {
        if let Some(body) = plain_body(part) {
            return Some(body);
        }
    }
    None
}

/// Gmail body data is URL-safe base64, sometimes padded.
fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Split a To header into individual addresses.
fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread_json() -> Value {
        // "Hello from Gmail" in URL-safe base64.
        json!({
            "id": "t-123",
            "messages": [
                {
                    "internalDate": "1000",
                    "labelIds": ["INBOX"],
                    "payload": {
                        "mimeType": "text/plain",
                        "headers": [
                            {"name": "Subject", "value": "First subject"},
                            {"name": "From", "value": "alice@example.com"},
                            {"name": "To", "value": "me@example.com"}
                        ],
                        "body": {"data": "SGVsbG8gZnJvbSBHbWFpbA"}
                    }
                },
                {
                    "internalDate": "2000",
                    "labelIds": ["INBOX", "IMPORTANT"],
                    "payload": {
                        "mimeType": "multipart/alternative",
                        "headers": [
                            {"name": "subject", "value": "Re: First subject"},
                            {"name": "From", "value": "bob@example.com"},
                            {"name": "To", "value": "me@example.com, alice@example.com"}
                        ],
                        "parts": [
                            {
                                "mimeType": "text/html",
                                "body": {"data": "PGI-aHRtbDwvYj4"}
                            },
                            {
                                "mimeType": "text/plain",
                                "body": {"data": "TmV3ZXN0IHBsYWluIGJvZHk="}
                            }
                        ]
                    }
                }
            ]
        })
    }

    #[test]
    fn summary_uses_first_subject_and_newest_timestamp() {
        let summary = summary_from_thread(&thread_json()).unwrap();
        assert_eq!(summary.id, "t-123");
        assert_eq!(summary.subject, "First subject");
        assert_eq!(summary.last_message_at.timestamp_millis(), 2000);
        assert!(summary.in_inbox);
        assert!(summary.is_important);
    }

    #[test]
    fn newest_message_walks_mime_tree_for_plain_text() {
        let msg = newest_message(&thread_json()).unwrap();
        assert_eq!(msg.from, "bob@example.com");
        assert_eq!(msg.subject, "Re: First subject");
        assert_eq!(msg.to, vec!["me@example.com", "alice@example.com"]);
        assert_eq!(msg.body, "Newest plain body");
        assert_eq!(msg.timestamp.timestamp_millis(), 2000);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let thread = thread_json();
        let newest = &thread["messages"][1];
        assert_eq!(header(newest, "Subject"), Some("Re: First subject"));
    }

    #[test]
    fn decode_body_handles_padding() {
        assert_eq!(decode_body("SGVsbG8").as_deref(), Some("Hello"));
        assert_eq!(decode_body("SGVsbG8=").as_deref(), Some("Hello"));
    }

    #[test]
    fn empty_thread_is_a_decode_error() {
        let err = summary_from_thread(&json!({"id": "t", "messages": []})).unwrap_err();
        assert!(matches!(err, MailboxError::Decode(_)));
    }

    #[test]
    fn split_addresses_trims_and_drops_empties() {
        assert_eq!(
            split_addresses("a@x.com, b@y.com,"),
            vec!["a@x.com", "b@y.com"]
        );
        assert!(split_addresses("").is_empty());
    }
}
