//! Configuration surface — a flat key-value settings store.
//!
//! The store holds credentials, the oracle/model identifiers, and the
//! progress watermark. It is deliberately dumb: string keys to string
//! values, no versioning, no migrations. The production implementation is
//! a single JSON file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Mutex;

use crate::error::ConfigError;

/// Settings key holding the progress watermark (epoch milliseconds).
pub const WATERMARK_KEY: &str = "last_processed_message_ts";

/// Flat key-value store for credentials and triage settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a setting, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, ConfigError>;

    /// Write a setting, creating it if absent.
    async fn set(&self, key: &str, value: &str) -> Result<(), ConfigError>;

    /// Read a setting that must exist. `hint` tells the operator how to fix
    /// the missing key.
    async fn require(&self, key: &str, hint: &str) -> Result<String, ConfigError> {
        self.get(key).await?.ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
            hint: hint.to_string(),
        })
    }
}

/// JSON-file-backed settings store.
///
/// The whole map is rewritten on every `set` — the store holds a handful of
/// keys, so this is fine.
pub struct JsonFileSettings {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl JsonFileSettings {
    /// Open a settings file, creating an empty store if the file is missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    async fn persist(&self, values: &HashMap<String, String>) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(values)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettings {
    async fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut values = self.values.lock().await;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values).await
    }
}

/// Which classification backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleBackend {
    /// Single structured-output round trip.
    Structured,
    /// Assistants session protocol with job polling.
    Assistant,
}

/// Triage loop configuration, resolved from the settings store.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub backend: OracleBackend,
    /// API key for the classification backend.
    pub api_key: SecretString,
    /// Model for the structured backend.
    pub model: String,
    /// Base URL for the classification API. OpenAI-compatible gateways work
    /// unchanged.
    pub api_base_url: String,
    /// Assistant id for the polling backend (`asst_...`).
    pub assistant_id: Option<String>,
    /// Borrowed session id. When set, the polling oracle reuses this session
    /// and never deletes it.
    pub session_id: Option<String>,
    /// Job status poll interval.
    pub poll_interval: Duration,
    /// Hard wall-clock deadline for one classification job.
    pub poll_deadline: Duration,
    /// Subject pattern excluded from triage (the scheduler's own failure
    /// notifications must never be fed back into the loop).
    pub exclude_subject: String,
    /// Plain-text body is truncated to this many characters in the prompt.
    pub body_limit: usize,
}

impl TriageConfig {
    pub const DEFAULT_MODEL: &'static str = "o3-mini";
    pub const DEFAULT_API_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
    pub const DEFAULT_POLL_DEADLINE_MS: u64 = 29_000;
    pub const DEFAULT_EXCLUDE_SUBJECT: &'static str = "mail-triage run failures";
    pub const DEFAULT_BODY_LIMIT: usize = 200_000;

    /// Resolve configuration from the settings store.
    ///
    /// The API key is required; everything else falls back to defaults.
    pub async fn from_settings(store: &dyn SettingsStore) -> Result<Self, ConfigError> {
        let api_key = store
            .require(
                "openai_api_key",
                "Set it in the settings file before running.",
            )
            .await?;

        let backend = match store.get("oracle_backend").await?.as_deref() {
            None | Some("structured") => OracleBackend::Structured,
            Some("assistant") => OracleBackend::Assistant,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "oracle_backend".to_string(),
                    message: format!("expected \"structured\" or \"assistant\", got {other:?}"),
                });
            }
        };

        let assistant_id = store.get("assistant_id").await?;
        if backend == OracleBackend::Assistant && assistant_id.is_none() {
            return Err(ConfigError::MissingKey {
                key: "assistant_id".to_string(),
                hint: "The assistant backend needs an asst_... id.".to_string(),
            });
        }

        Ok(Self {
            backend,
            api_key: SecretString::from(api_key),
            model: store
                .get("model")
                .await?
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            api_base_url: store
                .get("api_base_url")
                .await?
                .unwrap_or_else(|| Self::DEFAULT_API_BASE_URL.to_string()),
            assistant_id,
            session_id: store.get("session_id").await?,
            poll_interval: Duration::from_millis(Self::DEFAULT_POLL_INTERVAL_MS),
            poll_deadline: Duration::from_millis(Self::DEFAULT_POLL_DEADLINE_MS),
            exclude_subject: store
                .get("exclude_subject")
                .await?
                .unwrap_or_else(|| Self::DEFAULT_EXCLUDE_SUBJECT.to_string()),
            body_limit: Self::DEFAULT_BODY_LIMIT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with(pairs: &[(&str, &str)]) -> (tempfile::TempDir, JsonFileSettings) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettings::open(dir.path().join("settings.json"))
            .await
            .unwrap();
        for (k, v) in pairs {
            store.set(k, v).await.unwrap();
        }
        (dir, store)
    }

    #[tokio::test]
    async fn open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettings::open(dir.path().join("nope.json"))
            .await
            .unwrap();
        assert!(store.get("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = JsonFileSettings::open(&path).await.unwrap();
        store.set("openai_api_key", "sk-test").await.unwrap();
        drop(store);

        let reopened = JsonFileSettings::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("openai_api_key").await.unwrap().as_deref(),
            Some("sk-test")
        );
    }

    #[tokio::test]
    async fn require_reports_missing_key_with_hint() {
        let (_dir, store) = store_with(&[]).await;
        let err = store.require("openai_api_key", "Set it.").await.unwrap_err();
        match err {
            ConfigError::MissingKey { key, .. } => assert_eq!(key, "openai_api_key"),
            other => panic!("expected MissingKey, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn config_defaults() {
        let (_dir, store) = store_with(&[("openai_api_key", "sk-test")]).await;
        let config = TriageConfig::from_settings(&store).await.unwrap();
        assert_eq!(config.backend, OracleBackend::Structured);
        assert_eq!(config.model, "o3-mini");
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.poll_deadline, Duration::from_millis(29_000));
        assert!(config.session_id.is_none());
    }

    #[tokio::test]
    async fn assistant_backend_requires_assistant_id() {
        let (_dir, store) = store_with(&[
            ("openai_api_key", "sk-test"),
            ("oracle_backend", "assistant"),
        ])
        .await;
        let err = TriageConfig::from_settings(&store).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { .. }));
    }

    #[tokio::test]
    async fn unknown_backend_rejected() {
        let (_dir, store) = store_with(&[
            ("openai_api_key", "sk-test"),
            ("oracle_backend", "psychic"),
        ])
        .await;
        let err = TriageConfig::from_settings(&store).await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
