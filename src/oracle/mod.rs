//! Classification oracle — the LLM behind the triage loop.
//!
//! Two backends with divergent wire protocols sit behind one capability
//! trait:
//! - [`StructuredOracle`]: a single chat-completions round trip with a
//!   strict JSON-schema response format.
//! - [`PollingOracle`]: an assistants-style session plus an asynchronous
//!   job, polled until it terminates.
//!
//! The loop driver only ever sees [`ClassificationOracle`].

pub mod assistant;
pub mod structured;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{OracleBackend, TriageConfig};
use crate::error::OracleError;
use crate::triage::types::ClassificationResult;

pub use assistant::{OpenAiSessionApi, PollingOracle, SessionApi};
pub use structured::StructuredOracle;

/// Classify one email, rendered as prompt text, into a
/// [`ClassificationResult`].
///
/// No implementation retries internally; a failed classification fails the
/// current conversation and the caller decides what happens next.
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<ClassificationResult, OracleError>;
}

/// Create the configured oracle backend.
pub fn create_oracle(
    config: &TriageConfig,
) -> Result<Arc<dyn ClassificationOracle>, OracleError> {
    match config.backend {
        OracleBackend::Structured => Ok(Arc::new(StructuredOracle::new(
            &config.api_base_url,
            config.api_key.clone(),
            &config.model,
        ))),
        OracleBackend::Assistant => {
            // Checked during config resolution; stay defensive at the seam.
            let assistant_id =
                config
                    .assistant_id
                    .as_deref()
                    .ok_or_else(|| OracleError::Transport {
                        stage: "configuration".to_string(),
                        reason: "assistant backend selected without an assistant id".to_string(),
                    })?;
            let api = Arc::new(OpenAiSessionApi::new(
                &config.api_base_url,
                config.api_key.clone(),
                assistant_id,
            )?);
            let oracle = PollingOracle::new(api, config.poll_interval, config.poll_deadline);
            match &config.session_id {
                Some(id) => Ok(Arc::new(oracle.with_borrowed_session(
                    assistant::validated_session_id(id)?,
                ))),
                None => Ok(Arc::new(oracle)),
            }
        }
    }
}

/// Decode an oracle text payload into a classification.
///
/// The polling backend returns free text; models routinely wrap the JSON in
/// a markdown fence, so that is stripped before parsing. Everything else is
/// a schema violation.
pub fn decode_payload(raw: &str) -> Result<ClassificationResult, OracleError> {
    let text = strip_markdown_fence(raw.trim());
    serde_json::from_str(text).map_err(|e| OracleError::Parse {
        reason: format!("{e}; payload: {}", text.chars().take(200).collect::<String>()),
    })
}

fn strip_markdown_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").map(str::trim).unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::types::Category;

    #[test]
    fn decodes_bare_json() {
        let result = decode_payload(
            r#"{"category":"Feeds","time_sensitive":false,"machine_generated":true,"action_required":false}"#,
        )
        .unwrap();
        assert_eq!(result.category, Category::Feeds);
    }

    #[test]
    fn decodes_fenced_json() {
        let raw = "```json\n{\"category\":\"Promotions\",\"time_sensitive\":false,\"machine_generated\":true,\"action_required\":false}\n```";
        let result = decode_payload(raw).unwrap();
        assert_eq!(result.category, Category::Promotions);
    }

    #[test]
    fn prose_payload_is_a_parse_error() {
        let err = decode_payload("I think this is a receipt.").unwrap_err();
        assert!(matches!(err, OracleError::Parse { .. }));
    }

    #[test]
    fn fence_without_info_string() {
        let raw = "```\n{\"category\":\"Others\",\"time_sensitive\":false,\"machine_generated\":false,\"action_required\":false}\n```";
        assert!(decode_payload(raw).is_ok());
    }
}
