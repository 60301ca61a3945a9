//! Structured oracle — one chat-completions round trip.
//!
//! The response format is pinned to the classification JSON schema with
//! `strict` enabled, so a well-behaved backend can only answer with a
//! schema-conforming object or an explicit refusal. Validation order:
//! transport/application error, then refusal, then schema parse.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::error::OracleError;
use crate::oracle::ClassificationOracle;
use crate::triage::prompt::classification_schema;
use crate::triage::types::ClassificationResult;

/// Chat-completions backend with structured outputs.
pub struct StructuredOracle {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl StructuredOracle {
    pub fn new(base_url: &str, api_key: SecretString, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ClassificationOracle for StructuredOracle {
    async fn classify(&self, prompt: &str) -> Result<ClassificationResult, OracleError> {
        let payload = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "email_classification",
                    "strict": true,
                    "schema": classification_schema(),
                },
            },
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| OracleError::Transport {
                stage: "completion request".to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| OracleError::Transport {
            stage: "completion response".to_string(),
            reason: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(OracleError::Transport {
                stage: "completion request".to_string(),
                reason: format!("HTTP {status}: {}", text.chars().take(500).collect::<String>()),
            });
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| OracleError::Transport {
            stage: "completion response".to_string(),
            reason: format!("body is not JSON: {e}"),
        })?;
        parse_completion(&body)
    }
}

/// Validate a chat-completions response body, in contract order:
/// application error → refusal → schema parse.
fn parse_completion(body: &Value) -> Result<ClassificationResult, OracleError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        return Err(OracleError::Transport {
            stage: "completion".to_string(),
            reason: error.to_string(),
        });
    }

    let message = &body["choices"][0]["message"];
    if let Some(refusal) = message["refusal"].as_str() {
        return Err(OracleError::Refusal(refusal.to_string()));
    }

    let content = message["content"].as_str().ok_or_else(|| OracleError::Parse {
        reason: "response has no message content".to_string(),
    })?;
    serde_json::from_str(content).map_err(|e| OracleError::Parse {
        reason: format!("{e}; payload: {}", content.chars().take(200).collect::<String>()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::types::Category;

    fn completion_with_content(content: &str) -> Value {
        json!({
            "choices": [{ "message": { "content": content } }]
        })
    }

    #[test]
    fn parses_valid_completion() {
        let body = completion_with_content(
            r#"{"category":"Receipts","time_sensitive":false,"machine_generated":true,"action_required":false}"#,
        );
        let result = parse_completion(&body).unwrap();
        assert_eq!(result.category, Category::Receipts);
        assert!(result.machine_generated);
    }

    #[test]
    fn application_error_wins_over_everything() {
        let body = json!({
            "error": { "message": "insufficient quota", "type": "insufficient_quota" },
            "choices": [{ "message": { "refusal": "also set" } }]
        });
        let err = parse_completion(&body).unwrap_err();
        assert!(matches!(err, OracleError::Transport { .. }));
    }

    #[test]
    fn refusal_is_distinct_from_parse_failure() {
        let body = json!({
            "choices": [{ "message": { "refusal": "I can't help with that." } }]
        });
        match parse_completion(&body).unwrap_err() {
            OracleError::Refusal(reason) => assert!(reason.contains("can't help")),
            other => panic!("expected Refusal, got {other:?}"),
        }
    }

    #[test]
    fn off_schema_content_is_a_parse_error() {
        let body = completion_with_content(r#"{"category":"Receipts"}"#);
        assert!(matches!(
            parse_completion(&body).unwrap_err(),
            OracleError::Parse { .. }
        ));
    }

    #[test]
    fn missing_content_is_a_parse_error() {
        let body = json!({ "choices": [{ "message": {} }] });
        assert!(matches!(
            parse_completion(&body).unwrap_err(),
            OracleError::Parse { .. }
        ));
    }

    #[test]
    fn null_error_field_is_ignored() {
        let body = json!({
            "error": null,
            "choices": [{ "message": { "content":
                r#"{"category":"Others","time_sensitive":false,"machine_generated":true,"action_required":false}"# } }]
        });
        assert!(parse_completion(&body).is_ok());
    }
}
