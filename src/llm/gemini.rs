//! Google Gemini generation provider.
//!
//! Direct integration with the Gemini `generateContent` REST API. The role
//! description travels as the `systemInstruction`; the shared context is
//! the single user turn. Authentication uses an API key passed as a query
//! parameter (`GOOGLE_API_KEY` or `GEMINI_API_KEY` when not set
//! explicitly).
//!
//! The provider makes exactly one attempt per call: the engine's contract
//! treats generation failures as permanent for the current turn, so retry
//! and backoff do not live here.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::GenerationError;
use crate::llm::Generator;

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

/// Request timeout for a single generation call.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// Gemini `generateContent` provider.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    /// Gemini model name (e.g. "gemini-2.0-flash-001").
    pub model: String,
    /// API key; resolved from the environment when not given.
    api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Maximum output tokens.
    pub max_output_tokens: Option<u32>,
}

impl GeminiGenerator {
    /// Create a provider for `model`.
    ///
    /// `api_key` falls back to the `GOOGLE_API_KEY` then `GEMINI_API_KEY`
    /// environment variables.
    pub fn new(model: impl Into<String>, api_key: Option<String>) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok());
        Self {
            model: model.into(),
            api_key,
            temperature: Some(0.7),
            max_output_tokens: None,
        }
    }

    fn api_endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        )
    }

    /// Build the `generateContent` request body.
    fn build_request_body(&self, role: &str, context: &str) -> Value {
        let mut generation_config = serde_json::Map::new();
        if let Some(temp) = self.temperature {
            generation_config.insert("temperature".to_string(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = self.max_output_tokens {
            generation_config.insert("maxOutputTokens".to_string(), serde_json::json!(max_tokens));
        }

        serde_json::json!({
            "systemInstruction": {
                "parts": [{ "text": role }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": context }]
            }],
            "generationConfig": Value::Object(generation_config),
        })
    }

    /// Extract the utterance text from a `generateContent` response.
    fn parse_response(response: &Value) -> Result<String, GenerationError> {
        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown Gemini API error");
            return Err(GenerationError::Api(message.to_string()));
        }

        let parts = response
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or(GenerationError::EmptyCompletion)?;

        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }
        Ok(text)
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, role: &str, context: &str) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            GenerationError::NotConfigured(
                "Gemini API key not set; set GOOGLE_API_KEY or GEMINI_API_KEY".to_string(),
            )
        })?;

        log::debug!("GeminiGenerator.generate: model={}", self.model);

        let body = self.build_request_body(role, context);
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let response = client
            .post(self.api_endpoint())
            .query(&[("key", api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await?;

        if !status.is_success() && payload.get("error").is_none() {
            return Err(GenerationError::Api(format!(
                "Gemini API returned HTTP {status}"
            )));
        }

        Self::parse_response(&payload)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_model() {
        let generator = GeminiGenerator::new("gemini-2.0-flash-001", Some("k".into()));
        assert_eq!(
            generator.api_endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-001:generateContent"
        );
    }

    #[test]
    fn request_body_carries_role_as_system_instruction() {
        let generator = GeminiGenerator::new(DEFAULT_MODEL, Some("k".into()));
        let body = generator.build_request_body("You are the Critic.", "Topic: costs");

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are the Critic."
        );
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Topic: costs");
        assert!(body["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn parse_response_joins_text_parts() {
        let response = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": "first " }, { "text": "second" }]
                }
            }]
        });
        assert_eq!(
            GeminiGenerator::parse_response(&response).unwrap(),
            "first second"
        );
    }

    #[test]
    fn parse_response_surfaces_api_error() {
        let response = serde_json::json!({
            "error": { "message": "quota exceeded" }
        });
        match GeminiGenerator::parse_response(&response) {
            Err(GenerationError::Api(message)) => assert_eq!(message, "quota exceeded"),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn parse_response_rejects_empty_candidates() {
        let response = serde_json::json!({ "candidates": [] });
        assert!(matches!(
            GeminiGenerator::parse_response(&response),
            Err(GenerationError::EmptyCompletion)
        ));
    }
}
