//! Backend for Google's Gemini `generateContent` REST API.
//!
//! Endpoint: `{base}/v1beta/models/{model}:generateContent`, authenticated
//! with the `x-goog-api-key` header. Invalid keys come back as HTTP 400,
//! revoked or unauthorized keys as 403, and exhausted quota as 429.

use super::{Backend, LlmRequest, LlmResponse, PromptPart};
use crate::error::Result;
use crate::RelayError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

/// Public Gemini API host.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Backend for the Gemini API.
#[derive(Debug, Clone, Default)]
pub struct GeminiBackend;

impl GeminiBackend {
    pub fn new() -> Self {
        Self
    }

    fn endpoint(base_url: &str, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        )
    }

    /// Build the request body for `:generateContent`.
    fn build_body(request: &LlmRequest) -> Value {
        let parts: Vec<Value> = request
            .prompt
            .parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => json!({"text": text}),
                PromptPart::Image { mime_type, data } => json!({
                    "inline_data": {"mime_type": mime_type, "data": data}
                }),
            })
            .collect();

        let mut body = json!({
            "contents": [{"role": "user", "parts": parts}],
        });

        let mut generation = Map::new();
        if let Some(t) = request.config.temperature {
            generation.insert("temperature".into(), json!(t));
        }
        if let Some(n) = request.config.max_output_tokens {
            generation.insert("maxOutputTokens".into(), json!(n));
        }
        if !generation.is_empty() {
            body["generationConfig"] = Value::Object(generation);
        }

        body
    }

    /// Parse a `Retry-After` header value as seconds.
    fn parse_retry_after(value: &str) -> Option<std::time::Duration> {
        value
            .trim()
            .parse::<u64>()
            .ok()
            .map(std::time::Duration::from_secs)
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(json_resp: &Value) -> Result<String> {
        let parts = json_resp
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array());

        let text: String = parts
            .into_iter()
            .flatten()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect();

        if text.is_empty() {
            let reason = json_resp
                .get("promptFeedback")
                .and_then(|f| f.get("blockReason"))
                .and_then(|r| r.as_str())
                .unwrap_or("no text in response");
            return Err(RelayError::Other(format!(
                "Gemini returned no content: {}",
                reason
            )));
        }

        Ok(text)
    }

    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = Map::new();
        if let Some(v) = json_resp.get("usageMetadata") {
            meta.insert("usage".into(), v.clone());
        }
        if let Some(v) = json_resp.get("modelVersion") {
            meta.insert("model".into(), v.clone());
        }
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

#[async_trait]
impl Backend for GeminiBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        credential: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let url = Self::endpoint(base_url, &request.model);
        let body = Self::build_body(request);

        let resp = client
            .post(&url)
            .header("x-goog-api-key", credential)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(Self::parse_retry_after);
            let text = resp.text().await.unwrap_or_default();
            return Err(RelayError::HttpError {
                status,
                body: text,
                retry_after,
            });
        }

        let json_resp: Value = resp.json().await?;

        Ok(LlmResponse {
            text: Self::extract_text(&json_resp)?,
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Prompt;
    use crate::client::GenerationConfig;

    fn request(prompt: Prompt, config: GenerationConfig) -> LlmRequest {
        LlmRequest {
            model: "gemini-2.0-flash".into(),
            prompt,
            config,
        }
    }

    #[test]
    fn test_endpoint_trims_slash() {
        assert_eq!(
            GeminiBackend::endpoint("https://example.test/", "gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_build_body_text_and_image() {
        let prompt = Prompt::from("describe").with_image("image/png", "AAAA");
        let body = GeminiBackend::build_body(&request(prompt, GenerationConfig::default()));
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AAAA");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_build_body_generation_config() {
        let config = GenerationConfig::default()
            .with_temperature(0.2)
            .with_max_output_tokens(512);
        let body = GeminiBackend::build_body(&request("x".into(), config));
        assert_eq!(body["generationConfig"]["temperature"], 0.2);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let resp = json!({
            "candidates": [{"content": {"parts": [{"text": "```json\n"}, {"text": "{}\n```"}]}}],
            "usageMetadata": {"totalTokenCount": 12}
        });
        assert_eq!(GeminiBackend::extract_text(&resp).unwrap(), "```json\n{}\n```");
        let meta = GeminiBackend::extract_metadata(&resp).unwrap();
        assert_eq!(meta["usage"]["totalTokenCount"], 12);
    }

    #[test]
    fn test_extract_text_blocked_prompt() {
        let resp = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = GeminiBackend::extract_text(&resp).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(
            GeminiBackend::parse_retry_after(" 30 "),
            Some(std::time::Duration::from_secs(30))
        );
        assert_eq!(GeminiBackend::parse_retry_after("soon"), None);
    }
}
