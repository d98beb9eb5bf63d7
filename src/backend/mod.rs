//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over hosted model providers, translating
//! between the normalized [`LlmRequest`]/[`LlmResponse`] types and the
//! provider's HTTP API. The credential is passed per call so the
//! [`ModelClient`](crate::client::ModelClient) can rotate it between attempts.
//!
//! ## Architecture
//!
//! ```text
//! ModelClient ──► LlmRequest ──► Backend::complete(credential) ──► LlmResponse
//!                                        │
//!                              ┌─────────┴─────────┐
//!                        GeminiBackend         MockBackend
//!                  :generateContent REST    scripted replies
//! ```

pub mod backoff;
pub mod gemini;
pub mod mock;

pub use backoff::{JitterStrategy, RetryPolicy};
pub use gemini::GeminiBackend;
pub use mock::{MockBackend, MockReply};

use crate::client::GenerationConfig;
use crate::error::Result;
use crate::RelayError;
use async_trait::async_trait;
use reqwest::Client;

/// One piece of prompt content.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    /// Plain text.
    Text(String),
    /// An inline image, already base64-encoded.
    Image {
        /// MIME type, e.g. `"image/png"`.
        mime_type: String,
        /// Base64-encoded image bytes.
        data: String,
    },
}

/// Prompt content sent to the model: ordered text and image parts.
///
/// # Example
///
/// ```
/// use llm_relay::backend::Prompt;
///
/// let prompt = Prompt::from("Describe this picture.")
///     .with_image("image/png", "iVBORw0KGgo=");
/// assert_eq!(prompt.parts.len(), 2);
/// assert_eq!(prompt.text(), "Describe this picture.");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    pub parts: Vec<PromptPart>,
}

impl Prompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text part.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(PromptPart::Text(text.into()));
        self
    }

    /// Append an inline image part.
    pub fn with_image(mut self, mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        self.parts.push(PromptPart::Image {
            mime_type: mime_type.into(),
            data: data.into(),
        });
        self
    }

    /// Concatenation of all text parts (images are skipped).
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(t) => Some(t.as_str()),
                PromptPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Prompt::new().with_text(text)
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Prompt::new().with_text(text)
    }
}

/// A normalized, provider-agnostic LLM request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"gemini-2.0-flash"`).
    pub model: String,
    /// Prompt content.
    pub prompt: Prompt,
    /// Sampling configuration.
    pub config: GenerationConfig,
}

/// A normalized LLM response.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token counts, model version).
    pub metadata: Option<serde_json::Value>,
}

/// Abstraction over LLM providers.
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a single completion with the given credential.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        credential: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// How the model client reacts to a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The provider rejected the credential or its quota: rotate and retry.
    Credential,
    /// Anything else: retry with the same credential.
    Unexpected,
}

/// Classify a backend error according to the policy's credential statuses.
///
/// Only [`RelayError::HttpError`] with a status in
/// `policy.credential_statuses` is a credential failure; transport errors,
/// timeouts, and other statuses are unexpected.
pub fn classify(error: &RelayError, policy: &RetryPolicy) -> FailureClass {
    match error {
        RelayError::HttpError { status, .. } if policy.credential_statuses.contains(status) => {
            FailureClass::Credential
        }
        _ => FailureClass::Unexpected,
    }
}
