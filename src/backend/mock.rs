//! Mock backend for testing without a live LLM.
//!
//! [`MockBackend`] plays back scripted replies and errors in order, and
//! records which credential each call used, so retry and rotation behavior
//! can be tested deterministically.
//!
//! # Example
//!
//! ```
//! use llm_relay::backend::{MockBackend, MockReply};
//!
//! let mock = MockBackend::new(vec![
//!     MockReply::Status(429),
//!     MockReply::Text("```json\n{\"response\": \"ok\"}\n```".into()),
//! ]);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::RelayError;

/// One scripted outcome of a mock call.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful reply with this text.
    Text(String),
    /// Provider error with this HTTP status.
    Status(u16),
    /// Provider error carrying a `Retry-After` hint.
    StatusRetryAfter(u16, Duration),
    /// The call times out.
    Timeout,
    /// Any other failure, with this message.
    Failure(String),
}

/// A test backend that returns scripted outcomes in order.
///
/// Cycles back to the beginning when the script is exhausted.
#[derive(Debug)]
pub struct MockBackend {
    script: Vec<MockReply>,
    index: AtomicUsize,
    credentials_seen: Mutex<Vec<String>>,
    prompts_seen: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Create a mock backend with the given script.
    pub fn new(script: Vec<MockReply>) -> Self {
        assert!(!script.is_empty(), "MockBackend requires at least one reply");
        Self {
            script,
            index: AtomicUsize::new(0),
            credentials_seen: Mutex::new(Vec::new()),
            prompts_seen: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same text.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Text(response.into())])
    }

    /// Create a mock that always fails with the given HTTP status.
    pub fn always_status(status: u16) -> Self {
        Self::new(vec![MockReply::Status(status)])
    }

    /// Create a mock whose every call fails with an unexpected error.
    pub fn always_failing(message: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Failure(message.into())])
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    /// Credentials used by each call, in order.
    pub fn credentials_seen(&self) -> Vec<String> {
        self.credentials_seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    /// Prompt text sent by each call, in order.
    pub fn prompts_seen(&self) -> Vec<String> {
        self.prompts_seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self) -> MockReply {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.script.len();
        self.script[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        credential: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        if let Ok(mut seen) = self.credentials_seen.lock() {
            seen.push(credential.to_string());
        }
        if let Ok(mut seen) = self.prompts_seen.lock() {
            seen.push(request.prompt.text());
        }

        match self.next_reply() {
            MockReply::Text(text) => Ok(LlmResponse {
                text,
                status: 200,
                metadata: Default::default(),
            }),
            MockReply::Status(status) => Err(RelayError::HttpError {
                status,
                body: format!("mock status {}", status),
                retry_after: None,
            }),
            MockReply::StatusRetryAfter(status, after) => Err(RelayError::HttpError {
                status,
                body: format!("mock status {}", status),
                retry_after: Some(after),
            }),
            MockReply::Timeout => Err(RelayError::Timeout(Duration::from_secs(30))),
            MockReply::Failure(message) => Err(RelayError::Other(message)),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
