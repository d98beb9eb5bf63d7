//! Model client: one structured invocation with retry and credential rotation.
//!
//! [`ModelClient::invoke`] sends a prompt to the configured [`Backend`],
//! extracts the single fenced ```` ```json ```` block from the reply, and
//! validates it against an [`OutputContract`]. Failures are retried inside
//! the client according to the [`RetryPolicy`]:
//!
//! ```text
//!             ┌──────────── delay ─────────────┐
//!             ▼                                │
//!  ──► Calling ──text──► ParsingReply ──bad────┤
//!       │  │                  │                │
//!       │  └─other error──────┼──(shared)──────┤
//!       │                     ▼                │
//!       │                 Succeeded            │
//!       └─credential error──► RotatingAndRetrying
//!
//!  Any counter reaching max_retries ──► Failed
//! ```
//!
//! Credential-class failures and validation failures are counted
//! separately; unexpected errors share the validation counter.

use crate::backend::{
    self, Backend, FailureClass, GeminiBackend, LlmRequest, LlmResponse, Prompt, RetryPolicy,
};
use crate::contract::{OutputContract, StructuredOutput};
use crate::credentials::{mask_credential, CredentialRing, Rotation};
use crate::diagnostics::InvocationDiagnostics;
use crate::error::{ErrorKind, Result};
use crate::events::{emit, Event, EventHandler};
use crate::output_parser;
use crate::reply::StructuredReply;
use crate::RelayError;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Sampling configuration forwarded to the provider.
///
/// Unset fields are omitted from the request, leaving the provider defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    /// Temperature (0.0 = deterministic).
    pub temperature: Option<f64>,

    /// Maximum tokens to generate.
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }
}

/// Terminal result of one invocation.
#[derive(Debug)]
pub enum Outcome {
    Success(StructuredReply),
    Failure {
        kind: ErrorKind,
        error: RelayError,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn into_result(self) -> Result<StructuredReply> {
        match self {
            Outcome::Success(reply) => Ok(reply),
            Outcome::Failure { error, .. } => Err(error),
        }
    }
}

/// Where one invocation currently stands.
enum InvocationState {
    Calling,
    ParsingReply(LlmResponse),
    RotatingAndRetrying {
        failed_index: usize,
        retry_after: Option<Duration>,
    },
    Succeeded {
        value: Value,
        raw_response: String,
        metadata: Option<Value>,
    },
    Failed(RelayError),
}

/// Client for structured model invocations.
///
/// Cheap to share behind an `Arc`; the only mutable state is the credential
/// ring, which serializes its own access.
///
/// # Example
///
/// ```ignore
/// let ring = Arc::new(CredentialRing::load(store).await?);
/// let client = ModelClient::builder(ring)
///     .model("gemini-2.0-flash")
///     .retry_policy(RetryPolicy::standard())
///     .build();
/// let reply = client.invoke("Say hi as {\"response\": ...}", &contract).await?;
/// ```
pub struct ModelClient {
    client: Client,
    base_url: String,
    backend: Arc<dyn Backend>,
    model: String,
    config: GenerationConfig,
    policy: RetryPolicy,
    credentials: Arc<CredentialRing>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl ModelClient {
    /// Create a new builder around a credential ring.
    pub fn builder(credentials: Arc<CredentialRing>) -> ModelClientBuilder {
        ModelClientBuilder {
            client: None,
            base_url: backend::gemini::DEFAULT_BASE_URL.to_string(),
            backend: None,
            model: DEFAULT_MODEL.to_string(),
            config: GenerationConfig::default(),
            policy: RetryPolicy::default(),
            credentials,
            event_handler: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn credentials(&self) -> &Arc<CredentialRing> {
        &self.credentials
    }

    /// Invoke the model and return a reply that satisfies `contract`.
    pub async fn invoke(
        &self,
        prompt: impl Into<Prompt>,
        contract: &OutputContract,
    ) -> Result<StructuredReply> {
        self.run(prompt.into(), contract, |_| Ok(()))
            .await
            .into_result()
    }

    /// Invoke the model and deserialize the reply into `T`.
    ///
    /// A reply that passes the contract but does not deserialize into `T`
    /// counts as a rejected reply and is retried.
    pub async fn invoke_as<T: StructuredOutput>(&self, prompt: impl Into<Prompt>) -> Result<T> {
        let contract = T::contract();
        let reply = self
            .run(prompt.into(), &contract, |value| {
                serde_json::from_value::<T>(value.clone())
                    .map(|_| ())
                    .map_err(|e| format!("reply does not match target type: {}", e))
            })
            .await
            .into_result()?;
        reply.parse_as()
    }

    /// Drive one invocation to a terminal [`Outcome`].
    ///
    /// `check` runs after contract validation; an `Err` rejects the reply.
    pub async fn run<C>(&self, prompt: Prompt, contract: &OutputContract, check: C) -> Outcome
    where
        C: Fn(&Value) -> std::result::Result<(), String> + Send + Sync,
    {
        let request = LlmRequest {
            model: self.model.clone(),
            prompt,
            config: self.config.clone(),
        };
        let max = self.policy.max_retries;
        let mut diag = InvocationDiagnostics::default();
        let mut state = InvocationState::Calling;

        loop {
            state = match state {
                InvocationState::Calling => {
                    diag.attempts += 1;
                    let (index, credential) = self.credentials.active().await;
                    diag.credential_index = index;
                    emit(
                        &self.event_handler,
                        Event::AttemptStart {
                            attempt: diag.attempts,
                            credential_index: index,
                        },
                    );
                    tracing::debug!(
                        attempt = diag.attempts,
                        credential = %mask_credential(&credential),
                        model = %self.model,
                        "calling model"
                    );

                    match self.call(&credential, &request).await {
                        Ok(response) => InvocationState::ParsingReply(response),
                        Err(err) => self.on_call_error(err, index, &mut diag).await,
                    }
                }

                InvocationState::ParsingReply(response) => {
                    match accept(&response.text, contract, &check) {
                        Ok(value) => InvocationState::Succeeded {
                            value,
                            raw_response: response.text,
                            metadata: response.metadata,
                        },
                        Err(reason) => {
                            diag.validation_failures += 1;
                            diag.last_error = Some(reason.clone());
                            tracing::warn!(
                                attempt = diag.attempts,
                                failures = diag.validation_failures,
                                reason = %reason,
                                "model reply rejected"
                            );
                            emit(
                                &self.event_handler,
                                Event::ReplyRejected {
                                    attempt: diag.attempts,
                                    reason: reason.clone(),
                                },
                            );
                            if diag.validation_failures >= max {
                                InvocationState::Failed(RelayError::ReplyMalformed {
                                    attempts: diag.validation_failures,
                                    reason,
                                })
                            } else {
                                self.pause(&mut diag, None).await;
                                InvocationState::Calling
                            }
                        }
                    }
                }

                InvocationState::RotatingAndRetrying {
                    failed_index,
                    retry_after,
                } => {
                    let mut same_credential = false;
                    if let Some(Rotation { from, to }) =
                        self.credentials.rotate_past(failed_index).await
                    {
                        diag.rotations += 1;
                        same_credential = to == failed_index;
                        emit(&self.event_handler, Event::CredentialRotated { from, to });
                    }
                    // A Retry-After hint only binds the credential that received it.
                    let hint = retry_after.filter(|_| same_credential);
                    self.pause(&mut diag, hint).await;
                    InvocationState::Calling
                }

                InvocationState::Succeeded {
                    value,
                    raw_response,
                    metadata,
                } => {
                    tracing::info!(
                        attempts = diag.attempts,
                        rotations = diag.rotations,
                        model = %self.model,
                        "model invocation succeeded"
                    );
                    emit(
                        &self.event_handler,
                        Event::Finished {
                            attempts: diag.attempts,
                            ok: true,
                        },
                    );
                    return Outcome::Success(StructuredReply {
                        value,
                        raw_response,
                        model: self.model.clone(),
                        metadata,
                        diagnostics: diag,
                    });
                }

                InvocationState::Failed(error) => {
                    let kind = error.kind();
                    tracing::error!(
                        kind = %kind,
                        attempts = diag.attempts,
                        error = %error,
                        "model invocation failed"
                    );
                    emit(
                        &self.event_handler,
                        Event::Finished {
                            attempts: diag.attempts,
                            ok: false,
                        },
                    );
                    return Outcome::Failure { kind, error };
                }
            };
        }
    }

    /// Classify a failed call and pick the next state.
    async fn on_call_error(
        &self,
        err: RelayError,
        index: usize,
        diag: &mut InvocationDiagnostics,
    ) -> InvocationState {
        let message = err.to_string();
        diag.last_error = Some(message.clone());
        let (status, retry_after) = match &err {
            RelayError::HttpError {
                status,
                retry_after,
                ..
            } => (*status, *retry_after),
            _ => (0, None),
        };

        match backend::classify(&err, &self.policy) {
            FailureClass::Credential => {
                diag.call_failures += 1;
                tracing::warn!(
                    attempt = diag.attempts,
                    failures = diag.call_failures,
                    credential_index = index,
                    status,
                    "credential rejected"
                );
                emit(
                    &self.event_handler,
                    Event::CredentialRejected {
                        attempt: diag.attempts,
                        credential_index: index,
                        status,
                    },
                );
                if diag.call_failures >= self.policy.max_retries {
                    InvocationState::Failed(RelayError::CredentialsExhausted {
                        attempts: diag.call_failures,
                        message,
                    })
                } else {
                    InvocationState::RotatingAndRetrying {
                        failed_index: index,
                        retry_after,
                    }
                }
            }
            FailureClass::Unexpected => {
                diag.validation_failures += 1;
                tracing::warn!(
                    attempt = diag.attempts,
                    failures = diag.validation_failures,
                    error = %message,
                    "unexpected model failure"
                );
                emit(
                    &self.event_handler,
                    Event::UpstreamError {
                        attempt: diag.attempts,
                        reason: message.clone(),
                    },
                );
                if diag.validation_failures >= self.policy.max_retries {
                    InvocationState::Failed(RelayError::UnexpectedUpstream {
                        attempts: diag.validation_failures,
                        message,
                    })
                } else {
                    self.pause(diag, retry_after).await;
                    InvocationState::Calling
                }
            }
        }
    }

    /// One backend call, bounded by the policy's per-call timeout.
    async fn call(&self, credential: &str, request: &LlmRequest) -> Result<LlmResponse> {
        let fut = self
            .backend
            .complete(&self.client, &self.base_url, credential, request);
        match self.policy.call_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| RelayError::Timeout(limit))?,
            None => fut.await,
        }
    }

    /// Sleep before the next attempt, honoring a provider hint if allowed.
    async fn pause(&self, diag: &mut InvocationDiagnostics, retry_after: Option<Duration>) {
        let delay = self
            .policy
            .delay_for_retry(diag.attempts.saturating_sub(1), retry_after);
        let delay_ms = delay.as_millis() as u64;
        emit(
            &self.event_handler,
            Event::RetryScheduled {
                attempt: diag.attempts,
                delay_ms,
            },
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        diag.backoff_total_ms += delay_ms;
    }

    /// Advance the credential cursor unconditionally.
    pub async fn rotate_credential(&self) -> Rotation {
        let rotation = self.credentials.rotate().await;
        emit(
            &self.event_handler,
            Event::CredentialRotated {
                from: rotation.from,
                to: rotation.to,
            },
        );
        rotation
    }

    /// Append a credential to the pool and persist it.
    ///
    /// Returns `Ok(false)` if it was already present.
    pub async fn add_credential(&self, credential: &str) -> Result<bool> {
        self.credentials.add(credential).await
    }
}

/// Extract, validate, and check a reply. `Err` carries the rejection reason.
fn accept<C>(text: &str, contract: &OutputContract, check: &C) -> std::result::Result<Value, String>
where
    C: Fn(&Value) -> std::result::Result<(), String>,
{
    let value = output_parser::parse_json_block(text).map_err(|e| e.to_string())?;
    contract.validate(&value).map_err(|e| e.to_string())?;
    check(&value)?;
    Ok(value)
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("config", &self.config)
            .field("policy", &self.policy)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ModelClient`].
pub struct ModelClientBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    model: String,
    config: GenerationConfig,
    policy: RetryPolicy,
    credentials: Arc<CredentialRing>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl ModelClientBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Override the provider base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the backend. Default: [`GeminiBackend`].
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn build(self) -> ModelClient {
        ModelClient {
            client: self.client.unwrap_or_default(),
            base_url: self.base_url,
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(GeminiBackend::new())),
            model: self.model,
            config: self.config,
            policy: self.policy,
            credentials: self.credentials,
            event_handler: self.event_handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockReply};
    use crate::contract::FieldType;
    use crate::credentials::MemoryStore;
    use crate::events::FnEventHandler;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Mutex;
    use std::time::Duration;

    const OK_REPLY: &str = "Sure!\n```json\n{\"response\": \"ok\"}\n```";

    fn contract() -> OutputContract {
        OutputContract::new("GenerateResponse").required("response", FieldType::String)
    }

    fn ring(n: usize) -> Arc<CredentialRing> {
        let keys = (0..n).map(|i| format!("k{}", i)).collect();
        let store = Arc::new(MemoryStore::default());
        Arc::new(CredentialRing::from_keys(keys, store).unwrap())
    }

    fn client(mock: Arc<MockBackend>, ring: Arc<CredentialRing>, max: u32) -> ModelClient {
        ModelClient::builder(ring)
            .backend(mock)
            .base_url("http://unused")
            .retry_policy(RetryPolicy::immediate(max))
            .build()
    }

    #[tokio::test]
    async fn test_valid_reply_succeeds_first_attempt() {
        let mock = Arc::new(MockBackend::fixed(OK_REPLY));
        let c = client(mock.clone(), ring(2), 3);

        let reply = c.invoke("prompt", &contract()).await.unwrap();
        assert_eq!(reply.value["response"], "ok");
        assert_eq!(reply.raw_response, OK_REPLY);
        assert_eq!(reply.model, DEFAULT_MODEL);
        assert!(reply.diagnostics.first_try());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_exhausts_without_rotation() {
        let mock = Arc::new(MockBackend::fixed("I cannot produce JSON today."));
        let ring = ring(3);
        let c = client(mock.clone(), ring.clone(), 3);

        let err = c.invoke("prompt", &contract()).await.unwrap_err();
        assert!(matches!(err, RelayError::ReplyMalformed { attempts: 3, .. }));
        assert_eq!(err.kind(), ErrorKind::ReplyMalformed);
        assert_eq!(mock.calls(), 3);
        assert_eq!(mock.credentials_seen(), vec!["k0", "k0", "k0"]);
        assert_eq!(ring.active_index().await, 0);
    }

    #[tokio::test]
    async fn test_auth_errors_rotate_max_minus_one_times() {
        let mock = Arc::new(MockBackend::always_status(403));
        let ring = ring(5);
        let c = client(mock.clone(), ring.clone(), 3);

        let err = c.invoke("prompt", &contract()).await.unwrap_err();
        assert!(matches!(err, RelayError::CredentialsExhausted { attempts: 3, .. }));
        assert!(err.to_string().starts_with("All API keys failed"));
        assert_eq!(mock.credentials_seen(), vec!["k0", "k1", "k2"]);
        assert_eq!(ring.active_index().await, 2);
    }

    #[tokio::test]
    async fn test_quota_error_rotates_then_succeeds() {
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::Status(429),
            MockReply::Text(OK_REPLY.into()),
        ]));
        let c = client(mock.clone(), ring(2), 3);

        let reply = c.invoke("prompt", &contract()).await.unwrap();
        assert_eq!(reply.diagnostics.attempts, 2);
        assert_eq!(reply.diagnostics.call_failures, 1);
        assert_eq!(reply.diagnostics.rotations, 1);
        assert_eq!(reply.diagnostics.credential_index, 1);
        assert_eq!(mock.credentials_seen(), vec!["k0", "k1"]);
    }

    #[tokio::test]
    async fn test_unexpected_errors_exhaust_shared_counter() {
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::Status(500),
            MockReply::Text("no fence".into()),
            MockReply::Failure("connection reset".into()),
        ]));
        let ring = ring(2);
        let c = client(mock.clone(), ring.clone(), 3);

        let err = c.invoke("prompt", &contract()).await.unwrap_err();
        assert!(matches!(err, RelayError::UnexpectedUpstream { attempts: 3, .. }));
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(ring.active_index().await, 0);
    }

    #[tokio::test]
    async fn test_counters_are_independent() {
        // Two credential failures and two validation failures stay under a
        // budget of 3 each.
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::Status(403),
            MockReply::Text("nope".into()),
            MockReply::Status(429),
            MockReply::Timeout,
            MockReply::Text(OK_REPLY.into()),
        ]));
        let c = client(mock.clone(), ring(3), 3);

        let reply = c.invoke("prompt", &contract()).await.unwrap();
        let d = &reply.diagnostics;
        assert_eq!(d.attempts, 5);
        assert_eq!(d.call_failures, 2);
        assert_eq!(d.validation_failures, 2);
        assert_eq!(d.rotations, 2);
    }

    #[tokio::test]
    async fn test_contract_violation_is_retried() {
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::Text("```json\n{\"answer\": \"ok\"}\n```".into()),
            MockReply::Text(OK_REPLY.into()),
        ]));
        let c = client(mock.clone(), ring(1), 3);

        let reply = c.invoke("prompt", &contract()).await.unwrap();
        assert_eq!(reply.diagnostics.validation_failures, 1);
        let last = reply.diagnostics.last_error.unwrap();
        assert!(last.contains("response"), "{}", last);
    }

    #[tokio::test]
    async fn test_run_reports_failure_kind() {
        let mock = Arc::new(MockBackend::always_status(401));
        let c = client(mock, ring(1), 2);

        let outcome = c.run(Prompt::from("p"), &contract(), |_| Ok(())).await;
        assert!(!outcome.is_success());
        match outcome {
            Outcome::Failure { kind, .. } => assert_eq!(kind, ErrorKind::CredentialsExhausted),
            Outcome::Success(_) => panic!("expected failure"),
        }
    }

    #[derive(Debug, Deserialize)]
    struct Score {
        score: u8,
    }

    impl StructuredOutput for Score {
        fn contract() -> OutputContract {
            OutputContract::new("Score").required("score", FieldType::Integer)
        }
    }

    #[tokio::test]
    async fn test_invoke_as_retries_on_type_mismatch() {
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::Text("```json\n{\"score\": 4000}\n```".into()),
            MockReply::Text("```json\n{\"score\": 7}\n```".into()),
        ]));
        let c = client(mock.clone(), ring(1), 3);

        let score: Score = c.invoke_as("rate this").await.unwrap();
        assert_eq!(score.score, 7);
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_events_trace_rotation() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::Status(403),
            MockReply::Text(OK_REPLY.into()),
        ]));
        let c = ModelClient::builder(ring(2))
            .backend(mock)
            .retry_policy(RetryPolicy::immediate(3))
            .event_handler(Arc::new(FnEventHandler(move |e: Event| {
                sink.lock().unwrap().push(e);
            })))
            .build();

        c.invoke("prompt", &contract()).await.unwrap();
        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::CredentialRotated { from: 0, to: 1 })));
        assert!(matches!(
            events.last(),
            Some(Event::Finished { attempts: 2, ok: true })
        ));
    }

    #[tokio::test]
    async fn test_fixed_delay_accumulates() {
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::Status(503),
            MockReply::Text(OK_REPLY.into()),
        ]));
        let c = ModelClient::builder(ring(1))
            .backend(mock)
            .retry_policy(RetryPolicy::fixed(3, Duration::from_millis(5)))
            .build();

        let reply = c.invoke("prompt", &contract()).await.unwrap();
        assert_eq!(reply.diagnostics.backoff_total_ms, 5);
    }

    struct SlowBackend;

    #[async_trait]
    impl Backend for SlowBackend {
        async fn complete(
            &self,
            _client: &Client,
            _base_url: &str,
            _credential: &str,
            _request: &LlmRequest,
        ) -> Result<LlmResponse> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(LlmResponse {
                text: OK_REPLY.into(),
                status: 200,
                metadata: None,
            })
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_retry_after_honored_on_same_credential() {
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::StatusRetryAfter(503, Duration::from_millis(15)),
            MockReply::Text(OK_REPLY.into()),
        ]));
        let c = client(mock, ring(2), 3);

        let reply = c.invoke("prompt", &contract()).await.unwrap();
        assert_eq!(reply.diagnostics.backoff_total_ms, 15);
    }

    #[tokio::test]
    async fn test_retry_after_ignored_when_rotating_to_new_credential() {
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::StatusRetryAfter(429, Duration::from_millis(15)),
            MockReply::Text(OK_REPLY.into()),
        ]));
        let c = client(mock.clone(), ring(2), 3);

        let reply = c.invoke("prompt", &contract()).await.unwrap();
        assert_eq!(reply.diagnostics.backoff_total_ms, 0);
        assert_eq!(mock.credentials_seen(), vec!["k0", "k1"]);
    }

    #[tokio::test]
    async fn test_retry_after_honored_with_single_credential() {
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::StatusRetryAfter(429, Duration::from_millis(15)),
            MockReply::Text(OK_REPLY.into()),
        ]));
        let c = client(mock, ring(1), 3);

        let reply = c.invoke("prompt", &contract()).await.unwrap();
        assert_eq!(reply.diagnostics.backoff_total_ms, 15);
    }

    #[tokio::test]
    async fn test_retry_after_ignored_when_disabled() {
        let mock = Arc::new(MockBackend::new(vec![
            MockReply::StatusRetryAfter(503, Duration::from_millis(15)),
            MockReply::Text(OK_REPLY.into()),
        ]));
        let c = ModelClient::builder(ring(1))
            .backend(mock)
            .base_url("http://unused")
            .retry_policy(RetryPolicy::immediate(3).with_respect_retry_after(false))
            .build();

        let reply = c.invoke("prompt", &contract()).await.unwrap();
        assert_eq!(reply.diagnostics.backoff_total_ms, 0);
    }

    struct UsageBackend;

    #[async_trait]
    impl Backend for UsageBackend {
        async fn complete(
            &self,
            _client: &Client,
            _base_url: &str,
            _credential: &str,
            _request: &LlmRequest,
        ) -> Result<LlmResponse> {
            Ok(LlmResponse {
                text: OK_REPLY.into(),
                status: 200,
                metadata: Some(serde_json::json!({"usage": {"totalTokenCount": 42}})),
            })
        }

        fn name(&self) -> &'static str {
            "usage"
        }
    }

    #[tokio::test]
    async fn test_reply_carries_provider_metadata() {
        let c = ModelClient::builder(ring(1))
            .backend(Arc::new(UsageBackend))
            .base_url("http://unused")
            .build();

        let reply = c.invoke("prompt", &contract()).await.unwrap();
        let metadata = reply.metadata.unwrap();
        assert_eq!(metadata["usage"]["totalTokenCount"], 42);
    }

    #[tokio::test]
    async fn test_call_timeout_is_unexpected_failure() {
        let c = ModelClient::builder(ring(1))
            .backend(Arc::new(SlowBackend))
            .retry_policy(
                RetryPolicy::immediate(2).with_call_timeout(Duration::from_millis(10)),
            )
            .build();

        let err = c.invoke("prompt", &contract()).await.unwrap_err();
        assert!(matches!(err, RelayError::UnexpectedUpstream { attempts: 2, .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_rotate_and_add_credential() {
        let ring = ring(2);
        let c = client(Arc::new(MockBackend::fixed(OK_REPLY)), ring.clone(), 3);

        assert_eq!(c.rotate_credential().await, Rotation { from: 0, to: 1 });
        assert_eq!(c.rotate_credential().await, Rotation { from: 1, to: 0 });
        assert!(c.add_credential("k9").await.unwrap());
        assert!(!c.add_credential("k9").await.unwrap());
        assert_eq!(ring.len().await, 3);
    }
}
