//! # LLM Relay
//!
//! An HTTP relay in front of a hosted LLM. Each request is rendered into a
//! prompt from a template file, sent to the model with a bounded retry
//! budget and automatic API-key rotation, and answered with a JSON object
//! that has been extracted from the reply and checked against an output
//! contract.
//!
//! ## Core Concepts
//!
//! - **[`TemplateRenderer`]**: loads `<dir>/<name>.<ext>` and substitutes
//!   `${field}` placeholders plus the contract schema.
//! - **[`OutputContract`]**: the required shape of a reply, attached to Rust
//!   types through [`StructuredOutput`].
//! - **[`ModelClient`]**: one invocation = call, extract the fenced JSON
//!   block, validate; retry and rotate credentials on failure.
//! - **[`CredentialRing`]**: the shared key pool, persisted through a
//!   [`CredentialStore`] such as [`EnvFileStore`].
//! - **[`server::router`]**: `POST /generate` and `GET /` over axum.
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_relay::{
//!     CredentialRing, EnvFileStore, GenerateHandler, ModelClient, TemplateRenderer,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(EnvFileStore::new("api_keys.env", "GOOGLE_API_KEY"));
//!     let ring = CredentialRing::load(store).await?;
//!     let client = ModelClient::builder(Arc::new(ring)).build();
//!
//!     let handler = GenerateHandler::new(
//!         TemplateRenderer::new("prompt_templates", "tpl"),
//!         Arc::new(client),
//!     );
//!     let app = llm_relay::server::router(Arc::new(handler));
//!     let addr = "0.0.0.0:8000".parse()?;
//!     llm_relay::server::serve(addr, app, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod contract;
pub mod credentials;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod handler;
pub mod logging;
pub mod output_parser;
pub mod prompt;
pub mod reply;
pub mod server;

pub use backend::{Backend, GeminiBackend, MockBackend, Prompt, RetryPolicy};
pub use client::{GenerationConfig, ModelClient, ModelClientBuilder, Outcome};
pub use contract::{FieldSpec, FieldType, OutputContract, StructuredOutput};
pub use credentials::{CredentialRing, CredentialStore, EnvFileStore, MemoryStore};
pub use diagnostics::InvocationDiagnostics;
pub use error::{ErrorKind, RelayError, Result};
pub use handler::{GenerateHandler, GenerateRequest, GenerateResponse};
pub use prompt::TemplateRenderer;
pub use reply::StructuredReply;
