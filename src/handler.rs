//! Request handler for `/generate`.
//!
//! Renders the configured prompt template with the request fields and the
//! response contract, then asks the model client for a reply conforming to
//! that same contract.

use crate::client::ModelClient;
use crate::contract::{FieldSpec, FieldType, OutputContract, StructuredOutput};
use crate::error::Result;
use crate::prompt::TemplateRenderer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Template rendered when none is configured.
pub const DEFAULT_TEMPLATE: &str = "generate";

/// Body of `POST /generate`. Field order is the substitution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub text: String,
    pub context: String,
    pub rules: String,
    pub task: String,
}

/// Successful reply of `POST /generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

impl StructuredOutput for GenerateResponse {
    fn contract() -> OutputContract {
        OutputContract::new("GenerateResponse").field(
            FieldSpec::new("response", FieldType::String)
                .with_description("The answer to the task, as plain text"),
        )
    }
}

/// Turns a [`GenerateRequest`] into a [`GenerateResponse`].
#[derive(Debug)]
pub struct GenerateHandler {
    renderer: TemplateRenderer,
    client: Arc<ModelClient>,
    template_name: String,
}

impl GenerateHandler {
    pub fn new(renderer: TemplateRenderer, client: Arc<ModelClient>) -> Self {
        Self {
            renderer,
            client,
            template_name: DEFAULT_TEMPLATE.to_string(),
        }
    }

    pub fn with_template(mut self, template_name: impl Into<String>) -> Self {
        self.template_name = template_name.into();
        self
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn client(&self) -> &Arc<ModelClient> {
        &self.client
    }

    pub async fn handle(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let contract = GenerateResponse::contract();
        let prompt = self
            .renderer
            .render(&self.template_name, request, &contract)
            .await?;

        tracing::debug!(
            template = %self.template_name,
            prompt_chars = prompt.chars().count(),
            "prompt rendered"
        );

        self.client.invoke_as::<GenerateResponse>(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, RetryPolicy};
    use crate::credentials::{CredentialRing, MemoryStore};
    use crate::error::ErrorKind;
    use std::path::Path;

    const TEMPLATE: &str =
        "T=${text}\nC=${context}\nR=${rules}\nK=${task}\nSchema:\n${output_class_schema}\n";

    fn handler(dir: &Path, mock: Arc<MockBackend>) -> GenerateHandler {
        std::fs::write(dir.join("generate.tpl"), TEMPLATE).unwrap();
        let ring = CredentialRing::from_keys(vec!["k".into()], Arc::new(MemoryStore::default()))
            .unwrap();
        let client = ModelClient::builder(Arc::new(ring))
            .backend(mock)
            .retry_policy(RetryPolicy::immediate(2))
            .build();
        GenerateHandler::new(TemplateRenderer::new(dir, "tpl"), Arc::new(client))
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            text: "a".into(),
            context: "b".into(),
            rules: "c".into(),
            task: "d".into(),
        }
    }

    #[test]
    fn test_contract_requires_response_string() {
        let schema = GenerateResponse::contract().to_json_schema();
        assert_eq!(schema["required"], serde_json::json!(["response"]));
        assert_eq!(schema["properties"]["response"]["type"], "string");
    }

    #[tokio::test]
    async fn test_handle_renders_and_invokes() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockBackend::fixed("```json\n{\"response\":\"ok\"}\n```"));
        let h = handler(dir.path(), mock.clone());

        let resp = h.handle(&request()).await.unwrap();
        assert_eq!(resp.response, "ok");

        let prompt = &mock.prompts_seen()[0];
        assert!(prompt.starts_with("T=a\nC=b\nR=c\nK=d\nSchema:\n{"));
        assert!(prompt.contains("\"response\""));
        assert!(!prompt.contains("${"));
    }

    #[tokio::test]
    async fn test_missing_template_fails_before_calling_model() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockBackend::fixed("unused"));
        let h = handler(dir.path(), mock.clone()).with_template("absent");

        let err = h.handle(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
        assert_eq!(mock.calls(), 0);
    }
}
