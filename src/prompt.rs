//! Prompt template rendering.
//!
//! Templates are plain-text files named `<name>.<ext>` under a templates
//! directory. Placeholders use the `${field}` syntax; the reserved
//! `${output_class_schema}` placeholder receives the JSON Schema of the
//! expected reply.

use crate::contract::OutputContract;
use crate::error::Result;
use crate::RelayError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Reserved placeholder replaced with the serialized output contract.
pub const SCHEMA_PLACEHOLDER: &str = "${output_class_schema}";

/// Loads templates from disk and renders them against request fields.
///
/// # Example
///
/// ```no_run
/// use llm_relay::prompt::TemplateRenderer;
/// use llm_relay::contract::{FieldType, OutputContract};
/// use serde_json::json;
///
/// # async fn run() -> llm_relay::Result<()> {
/// let renderer = TemplateRenderer::new("prompt_templates", "tpl");
/// let contract = OutputContract::new("Response").required("response", FieldType::String);
/// let prompt = renderer
///     .render("generate", &json!({"text": "hello"}), &contract)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    templates_dir: PathBuf,
    ext: String,
}

impl TemplateRenderer {
    /// Create a renderer rooted at `templates_dir`. A leading `.` on `ext` is ignored.
    pub fn new(templates_dir: impl Into<PathBuf>, ext: impl AsRef<str>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            ext: ext.as_ref().trim_start_matches('.').to_string(),
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// Resolve the on-disk path for a template name.
    pub fn template_path(&self, template_name: &str) -> PathBuf {
        self.templates_dir
            .join(format!("{}.{}", template_name, self.ext))
    }

    /// Load a template and render it.
    ///
    /// `fields` must serialize to a JSON object; its entries are substituted
    /// in order. The contract's schema then fills [`SCHEMA_PLACEHOLDER`].
    pub async fn render<F: Serialize + ?Sized>(
        &self,
        template_name: &str,
        fields: &F,
        contract: &OutputContract,
    ) -> Result<String> {
        let path = self.template_path(template_name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(RelayError::TemplateNotFound { path });
        }
        let template = tokio::fs::read_to_string(&path).await?;
        let fields = field_map(fields)?;

        tracing::debug!(
            template = %path.display(),
            fields = fields.len(),
            "rendering prompt template"
        );

        Ok(render_str(&template, &fields, &contract.schema_string()))
    }
}

/// Convert a serializable value into an ordered field map.
pub fn field_map<F: Serialize + ?Sized>(fields: &F) -> Result<Map<String, Value>> {
    match serde_json::to_value(fields)? {
        Value::Object(map) => Ok(map),
        other => Err(RelayError::Other(format!(
            "template fields must serialize to a JSON object, got {}",
            other
        ))),
    }
}

/// Substitute `${key}` placeholders and the schema placeholder in `template`.
///
/// Entries are applied in map order. Placeholders with no matching entry are
/// left as-is so one template can be shared by requests carrying different
/// fields. A value whose text itself contains a `${...}` token can be
/// substituted again by a later entry; callers passing untrusted text should
/// be aware of this.
///
/// # Example
///
/// ```
/// use llm_relay::prompt::render_str;
/// use serde_json::json;
///
/// let fields = json!({"name": "Alice", "tags": ["a", "b"]});
/// let out = render_str("Hi ${name} ${tags} ${other}", fields.as_object().unwrap(), "{}");
/// assert_eq!(out, r#"Hi Alice ["a","b"] ${other}"#);
/// ```
pub fn render_str(template: &str, fields: &Map<String, Value>, schema: &str) -> String {
    let mut rendered = template.to_string();
    for (key, value) in fields {
        let placeholder = format!("${{{}}}", key);
        rendered = rendered.replace(&placeholder, &fill_value(value));
    }
    rendered.replace(SCHEMA_PLACEHOLDER, schema)
}

/// Literal text for scalars, compact JSON for arrays and objects.
fn fill_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
