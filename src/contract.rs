//! Output contracts: explicit schema values describing a model reply.
//!
//! An [`OutputContract`] is embedded into the prompt (as JSON Schema) so the
//! model knows what to produce, and is used again to validate the parsed
//! reply. Rust types opt in through [`StructuredOutput`], which pairs a
//! `Deserialize` type with its contract.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON type of a single contract field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// The JSON Schema `type` keyword for this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }
}

/// One named field of an [`OutputContract`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Schema describing the shape a model reply must conform to.
///
/// # Example
///
/// ```
/// use llm_relay::contract::{FieldType, OutputContract};
/// use serde_json::json;
///
/// let contract = OutputContract::new("Response").required("response", FieldType::String);
/// assert!(contract.validate(&json!({"response": "ok"})).is_ok());
/// assert!(contract.validate(&json!({"answer": "ok"})).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputContract {
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<FieldSpec>,
}

impl OutputContract {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a fully specified field.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Shorthand: add a required field.
    pub fn required(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.field(FieldSpec::new(name, ty))
    }

    /// Shorthand: add an optional field.
    pub fn optional(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.field(FieldSpec::new(name, ty).optional())
    }

    /// Render the contract as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = Map::new();
            prop.insert("title".into(), json!(title_case(&field.name)));
            prop.insert("type".into(), json!(field.ty.as_str()));
            if let Some(ref desc) = field.description {
                prop.insert("description".into(), json!(desc));
            }
            properties.insert(field.name.clone(), Value::Object(prop));
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        let mut schema = Map::new();
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), json!(required));
        schema.insert("title".into(), json!(self.title));
        if let Some(ref desc) = self.description {
            schema.insert("description".into(), json!(desc));
        }
        schema.insert("type".into(), json!("object"));
        Value::Object(schema)
    }

    /// Canonical textual form embedded into prompts (2-space indented JSON).
    pub fn schema_string(&self) -> String {
        // Serializing a Value built from maps and strings cannot fail.
        serde_json::to_string_pretty(&self.to_json_schema()).unwrap_or_default()
    }

    /// Check a parsed reply against the contract.
    ///
    /// Required fields must be present and non-null; present fields must have
    /// the declared JSON type. Extra fields are tolerated.
    pub fn validate(&self, value: &Value) -> Result<(), ContractViolation> {
        let Some(obj) = value.as_object() else {
            return Err(ContractViolation {
                problems: vec![format!("expected a JSON object, got {}", json_type(value))],
            });
        };

        let mut problems = Vec::new();
        for field in &self.fields {
            match obj.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        problems.push(format!("missing required field '{}'", field.name));
                    }
                }
                Some(v) if !field.ty.accepts(v) => {
                    problems.push(format!(
                        "field '{}' should be {}, got {}",
                        field.name,
                        field.ty.as_str(),
                        json_type(v)
                    ));
                }
                Some(_) => {}
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ContractViolation { problems })
        }
    }
}

/// A reply that did not satisfy its [`OutputContract`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("reply violates output contract: {}", .problems.join("; "))]
pub struct ContractViolation {
    pub problems: Vec<String>,
}

/// A type whose JSON form is described by an [`OutputContract`].
///
/// The contract is declared by hand next to the type; nothing is derived
/// by reflection.
pub trait StructuredOutput: DeserializeOwned {
    fn contract() -> OutputContract;
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
