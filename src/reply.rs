//! The validated result of a model invocation.

use crate::diagnostics::InvocationDiagnostics;
use crate::error::Result;
use crate::RelayError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A contract-conforming JSON object extracted from a model reply.
#[derive(Debug, Clone)]
pub struct StructuredReply {
    /// The extracted JSON object. Always satisfies the invocation's contract.
    pub value: Value,
    /// Raw reply text, before fence extraction.
    pub raw_response: String,
    /// Model that produced the reply.
    pub model: String,
    /// Provider metadata from the accepted call (token usage, model version).
    pub metadata: Option<Value>,
    /// What it took to get here.
    pub diagnostics: InvocationDiagnostics,
}

impl StructuredReply {
    /// Deserialize the value into a typed `T`.
    ///
    /// ```ignore
    /// let reply = client.invoke(prompt, &contract).await?;
    /// let answer: GenerateResponse = reply.parse_as()?;
    /// ```
    pub fn parse_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            let snippet = crate::output_parser::error::truncate(&self.value.to_string(), 200);
            RelayError::Other(format!(
                "Failed to parse reply into target type: {}. Value (truncated): {}",
                e, snippet
            ))
        })
    }

    /// Look up a top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.value.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Answer {
        response: String,
    }

    fn reply(value: Value) -> StructuredReply {
        StructuredReply {
            raw_response: value.to_string(),
            value,
            model: "test".into(),
            metadata: None,
            diagnostics: InvocationDiagnostics::default(),
        }
    }

    #[test]
    fn test_parse_as_typed() {
        let answer: Answer = reply(json!({"response": "ok"})).parse_as().unwrap();
        assert_eq!(answer.response, "ok");
    }

    #[test]
    fn test_parse_as_mismatch_reports_value() {
        let err = reply(json!({"response": 7})).parse_as::<Answer>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Failed to parse reply"));
        assert!(msg.contains("\"response\":7"));
    }

    #[test]
    fn test_get_field() {
        let r = reply(json!({"response": "ok"}));
        assert_eq!(r.get("response"), Some(&json!("ok")));
        assert!(r.get("missing").is_none());
    }
}
