//! JSON payload extraction from model replies.

use serde_json::Value;

use crate::output_parser::error::{truncate, ParseError};
use crate::output_parser::extract::find_fence_content;

/// Extract the JSON object embedded in a ```` ```json ```` block.
///
/// The object is read with serde from the start of the fence content, so
/// backticks or tags inside its strings never end the block early. Only
/// whitespace may separate the object from the closing fence. Prose-only
/// replies and bare JSON without a fence are rejected: the model is asked
/// for a fenced block and anything else is treated as a malformed reply.
///
/// # Examples
///
/// ```
/// use llm_relay::output_parser::parse_json_block;
///
/// let reply = "<think>ok</think>Result:\n```json\n{\"response\": \"hi\"}\n```";
/// let value = parse_json_block(reply).unwrap();
/// assert_eq!(value["response"], "hi");
/// ```
pub fn parse_json_block(response: &str) -> Result<Value, ParseError> {
    let text = response.trim();
    if text.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let missing = || ParseError::MissingBlock {
        text: truncate(text, 200),
    };

    let start = find_fence_content(text, "json").ok_or_else(missing)?;
    let body = &text[start..];

    let mut stream = serde_json::Deserializer::from_str(body).into_iter::<Value>();
    let value = match stream.next() {
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            let preview = body.split("```").next().unwrap_or(body).trim();
            return Err(ParseError::InvalidJson {
                reason: e.to_string(),
                raw_json: truncate(preview, 200),
            });
        }
        None => return Err(missing()),
    };

    if !body[stream.byte_offset()..].trim_start().starts_with("```") {
        return Err(missing());
    }

    if !value.is_object() {
        return Err(ParseError::NotAnObject {
            found: match value {
                Value::Array(_) => "array",
                Value::String(_) => "string",
                Value::Number(_) => "number",
                Value::Bool(_) => "boolean",
                _ => "null",
            },
        });
    }

    Ok(value)
}
