//! Error types for reply parsing.

/// Errors returned by the reply parser.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The model reply was empty or whitespace-only.
    #[error("empty LLM response")]
    EmptyResponse,

    /// No ```` ```json ```` fenced block was found in the reply.
    #[error("no ```json block found in LLM response: {text}")]
    MissingBlock {
        /// A truncated copy of the cleaned reply (max 200 chars).
        text: String,
    },

    /// The fenced block did not contain valid JSON.
    #[error("invalid JSON in fenced block: {reason}")]
    InvalidJson {
        /// The serde error message.
        reason: String,
        /// The raw block content that failed to parse (truncated).
        raw_json: String,
    },

    /// The fenced block held valid JSON that was not an object.
    #[error("fenced block must contain a JSON object, found {found}")]
    NotAnObject {
        /// The JSON type that was found instead.
        found: &'static str,
    },
}

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_untouched() {
        assert_eq!(truncate("abc", 5), "abc");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 4), "héll...");
    }
}
