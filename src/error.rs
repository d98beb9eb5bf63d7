use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the relay and its components.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem access failed (template or credential file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider returns a non-success status code. The model client uses
    /// the status to decide between credential rotation and a plain retry.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 400, 403, 429, 503).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// A single backend call exceeded the configured per-call timeout.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    /// The requested template file does not exist.
    #[error("Template not found: {}", .path.display())]
    TemplateNotFound { path: PathBuf },

    /// The provider kept rejecting credentials until the retry budget ran out.
    #[error("All API keys failed after {attempts} attempts. Generation aborted: {message}")]
    CredentialsExhausted { attempts: u32, message: String },

    /// The reply never contained a usable, contract-conforming JSON block.
    #[error("Validation failed too many times ({attempts}): {reason}")]
    ReplyMalformed { attempts: u32, reason: String },

    /// Any other failure from the external call or local processing.
    #[error("Unexpected LLM failure after {attempts} attempts: {message}")]
    UnexpectedUpstream { attempts: u32, message: String },

    /// Invalid configuration detected at startup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of a [`RelayError`], stable enough to log or branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TemplateNotFound,
    CredentialsExhausted,
    ReplyMalformed,
    UnexpectedUpstream,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TemplateNotFound => "template_not_found",
            ErrorKind::CredentialsExhausted => "credentials_exhausted",
            ErrorKind::ReplyMalformed => "reply_malformed",
            ErrorKind::UnexpectedUpstream => "unexpected_upstream",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RelayError {
    /// Classify this error.
    ///
    /// Raw transport and HTTP errors only surface here when they escape the
    /// model client's retry loop, so they count as upstream failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::TemplateNotFound { .. } => ErrorKind::TemplateNotFound,
            RelayError::CredentialsExhausted { .. } => ErrorKind::CredentialsExhausted,
            RelayError::ReplyMalformed { .. } => ErrorKind::ReplyMalformed,
            RelayError::UnexpectedUpstream { .. }
            | RelayError::Request(_)
            | RelayError::HttpError { .. }
            | RelayError::Timeout(_) => ErrorKind::UnexpectedUpstream,
            RelayError::InvalidConfig(_) => ErrorKind::Config,
            RelayError::Json(_) | RelayError::Io(_) | RelayError::Other(_) => ErrorKind::Internal,
        }
    }
}

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        RelayError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_terminal_errors() {
        let err = RelayError::CredentialsExhausted {
            attempts: 3,
            message: "HTTP 403: denied".into(),
        };
        assert_eq!(err.kind(), ErrorKind::CredentialsExhausted);

        let err = RelayError::ReplyMalformed {
            attempts: 3,
            reason: "no ```json block".into(),
        };
        assert_eq!(err.kind(), ErrorKind::ReplyMalformed);
        assert!(err.to_string().starts_with("Validation failed too many times"));
    }

    #[test]
    fn test_template_not_found_message_names_path() {
        let err = RelayError::TemplateNotFound {
            path: PathBuf::from("prompt_templates/missing.tpl"),
        };
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
        assert_eq!(
            err.to_string(),
            "Template not found: prompt_templates/missing.tpl"
        );
    }

    #[test]
    fn test_stray_transport_errors_count_as_upstream() {
        let err = RelayError::HttpError {
            status: 502,
            body: "bad gateway".into(),
            retry_after: None,
        };
        assert_eq!(err.kind(), ErrorKind::UnexpectedUpstream);
        assert_eq!(
            RelayError::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::UnexpectedUpstream
        );
    }
}
