//! Error types for the language model client.

use std::time::Duration;

/// Errors from a completion backend.
///
/// These never reach callers of [`crate::LlmClient::process`]; they are
/// converted into a degraded response carrying [`LlmError::diagnostic`].
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode completion response: {0}")]
    Decode(String),
    #[error("client configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Short machine-readable code for the response `error` field.
    pub fn diagnostic(&self) -> String {
        match self {
            LlmError::Timeout(_) => "llm_timeout".to_string(),
            LlmError::Connection(_) => "llm_connection_error".to_string(),
            LlmError::Status { status, .. } => format!("llm_http_{}", status),
            LlmError::Decode(_) => "llm_decode_error".to_string(),
            LlmError::Config(_) => "llm_config_error".to_string(),
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            LlmError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            LlmError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            LlmError::Connection(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Timeout(Duration::from_secs(8));
        assert_eq!(err.to_string(), "completion request timed out after 8s");

        let err = LlmError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "upstream returned HTTP 502: bad gateway");

        let err = LlmError::Connection("refused".to_string());
        assert_eq!(err.to_string(), "connection error: refused");
    }

    #[test]
    fn test_diagnostic_codes() {
        assert_eq!(LlmError::Timeout(Duration::ZERO).diagnostic(), "llm_timeout");
        assert_eq!(
            LlmError::Connection("x".into()).diagnostic(),
            "llm_connection_error"
        );
        assert_eq!(
            LlmError::Status {
                status: 429,
                body: String::new()
            }
            .diagnostic(),
            "llm_http_429"
        );
        assert_eq!(LlmError::Decode("x".into()).diagnostic(), "llm_decode_error");
        assert_eq!(LlmError::Config("x".into()).diagnostic(), "llm_config_error");
    }
}
