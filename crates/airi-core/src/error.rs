use thiserror::Error;

/// Top-level error type for the AIRI assistant.
///
/// Subsystem crates define their own error types for their internal
/// plumbing. This enum covers what the shared core itself can fail on:
/// loading settings and (de)serializing the shared data model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AiriError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid request: {0}")]
    Validation(String),
}

impl From<toml::de::Error> for AiriError {
    fn from(err: toml::de::Error) -> Self {
        AiriError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AiriError {
    fn from(err: toml::ser::Error) -> Self {
        AiriError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AiriError {
    fn from(err: serde_json::Error) -> Self {
        AiriError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for AIRI core operations.
pub type Result<T> = std::result::Result<T, AiriError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AiriError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(AiriError, &str)> = vec![
            (
                AiriError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                AiriError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
            (
                AiriError::Validation("text is empty".to_string()),
                "Invalid request: text is empty",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AiriError = io_err.into();
        assert!(matches!(err, AiriError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let airi_err: AiriError = err.unwrap_err().into();
        assert!(matches!(airi_err, AiriError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let airi_err: AiriError = err.unwrap_err().into();
        assert!(matches!(airi_err, AiriError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let value: serde_json::Value = serde_json::from_str(r#"{"ok": true}"#)?;
            Ok(value["ok"].to_string())
        }

        assert_eq!(inner().unwrap(), "true");
    }
}
