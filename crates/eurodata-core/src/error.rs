//! Error types for query interpretation and data fetching

use thiserror::Error;

/// Errors raised by the data layer
///
/// Most upstream trouble never reaches callers as an error: fetchers log it
/// and return an empty table. These variants cover configuration problems,
/// cache I/O and the internal-error path of handing a plan to the wrong
/// fetcher.
#[derive(Debug, Error)]
pub enum DataError {
    /// Upstream API answered with something unusable
    #[error("API error: {0}")]
    ApiError(String),

    /// Upstream returned a non-success HTTP status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        status: u16,
        url: String,
    },

    /// Plan routed to a fetcher that does not serve its provider
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Cache error
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Interpretation error (never surfaced past the interpreter)
    #[error("Interpretation error: {0}")]
    InterpretationError(String),
}

/// Result type alias for data operations
pub type Result<T> = std::result::Result<T, DataError>;

impl From<eurodata_llm::LLMError> for DataError {
    fn from(err: eurodata_llm::LLMError) -> Self {
        DataError::InterpretationError(err.to_string())
    }
}

impl From<url::ParseError> for DataError {
    fn from(err: url::ParseError) -> Self {
        DataError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataError::UnsupportedProvider("FRED".to_string());
        assert_eq!(err.to_string(), "Unsupported provider: FRED");

        let err = DataError::HttpStatus {
            status: 404,
            url: "https://example.org/data/ICP/M.XX".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404 from https://example.org/data/ICP/M.XX");
    }

    #[test]
    fn test_llm_error_conversion() {
        let err: DataError = eurodata_llm::LLMError::AuthenticationFailed.into();
        match err {
            DataError::InterpretationError(msg) => assert!(msg.contains("authentication")),
            _ => panic!("Expected InterpretationError variant"),
        }
    }
}
