//! Error types for hostcat.

use thiserror::Error;

/// Error type for hostcat operations.
///
/// List acquisition and classification failures never surface here; they are
/// recovered per source and recorded in [`crate::FetchMetadata`]. The variants
/// below stop an individual call and must be handled by the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Categories reference each other in a loop
    #[error("category reference cycle: {}", .0.join(" -> "))]
    CategoryCycle(Vec<String>),

    /// Empty or unparseable categorisation input
    #[error("invalid input: {0:?}")]
    InvalidInput(String),

    /// Dataset access is missing required configuration (e.g. Kaggle credentials)
    #[error("dataset configuration error: {0}")]
    DatasetConfig(String),

    /// Dataset loading was requested but no dataset config is present
    #[error("dataset processor not configured")]
    DatasetNotConfigured,

    /// Malformed CSV or archive
    #[error("dataset parse error: {0}")]
    DatasetParse(String),

    /// Download error
    #[error("download error: {0}")]
    Download(#[from] reqwest::Error),
}

/// Result type alias for hostcat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for a single source fetch.
///
/// Each failure class is kept apart so the message stored in the fetch
/// metadata says what went wrong. These never propagate out of a graph build.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Request exceeded the configured timeout
    #[error("timed out: {0}")]
    Timeout(String),

    /// Host name could not be resolved
    #[error("DNS lookup failed: {0}")]
    Dns(String),

    /// Socket-level failure (refused, reset, TLS)
    #[error("connection failed: {0}")]
    Connection(String),

    /// Malformed URL or unsupported scheme
    #[error("invalid source: {0}")]
    InvalidUrl(String),

    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Local read failure or body read failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => FetchError::HttpStatus(code),
            ureq::Error::Transport(t) => {
                let message = t.to_string();
                match t.kind() {
                    ureq::ErrorKind::Dns => FetchError::Dns(message),
                    ureq::ErrorKind::InvalidUrl | ureq::ErrorKind::UnknownScheme => {
                        FetchError::InvalidUrl(message)
                    }
                    _ if message.contains("timed out") => FetchError::Timeout(message),
                    _ => FetchError::Connection(message),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message() {
        let err = Error::CategoryCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "category reference cycle: a -> b -> a");
    }

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::HttpStatus(404).to_string(), "HTTP status 404");
        assert!(FetchError::InvalidUrl("ftp://x".into())
            .to_string()
            .starts_with("invalid source"));
    }
}
