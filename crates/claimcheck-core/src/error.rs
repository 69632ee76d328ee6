use std::path::PathBuf;

use thiserror::Error;

/// Core error type for ClaimCheck.
#[derive(Debug, Error)]
pub enum ClaimCheckError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClaimCheckError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }
}

/// Failure of a single external data-source call.
///
/// These never abort a lane: workers turn them into error envelopes.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("{0} environment variable not set")]
    MissingCredential(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("call exceeded its {0} ms deadline")]
    Timeout(u64),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl SourceError {
    /// Configuration problems are reported as-is and never worth retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(self, SourceError::MissingCredential(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Network(format!("request timed out: {err}"))
        } else if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_is_configuration_error() {
        let err = SourceError::MissingCredential("GNEWS_API_KEY".into());
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "GNEWS_API_KEY environment variable not set");

        let err = SourceError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("503"));
    }
}
