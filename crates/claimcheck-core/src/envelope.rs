//! Uniform `{status, data|error, query}` wrapper returned by every worker.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Normalized outcome of one data-source call.
///
/// An empty `data` payload is a valid success ("nothing found"), distinct from
/// an `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Envelope<T> {
    Success { query: String, data: T },
    Error { query: String, error: String },
}

impl<T> Envelope<T> {
    pub fn success(query: impl Into<String>, data: T) -> Self {
        Envelope::Success {
            query: query.into(),
            data,
        }
    }

    pub fn error(query: impl Into<String>, error: impl Into<String>) -> Self {
        Envelope::Error {
            query: query.into(),
            error: error.into(),
        }
    }

    pub fn from_result(query: impl Into<String>, result: Result<T, SourceError>) -> Self {
        match result {
            Ok(data) => Envelope::success(query, data),
            Err(err) => Envelope::error(query, err.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Envelope::Success { data, .. } => Some(data),
            Envelope::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Envelope::Success { .. } => None,
            Envelope::Error { error, .. } => Some(error),
        }
    }

    pub fn query(&self) -> &str {
        match self {
            Envelope::Success { query, .. } | Envelope::Error { query, .. } => query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_status_tag() {
        let ok: Envelope<Vec<u8>> = Envelope::success("q", vec![]);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "success", "query": "q", "data": []})
        );

        let failed: Envelope<Vec<u8>> =
            Envelope::from_result("q", Err(SourceError::Timeout(20_000)));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"status": "error", "query": "q", "error": "call exceeded its 20000 ms deadline"})
        );
    }

    #[test]
    fn empty_success_is_not_an_error() {
        let ok: Envelope<Vec<String>> = Envelope::success("q", Vec::new());
        assert!(ok.is_success());
        assert_eq!(ok.data().map(Vec::len), Some(0));
        assert!(ok.error_message().is_none());
    }
}
