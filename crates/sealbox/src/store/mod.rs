//! Remote keyed-table store client.
//!
//! The store only ever sees opaque envelope strings. Retrieval and persistence
//! failures surface as [`StoreError`] and are never retried here; retry policy
//! belongs to the caller.

pub mod http;

pub use http::HttpStore;

use async_trait::async_trait;
use common::{EnvelopeError, RecordRef};
use thiserror::Error;

/// Errors from the store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The configured endpoint is not a valid URL.
    #[error("invalid store URL: {0}")]
    InvalidUrl(String),

    /// The request could not be sent or its response could not be read.
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The read response has no envelope under the expected key.
    #[error("record {record} has no `{field}` field")]
    MissingField { record: String, field: String },

    /// The value under the expected key is not a string.
    #[error("record {record} field `{field}` is not a string")]
    NotAString { record: String, field: String },
}

impl From<StoreError> for EnvelopeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Request(_) => EnvelopeError::Transport(e.to_string()),
            StoreError::InvalidUrl(_) => EnvelopeError::Internal(e.to_string()),
            StoreError::MissingField { .. } | StoreError::NotAString { .. } => {
                EnvelopeError::Format(e.to_string())
            }
        }
    }
}

/// Retrieval and persistence of encoded envelopes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the encoded envelope stored under `record`.
    async fn fetch(&self, record: &RecordRef) -> Result<String, StoreError>;

    /// Store `envelope` under `record`, returning the store's free-text response.
    async fn persist(&self, record: &RecordRef, envelope: &str) -> Result<String, StoreError>;
}

/// Pull the envelope string out of a read response.
pub(crate) fn extract_envelope(
    body: &serde_json::Value,
    record: &RecordRef,
) -> Result<String, StoreError> {
    let field = record.field_key();
    match body.get(field) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(StoreError::NotAString {
            record: record.to_string(),
            field: field.to_owned(),
        }),
        None => Err(StoreError::MissingField {
            record: record.to_string(),
            field: field.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_by_index_key() {
        let body = json!({"2024-10-27": "AAAA", "other": "BBBB"});
        let record = RecordRef::new("journal", "2024-10-27");
        assert_eq!(extract_envelope(&body, &record).unwrap(), "AAAA");
    }

    #[test]
    fn extracts_by_explicit_field() {
        let body = json!({"data": "CCCC"});
        let record = RecordRef::new("journal", "7").with_field("data");
        assert_eq!(extract_envelope(&body, &record).unwrap(), "CCCC");
    }

    #[test]
    fn missing_field_is_a_format_error() {
        let err = extract_envelope(&json!({}), &RecordRef::new("journal", "7")).unwrap_err();
        assert!(matches!(err, StoreError::MissingField { .. }));
        assert_eq!(EnvelopeError::from(err).code(), "format");
    }

    #[test]
    fn non_string_field_is_rejected() {
        let err = extract_envelope(&json!({"7": 42}), &RecordRef::new("journal", "7"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAString { .. }));
    }
}
