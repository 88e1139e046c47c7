//! Error handling for the registry enrichment pipeline
//!
//! Each layer has its own thiserror enum. Failures are contained at the
//! candidate boundary: only [`SelectionFailure`] can abort a run, everything
//! else is folded into an [`ErrorKind`] on the candidate's outcome.

use serde::Serialize;
use thiserror::Error;

use crate::store::{RecordField, RecordId};

/// Network / HTTP layer faults talking to the registry
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Malformed registry response for {company_number}: {message}")]
    MalformedBody {
        company_number: String,
        message: String,
    },

    #[error("Invalid registry URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl TransportError {
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else {
            TransportError::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Record store and code-description store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record {0} not found")]
    NotFound(RecordId),

    #[error("Invalid value {value:?} for field {field}")]
    InvalidValue { field: RecordField, value: String },

    #[error("Field {field} on record {id} does not hold an amount")]
    NotAnAmount { id: RecordId, field: RecordField },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Save of record {id} failed: {message}")]
    Save { id: RecordId, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The candidate query itself failed; nothing was processed
#[derive(Error, Debug)]
#[error("Candidate selection failed: {0}")]
pub struct SelectionFailure(#[source] pub StoreError);

/// Anything that stops one candidate from being processed
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Processing panicked: {0}")]
    Panicked(String),
}

impl ItemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ItemError::Transport(e) => ErrorKind::TransportFailure {
                message: e.to_string(),
            },
            ItemError::Store(e) => ErrorKind::ItemProcessing {
                message: e.to_string(),
            },
            ItemError::Panicked(msg) => ErrorKind::ItemProcessing {
                message: format!("panicked: {msg}"),
            },
        }
    }
}

/// Caller-facing error classification carried on outcomes and reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// Registry unreachable, timed out or returned an undecodable body
    TransportFailure { message: String },
    /// The store rejected one or more classification codes
    InvalidCode { codes: Vec<String> },
    /// Candidate query failed; the run processed nothing
    SelectionFailure { message: String },
    /// Any other fault while handling one candidate
    ItemProcessing { message: String },
}

impl From<&SelectionFailure> for ErrorKind {
    fn from(failure: &SelectionFailure) -> Self {
        ErrorKind::SelectionFailure {
            message: failure.0.to_string(),
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::TransportFailure { message } => write!(f, "transport failure: {message}"),
            ErrorKind::InvalidCode { codes } => write!(f, "invalid codes: {}", codes.join(", ")),
            ErrorKind::SelectionFailure { message } => write!(f, "selection failure: {message}"),
            ErrorKind::ItemProcessing { message } => write!(f, "item processing: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_error_kind_mapping() {
        let err = ItemError::Transport(TransportError::Timeout {
            url: "https://example.test/company/01234567".to_string(),
        });
        assert!(matches!(err.kind(), ErrorKind::TransportFailure { .. }));

        let err = ItemError::Store(StoreError::NotFound(RecordId::from("42")));
        assert_eq!(
            err.kind(),
            ErrorKind::ItemProcessing {
                message: "Record 42 not found".to_string()
            }
        );
    }

    #[test]
    fn test_error_kind_serializes_tagged() {
        let kind = ErrorKind::InvalidCode {
            codes: vec!["9999".to_string()],
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "invalid_code");
        assert_eq!(json["codes"][0], "9999");
    }
}
