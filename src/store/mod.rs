//! Idempotent persistence of extraction results keyed by document reference.
//!
//! A put fully replaces any previous value for the same key, so re-running a workflow for a
//! document needs no precondition checks.

mod file;
mod memory;

pub use file::FileResultStore;
pub use memory::MemoryResultStore;

use crate::pipeline::error::{ClassifiedError, ErrorClass};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Errors raised by result store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("Result store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Stored item could not be encoded or decoded.
    #[error("Result store item is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClassifiedError for StoreError {
    fn class(&self) -> ErrorClass {
        use std::io::ErrorKind;
        match self {
            Self::Io(error) => match error.kind() {
                ErrorKind::PermissionDenied | ErrorKind::InvalidInput | ErrorKind::InvalidData => {
                    ErrorClass::Validation
                }
                _ => ErrorClass::TransientInfrastructure,
            },
            Self::Serialization(_) => ErrorClass::Validation,
        }
    }
}

/// Persisted item: partition key plus the clean term string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResult {
    /// Document reference used as partition key.
    pub pk: String,
    /// Deduplicated, comma-separated terms.
    pub result: String,
    /// RFC 3339 time of the write.
    pub updated_at: String,
}

/// Confirmation returned once a put is durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistAck {
    /// Partition key that was written.
    pub pk: String,
    /// RFC 3339 time of the write.
    pub updated_at: String,
    /// Whether an earlier value for the same key was overwritten.
    pub replaced: bool,
}

/// Key-value persistence addressed by partition key only.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Write `result` under `pk`, replacing any previous value entirely.
    async fn put(&self, pk: &str, result: &str) -> Result<PersistAck, StoreError>;

    /// Look up the current value for `pk`.
    async fn get(&self, pk: &str) -> Result<Option<StoredResult>, StoreError>;
}

pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
