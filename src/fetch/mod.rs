//! Content fetcher: loads uploaded objects and derives their format.

mod client;
mod format;

pub use client::HttpObjectStore;
pub use format::derive_format;

use crate::pipeline::error::{ClassifiedError, ErrorClass};
use crate::pipeline::{DocumentFormat, DocumentRef};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned while reading an uploaded object.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The object does not exist (404-class response).
    #[error("Object {0} not found")]
    NotFound(String),
    /// Base URL or object path could not be turned into a request URL.
    #[error("Invalid object store URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before or while receiving a response.
    #[error("Object store request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The object store responded with an unexpected status code.
    #[error("Unexpected object store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

impl ClassifiedError for FetchError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::InvalidUrl(_) => ErrorClass::Validation,
            Self::Http(error) if error.is_builder() => ErrorClass::Validation,
            Self::Http(_) => ErrorClass::TransientInfrastructure,
            Self::UnexpectedStatus { status, .. } => status_class(*status),
        }
    }
}

/// Map an HTTP status onto the failure taxonomy shared by every HTTP collaborator.
pub(crate) fn status_class(status: StatusCode) -> ErrorClass {
    if status == StatusCode::NOT_FOUND {
        ErrorClass::NotFound
    } else if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        ErrorClass::TransientInfrastructure
    } else {
        ErrorClass::Validation
    }
}

/// Raw object as returned by the store.
#[derive(Debug, Clone, Default)]
pub struct StoredObject {
    /// Object body.
    pub bytes: Vec<u8>,
    /// Declared content type, when the store reports one.
    pub content_type: Option<String>,
}

/// Read-only access to uploaded objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Load the object behind a document reference without modifying it.
    async fn get_object(&self, document: &DocumentRef) -> Result<StoredObject, FetchError>;
}

/// Document loaded by the fetch stage.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// Raw bytes.
    pub content: Vec<u8>,
    /// Derived format.
    pub format: DocumentFormat,
    /// Display name (last key segment).
    pub name: String,
}

/// Loads documents and derives their format hint.
#[derive(Clone)]
pub struct ContentFetcher {
    store: Arc<dyn ObjectStore>,
}

impl ContentFetcher {
    /// Wrap an object store.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Fetch the document and derive `{ content, format, name }`.
    pub async fn fetch(&self, document: &DocumentRef) -> Result<FetchedDocument, FetchError> {
        let StoredObject {
            bytes,
            content_type,
        } = self.store.get_object(document).await?;
        let format = derive_format(content_type.as_deref(), &document.key);
        tracing::debug!(
            document = %document,
            bytes = bytes.len(),
            content_type = ?content_type,
            format = %format,
            "Fetched document"
        );
        Ok(FetchedDocument {
            content: bytes,
            format,
            name: document.file_name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore(StoredObject);

    #[async_trait]
    impl ObjectStore for FixedStore {
        async fn get_object(&self, _document: &DocumentRef) -> Result<StoredObject, FetchError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn fetch_derives_format_and_name() {
        let fetcher = ContentFetcher::new(Arc::new(FixedStore(StoredObject {
            bytes: b"1. ebullient\n".to_vec(),
            content_type: Some("text/plain".into()),
        })));

        let fetched = fetcher
            .fetch(&DocumentRef::new("uploads", "raw/user123/list.txt"))
            .await
            .expect("fetched");

        assert_eq!(fetched.format, DocumentFormat::Text);
        assert_eq!(fetched.name, "list.txt");
        assert_eq!(fetched.content, b"1. ebullient\n");
    }

    #[test]
    fn statuses_map_onto_taxonomy() {
        assert_eq!(status_class(StatusCode::NOT_FOUND), ErrorClass::NotFound);
        assert_eq!(
            status_class(StatusCode::SERVICE_UNAVAILABLE),
            ErrorClass::TransientInfrastructure
        );
        assert_eq!(
            status_class(StatusCode::TOO_MANY_REQUESTS),
            ErrorClass::TransientInfrastructure
        );
        assert_eq!(status_class(StatusCode::FORBIDDEN), ErrorClass::Validation);
    }
}
