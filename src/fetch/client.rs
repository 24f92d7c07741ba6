//! HTTP client for path-style object stores.

use crate::config::get_config;
use crate::fetch::{FetchError, ObjectStore, StoredObject};
use crate::pipeline::DocumentRef;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header::CONTENT_TYPE};
use std::time::Duration;

/// Reads objects with `GET {base}/{bucket}/{key}`.
pub struct HttpObjectStore {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
}

impl HttpObjectStore {
    /// Construct a client using configuration derived from the environment.
    pub fn new() -> Result<Self, FetchError> {
        let config = get_config();
        Self::with_base_url(&config.object_store_url, config.fetch_timeout())
    }

    /// Construct a client against an explicit base URL.
    ///
    /// A read that outlives `timeout` fails with a transient error so the fetch stage retries it.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent("wordcollect/fetch")
            .timeout(timeout)
            .build()?;
        let base_url = Url::parse(base_url).map_err(|err| FetchError::InvalidUrl(err.to_string()))?;
        tracing::debug!(
            url = %base_url,
            timeout_ms = timeout.as_millis() as u64,
            "Initialized object store HTTP client"
        );
        Ok(Self { client, base_url })
    }

    fn object_url(&self, document: &DocumentRef) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| FetchError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty();
            segments.push(&document.bucket);
            segments.extend(document.key.split('/'));
        }
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(&self, document: &DocumentRef) -> Result<StoredObject, FetchError> {
        let url = self.object_url(document)?;
        let response = self.client.get(url).send().await?;

        match response.status() {
            status if status.is_success() => {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let bytes = response.bytes().await?.to_vec();
                Ok(StoredObject {
                    bytes,
                    content_type,
                })
            }
            StatusCode::NOT_FOUND => {
                tracing::warn!(document = %document, "Object not found");
                Err(FetchError::NotFound(document.to_string()))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = FetchError::UnexpectedStatus { status, body };
                tracing::error!(document = %document, error = %error, "Object store request failed");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::{ClassifiedError, ErrorClass};
    use httpmock::{Method::GET, MockServer};

    fn store_for(server: &MockServer) -> HttpObjectStore {
        HttpObjectStore::with_base_url(&server.base_url(), Duration::from_secs(5)).expect("store")
    }

    #[tokio::test]
    async fn get_object_returns_body_and_content_type() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/uploads/raw/user123/list.txt");
                then.status(200)
                    .header("content-type", "text/plain")
                    .body("1. ebullient\n2. laconic\n");
            })
            .await;

        let object = store_for(&server)
            .get_object(&DocumentRef::new("uploads", "raw/user123/list.txt"))
            .await
            .expect("object");

        mock.assert();
        assert_eq!(object.content_type.as_deref(), Some("text/plain"));
        assert_eq!(object.bytes, b"1. ebullient\n2. laconic\n");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/uploads/raw/u/gone.txt");
                then.status(404);
            })
            .await;

        let error = store_for(&server)
            .get_object(&DocumentRef::new("uploads", "raw/u/gone.txt"))
            .await
            .expect_err("not found");

        assert!(matches!(error, FetchError::NotFound(_)));
        assert_eq!(error.class(), ErrorClass::NotFound);
    }

    #[tokio::test]
    async fn throttling_is_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/uploads/raw/u/busy.txt");
                then.status(503).body("slow down");
            })
            .await;

        let error = store_for(&server)
            .get_object(&DocumentRef::new("uploads", "raw/u/busy.txt"))
            .await
            .expect_err("unavailable");

        assert_eq!(error.class(), ErrorClass::TransientInfrastructure);
        assert!(error.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn hung_store_times_out_as_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/uploads/raw/u/stuck.txt");
                then.status(200)
                    .delay(Duration::from_secs(5))
                    .body("late");
            })
            .await;
        let store = HttpObjectStore::with_base_url(&server.base_url(), Duration::from_millis(200))
            .expect("store");

        let error = tokio::time::timeout(
            Duration::from_secs(3),
            store.get_object(&DocumentRef::new("uploads", "raw/u/stuck.txt")),
        )
        .await
        .expect("request timeout fires before the outer guard")
        .expect_err("timed out");

        match &error {
            FetchError::Http(inner) => assert!(inner.is_timeout()),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(error.class(), ErrorClass::TransientInfrastructure);
    }

    #[test]
    fn object_url_encodes_key_segments() {
        let store = HttpObjectStore::with_base_url("http://127.0.0.1:9000/", Duration::from_secs(5))
            .expect("store");
        let url = store
            .object_url(&DocumentRef::new("uploads", "raw/user 1/my notes.html"))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/uploads/raw/user%201/my%20notes.html"
        );
    }
}
