//! HTTP client abstraction for testability.
//!
//! The pipeline only ever issues plain GETs against the tile service (asset
//! page, descriptor, tile bodies). Those go through [`AsyncHttpClient`] so the
//! resolver and uploader can be driven by scripted clients in tests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::DownloadConfig;
use crate::error::NetworkError;

/// User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("zoomvault/", env!("CARGO_PKG_VERSION"));

/// Trait for async HTTP GET operations.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request and returns the full response body.
    ///
    /// Non-2xx responses are errors.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, NetworkError>> + Send;
}

impl<T: AsyncHttpClient> AsyncHttpClient for Arc<T> {
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, NetworkError>> + Send {
        self.as_ref().get(url)
    }
}

/// Async HTTP client implementation using reqwest.
///
/// Applies a per-request timeout and refuses bodies larger than
/// `max_bytes`, checking the declared length first and the streamed length
/// while reading.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: u64,
}

impl AsyncReqwestClient {
    /// Creates a client with the default 30s timeout and 10MB cap.
    pub fn new() -> Result<Self, NetworkError> {
        Self::from_config(&DownloadConfig::default())
    }

    /// Creates a client from the `[download]` configuration.
    pub fn from_config(config: &DownloadConfig) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| NetworkError::Request {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            timeout: config.timeout,
            max_bytes: config.max_tile_bytes,
        })
    }

    /// The underlying reqwest client, shared with the HTTP-backed stores.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    fn map_error(&self, url: &str, error: reqwest::Error) -> NetworkError {
        if error.is_timeout() {
            NetworkError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            NetworkError::Request {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        trace!(url = url, "HTTP GET request starting");

        let mut response = match self.client.get(url).send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(self.map_error(url, e));
            }
        };

        if !response.status().is_success() {
            warn!(
                url = url,
                status = response.status().as_u16(),
                "HTTP error status"
            );
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let too_large = || NetworkError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };

        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.map_error(url, e))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        trace!(url = url, bytes = body.len(), "HTTP response body read");
        Ok(body)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dashmap::DashMap;
    use httpmock::prelude::*;

    /// Scripted client that answers from a URL table and counts requests.
    #[derive(Default)]
    pub(crate) struct ScriptedHttpClient {
        responses: DashMap<String, Result<Vec<u8>, NetworkError>>,
        pub(crate) requests: AtomicUsize,
    }

    impl ScriptedHttpClient {
        pub(crate) fn respond(&self, url: impl Into<String>, body: Vec<u8>) {
            self.responses.insert(url.into(), Ok(body));
        }

        pub(crate) fn fail(&self, url: impl Into<String>, status: u16) {
            let url = url.into();
            self.responses
                .insert(url.clone(), Err(NetworkError::Status { url, status }));
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    impl AsyncHttpClient for ScriptedHttpClient {
        async fn get(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(url) {
                Some(entry) => entry.value().clone(),
                None => Err(NetworkError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn client_with(timeout: Duration, max_tile_bytes: u64) -> AsyncReqwestClient {
        AsyncReqwestClient::from_config(&DownloadConfig {
            timeout,
            max_tile_bytes,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/tile");
                then.status(200).body(vec![1u8, 2, 3, 4]);
            })
            .await;

        let client = AsyncReqwestClient::new().unwrap();
        let body = client.get(&server.url("/tile")).await.unwrap();

        assert_eq!(body, vec![1, 2, 3, 4]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(403);
            })
            .await;

        let client = AsyncReqwestClient::new().unwrap();
        let err = client.get(&server.url("/missing")).await.unwrap_err();

        assert!(matches!(err, NetworkError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/huge");
                then.status(200).body(vec![0u8; 2048]);
            })
            .await;

        let client = client_with(Duration::from_secs(5), 1024);
        let err = client.get(&server.url("/huge")).await.unwrap_err();

        assert!(matches!(err, NetworkError::TooLarge { limit: 1024, .. }));
    }

    #[tokio::test]
    async fn test_body_at_limit_is_accepted() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/exact");
                then.status(200).body(vec![7u8; 1024]);
            })
            .await;

        let client = client_with(Duration::from_secs(5), 1024);
        let body = client.get(&server.url("/exact")).await.unwrap();
        assert_eq!(body.len(), 1024);
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow");
                then.status(200).delay(Duration::from_secs(3)).body("late");
            })
            .await;

        let client = client_with(Duration::from_millis(200), 1024);
        let err = client.get(&server.url("/slow")).await.unwrap_err();

        assert!(matches!(err, NetworkError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_scripted_client() {
        let client = ScriptedHttpClient::default();
        client.respond("http://a", vec![1]);
        client.fail("http://b", 500);

        assert_eq!(client.get("http://a").await.unwrap(), vec![1]);
        assert!(client.get("http://b").await.is_err());
        assert!(client.get("http://c").await.is_err());
        assert_eq!(client.request_count(), 3);
    }
}
