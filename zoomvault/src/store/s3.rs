//! S3-compatible blob store with path-style addressing.
//!
//! Objects are written with `x-amz-acl: public-read` and addressed as
//! `{endpoint}/{bucket}/{key}`. Requests are signed with SigV4.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::Utc;
use reqwest::{Method, StatusCode, Url};
use tracing::{debug, warn};

use super::sigv4::{amz_date, encode_path, payload_hash, SigningKey};
use super::traits::{BlobStore, BoxFuture};
use crate::config::{ConfigError, S3Config};
use crate::error::{PipelineError, PipelineResult};

/// Blob store talking to an S3-compatible endpoint.
pub struct S3BlobStore {
    client: reqwest::Client,
    endpoint: String,
    host: String,
    bucket: String,
    signing: SigningKey,
    public_base: String,
}

impl S3BlobStore {
    /// Creates a store for the configured endpoint and bucket.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the endpoint is not an absolute
    /// `http(s)` URL with a host.
    pub fn new(client: reqwest::Client, config: &S3Config) -> PipelineResult<Self> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            section: "blob_store".to_string(),
            key: "endpoint".to_string(),
            value: config.endpoint.clone(),
            reason: reason.to_string(),
        };

        let url = Url::parse(&config.endpoint).map_err(|_| invalid("not a valid URL"))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(invalid("URL has no host").into()),
        };

        Ok(Self {
            client,
            endpoint: format!("{}://{}", url.scheme(), host),
            host,
            bucket: config.bucket.clone(),
            signing: SigningKey::new(&config.access_key, &config.secret_key, &config.region),
            public_base: config.public_base(),
        })
    }

    fn object_path(&self, key: &str) -> String {
        encode_path(&format!("/{}/{}", self.bucket, key))
    }

    fn signed_request(
        &self,
        method: Method,
        key: &str,
        extra_headers: &[(&str, &str)],
        body: Bytes,
    ) -> reqwest::RequestBuilder {
        let path = self.object_path(key);
        let hash = payload_hash(&body);
        let now = Utc::now();

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), self.host.clone());
        headers.insert("x-amz-content-sha256".to_string(), hash.clone());
        headers.insert("x-amz-date".to_string(), amz_date(now));
        for (name, value) in extra_headers {
            headers.insert(name.to_string(), value.to_string());
        }

        let authorization = self
            .signing
            .authorization(method.as_str(), &path, &headers, &hash, now);

        let mut request = self
            .client
            .request(method, format!("{}{}", self.endpoint, path))
            .header("authorization", authorization);
        for (name, value) in headers.iter().filter(|(name, _)| *name != "host") {
            request = request.header(name.as_str(), value.as_str());
        }
        request.body(body)
    }
}

impl std::fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl BlobStore for S3BlobStore {
    fn exists(&self, key: &str) -> BoxFuture<'_, PipelineResult<bool>> {
        let key = key.to_string();
        Box::pin(async move {
            let response = self
                .signed_request(Method::HEAD, &key, &[], Bytes::new())
                .send()
                .await
                .map_err(|e| PipelineError::storage(&key, e))?;

            match response.status() {
                status if status.is_success() => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                status => Err(PipelineError::storage(
                    &key,
                    format!("HEAD returned HTTP {}", status.as_u16()),
                )),
            }
        })
    }

    fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> BoxFuture<'_, PipelineResult<String>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            let size = body.len();
            let response = self
                .signed_request(
                    Method::PUT,
                    &key,
                    &[
                        ("content-type", content_type.as_str()),
                        ("x-amz-acl", "public-read"),
                    ],
                    body,
                )
                .send()
                .await
                .map_err(|e| PipelineError::storage(&key, e))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                warn!(key = %key, status = status.as_u16(), "S3 upload rejected");
                return Err(PipelineError::storage(
                    &key,
                    format!("PUT returned HTTP {}: {}", status.as_u16(), detail.trim()),
                ));
            }

            debug!(key = %key, bytes = size, "Uploaded tile to S3");
            Ok(self.public_url(&key))
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}
