//! Metadata store backed by a Strapi-style CMS content API.
//!
//! | Operation | Request |
//! |---|---|
//! | find tile | `GET {base}/api/{tiles}?filters[tileID][$eq]={id}` |
//! | create tile | `POST {base}/api/{tiles}` with `{"data":{"tileID","tileURL"}}` |
//! | progress | `PUT {base}/api/{jobs}/{job_id}` with `{"data":{"{field}":n}}` |
//!
//! A `400` whose body mentions uniqueness is a duplicate record.

use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{BoxFuture, MetadataStore, TileRecord};
use crate::config::MetadataConfig;
use crate::error::{PipelineError, PipelineResult};

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Vec<Entry>,
}

#[derive(Deserialize)]
struct Entry {
    attributes: TileFields,
}

#[derive(Deserialize, Serialize)]
struct TileFields {
    #[serde(rename = "tileID")]
    tile_id: String,
    #[serde(rename = "tileURL")]
    tile_url: String,
}

#[derive(Serialize)]
struct Envelope<T> {
    data: T,
}

/// REST client for the CMS tile and job collections.
pub struct CmsMetadataStore {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    tile_collection: String,
    job_collection: String,
    progress_field: String,
}

impl CmsMetadataStore {
    pub fn new(client: reqwest::Client, base_url: &str, config: &MetadataConfig) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            tile_collection: config.tile_collection.clone(),
            job_collection: config.job_collection.clone(),
            progress_field: config.progress_field.clone(),
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/api/{}", self.base_url, collection)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url);
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_json<T: Serialize>(
        &self,
        method: Method,
        url: &str,
        body: &T,
    ) -> PipelineResult<(StatusCode, String)> {
        let url = parse_url(url)?;
        let body = serde_json::to_vec(body).map_err(|e| PipelineError::Metadata(e.to_string()))?;
        let response = self
            .request(method, url)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(metadata_error)?;

        let status = response.status();
        let text = response.text().await.map_err(metadata_error)?;
        Ok((status, text))
    }
}

impl MetadataStore for CmsMetadataStore {
    fn find_tile_by_id(&self, tile_id: &str) -> BoxFuture<'_, PipelineResult<Option<TileRecord>>> {
        let tile_id = tile_id.to_string();
        Box::pin(async move {
            let url = Url::parse_with_params(
                &self.collection_url(&self.tile_collection),
                &[("filters[tileID][$eq]", tile_id.as_str())],
            )
            .map_err(|e| PipelineError::Metadata(e.to_string()))?;

            let response = self
                .request(Method::GET, url)
                .send()
                .await
                .map_err(metadata_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(PipelineError::Metadata(format!(
                    "tile lookup returned HTTP {}",
                    status.as_u16()
                )));
            }

            let body = response.bytes().await.map_err(metadata_error)?;
            let list: ListResponse = serde_json::from_slice(&body)
                .map_err(|e| PipelineError::Metadata(format!("invalid tile list: {}", e)))?;

            Ok(list
                .data
                .into_iter()
                .map(|entry| entry.attributes)
                .find(|fields| fields.tile_id == tile_id)
                .map(|fields| TileRecord {
                    tile_id: fields.tile_id,
                    tile_url: fields.tile_url,
                }))
        })
    }

    fn create_tile_record(
        &self,
        tile_id: &str,
        tile_url: &str,
    ) -> BoxFuture<'_, PipelineResult<TileRecord>> {
        let record = TileRecord {
            tile_id: tile_id.to_string(),
            tile_url: tile_url.to_string(),
        };
        Box::pin(async move {
            let body = Envelope {
                data: TileFields {
                    tile_id: record.tile_id.clone(),
                    tile_url: record.tile_url.clone(),
                },
            };
            let (status, text) = self
                .send_json(Method::POST, &self.collection_url(&self.tile_collection), &body)
                .await?;

            if status.is_success() {
                debug!(tile_id = %record.tile_id, "Created tile record");
                return Ok(record);
            }
            if is_unique_violation(status, &text) {
                return Err(PipelineError::Duplicate {
                    tile_id: record.tile_id,
                });
            }
            Err(PipelineError::Metadata(format!(
                "tile record create returned HTTP {}: {}",
                status.as_u16(),
                text.trim()
            )))
        })
    }

    fn update_progress_counter(
        &self,
        job_id: &str,
        processed: u64,
    ) -> BoxFuture<'_, PipelineResult<()>> {
        let url = format!("{}/{}", self.collection_url(&self.job_collection), job_id);
        Box::pin(async move {
            let mut fields = serde_json::Map::new();
            fields.insert(self.progress_field.clone(), processed.into());
            let (status, text) = self
                .send_json(Method::PUT, &url, &Envelope { data: fields })
                .await?;

            if !status.is_success() {
                return Err(PipelineError::Metadata(format!(
                    "progress update returned HTTP {}: {}",
                    status.as_u16(),
                    text.trim()
                )));
            }
            Ok(())
        })
    }
}

fn is_unique_violation(status: StatusCode, body: &str) -> bool {
    status == StatusCode::BAD_REQUEST && body.to_lowercase().contains("unique")
}

fn parse_url(url: &str) -> PipelineResult<Url> {
    Url::parse(url).map_err(|e| PipelineError::Metadata(format!("invalid URL {}: {}", url, e)))
}

fn metadata_error(error: reqwest::Error) -> PipelineError {
    PipelineError::Metadata(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn store(server: &MockServer) -> CmsMetadataStore {
        let config = MetadataConfig {
            base_url: Some(server.base_url()),
            api_token: Some("secret".to_string()),
            ..MetadataConfig::default()
        };
        CmsMetadataStore::new(reqwest::Client::new(), &server.base_url(), &config)
    }

    #[tokio::test]
    async fn test_find_existing_tile() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/tiles")
                    .query_param("filters[tileID][$eq]", "img-42abc123_2_3_4")
                    .header("authorization", "Bearer secret");
                then.status(200).body(
                    r#"{"data":[{"id":7,"attributes":{"tileID":"img-42abc123_2_3_4","tileURL":"https://cdn/x.jpg"}}],"meta":{}}"#,
                );
            })
            .await;

        let record = store(&server)
            .find_tile_by_id("img-42abc123_2_3_4")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.tile_url, "https://cdn/x.jpg");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_find_missing_tile() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tiles");
                then.status(200).body(r#"{"data":[],"meta":{}}"#);
            })
            .await;

        assert!(store(&server).find_tile_by_id("t").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_record() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/tiles")
                    .header("content-type", "application/json");
                then.status(200).body(r#"{"data":{"id":1}}"#);
            })
            .await;

        let record = store(&server).create_tile_record("t1", "u1").await.unwrap();
        assert_eq!(record.tile_id, "t1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unique_violation_is_duplicate() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/tiles");
                then.status(400).body(
                    r#"{"error":{"status":400,"name":"ValidationError","message":"This attribute must be unique"}}"#,
                );
            })
            .await;

        let err = store(&server).create_tile_record("t1", "u1").await.unwrap_err();
        assert!(matches!(err, PipelineError::Duplicate { ref tile_id } if tile_id == "t1"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_metadata_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/tiles");
                then.status(500).body("boom");
            })
            .await;

        let err = store(&server).create_tile_record("t1", "u1").await.unwrap_err();
        assert!(matches!(err, PipelineError::Metadata(_)));
    }

    #[tokio::test]
    async fn test_progress_update() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/api/artworks/job-1");
                then.status(200).body("{}");
            })
            .await;

        store(&server)
            .update_progress_counter("job-1", 42)
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
