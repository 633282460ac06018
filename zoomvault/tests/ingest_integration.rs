//! Integration tests for the tile job.
//!
//! These drive the public API against in-memory stores and a scripted HTTP
//! client: idempotent re-runs, partial failure, cancellation, concurrent runs
//! and a full artwork ingest.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use zoomvault::config::JobConfig;
use zoomvault::decrypt::TileDecryptor;
use zoomvault::error::NetworkError;
use zoomvault::http::AsyncHttpClient;
use zoomvault::job::{BatchUploader, JobContext};
use zoomvault::signer::UrlSigner;
use zoomvault::store::{MemoryBlobStore, MemoryMetadataStore};
use zoomvault::tile::tile_id;
use zoomvault::ArtworkIngest;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

const ASSET: &str = "https://arts.example.com/asset/the-harvesters/Lg3pXq";
const PAGE: &str = r#"<html><script>AF_initDataCallback({data:[[1,2]],"//lh3.example.com/ci/AL18g_Qm","tKq9"]})</script></html>"#;
const DESCRIPTOR_URL: &str = "https://lh3.example.com/ci/AL18g_Qm=g";
const DESCRIPTOR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TileInfo tile_width="256" tile_height="256" full_pyramid_depth="3" timestamp="1600000000" tiler_version_number="2">
  <pyramid_level num_tiles_x="1" num_tiles_y="1" inverse_scale="4" empty_pels_x="0" empty_pels_y="0"/>
  <pyramid_level num_tiles_x="2" num_tiles_y="1" inverse_scale="2" empty_pels_x="0" empty_pels_y="0"/>
  <pyramid_level num_tiles_x="3" num_tiles_y="2" inverse_scale="1" empty_pels_x="0" empty_pels_y="0"/>
</TileInfo>"#;

/// Answers scripted URLs, falls back to a JPEG body for everything else, and
/// remembers what was requested.
#[derive(Default)]
struct FakeTileServer {
    responses: DashMap<String, Result<Vec<u8>, NetworkError>>,
    requested: Mutex<Vec<String>>,
    cancel_on_request: Option<CancellationToken>,
    unknown_is_tile: bool,
}

impl FakeTileServer {
    fn serving_tiles() -> Self {
        Self {
            unknown_is_tile: true,
            ..Self::default()
        }
    }

    fn respond(&self, url: &str, body: &[u8]) {
        self.responses.insert(url.to_string(), Ok(body.to_vec()));
    }

    fn fail(&self, url: &str, status: u16) {
        self.responses.insert(
            url.to_string(),
            Err(NetworkError::Status {
                url: url.to_string(),
                status,
            }),
        );
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl AsyncHttpClient for FakeTileServer {
    async fn get(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some(token) = &self.cancel_on_request {
            token.cancel();
        }
        if let Some(entry) = self.responses.get(url) {
            return entry.value().clone();
        }
        if self.unknown_is_tile {
            Ok(JPEG.to_vec())
        } else {
            Err(NetworkError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }
}

struct Stores {
    blobs: Arc<MemoryBlobStore>,
    metadata: Arc<MemoryMetadataStore>,
}

impl Stores {
    fn new() -> Self {
        Self {
            blobs: Arc::new(MemoryBlobStore::new()),
            metadata: Arc::new(MemoryMetadataStore::new()),
        }
    }

    fn uploader(
        &self,
        client: Arc<FakeTileServer>,
        batch_size: usize,
    ) -> BatchUploader<Arc<FakeTileServer>> {
        BatchUploader::new(
            client,
            TileDecryptor::default(),
            self.blobs.clone(),
            self.metadata.clone(),
            JobConfig {
                batch_size,
                ..JobConfig::default()
            },
        )
    }
}

fn tile_set(count: u32) -> BTreeMap<String, String> {
    (0..count)
        .map(|x| {
            (
                format!("tKq9/{}/0/2", x),
                format!("https://lh3.example.com/ci/AL18g_Qm=x{}-y0-z2-tsig{}", x, x),
            )
        })
        .collect()
}

#[test]
fn test_tile_id_format() {
    assert_eq!(tile_id("img-42", "abc123/2/3/4"), "img-42abc123_2_3_4");
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let stores = Stores::new();
    let client = Arc::new(FakeTileServer::serving_tiles());
    let uploader = stores.uploader(client.clone(), 4);
    let tiles = tile_set(10);

    let first = uploader.run(&JobContext::new("job"), &tiles, "img").await;
    assert_eq!(first.recorded, 10);
    let puts = stores.blobs.put_count();
    let creates = stores.metadata.create_count();
    let requests = client.requested().len();

    let second = uploader.run(&JobContext::new("job"), &tiles, "img").await;

    assert_eq!(second.recorded, 0);
    assert_eq!(second.skipped, 10);
    assert_eq!(second.processed, 10);
    assert_eq!(stores.blobs.put_count(), puts);
    assert_eq!(stores.metadata.create_count(), creates);
    assert_eq!(client.requested().len(), requests);
}

#[tokio::test]
async fn test_one_failing_download_out_of_ten() {
    let stores = Stores::new();
    let client = Arc::new(FakeTileServer::serving_tiles());
    let tiles = tile_set(10);
    let broken = tiles.get("tKq9/6/0/2").unwrap();
    client.fail(broken, 500);

    let summary = stores
        .uploader(client, 3)
        .run(&JobContext::new("job"), &tiles, "img")
        .await;

    assert_eq!(summary.processed, 9);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total, 10);
    assert!(!summary.is_complete());
    assert_eq!(stores.metadata.record_count(), 9);
    assert!(stores.metadata.record("imgtKq9_6_0_2").is_none());
    assert_eq!(stores.metadata.progress("job"), Some(9));
}

#[tokio::test]
async fn test_cancellation_stops_at_batch_boundary() {
    let stores = Stores::new();
    let token = CancellationToken::new();
    let client = Arc::new(FakeTileServer {
        unknown_is_tile: true,
        cancel_on_request: Some(token.clone()),
        ..FakeTileServer::default()
    });
    let ctx = JobContext::new("job").with_cancellation(token);

    let summary = stores
        .uploader(client.clone(), 2)
        .run(&ctx, &tile_set(6), "img")
        .await;

    // The batch in flight when cancellation arrived completes.
    assert!(summary.cancelled);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.total, 6);
    assert_eq!(client.requested().len(), 2);
    assert_eq!(stores.metadata.record_count(), 2);
}

#[tokio::test]
async fn test_concurrent_runs_record_each_tile_once() {
    let stores = Stores::new();
    let client = Arc::new(FakeTileServer::serving_tiles());
    let a = stores.uploader(client.clone(), 5);
    let b = stores.uploader(client, 5);
    let tiles = tile_set(20);

    let ctx_a = JobContext::new("job-a");
    let ctx_b = JobContext::new("job-b");

    let (first, second) = tokio::join!(
        a.run(&ctx_a, &tiles, "img"),
        b.run(&ctx_b, &tiles, "img"),
    );

    assert_eq!(stores.metadata.record_count(), 20);
    assert_eq!(stores.metadata.create_count(), 20);
    assert_eq!(first.recorded + second.recorded, 20);
    assert_eq!(first.processed, 20);
    assert_eq!(second.processed, 20);
    assert_eq!(first.failed + second.failed, 0);
}

#[tokio::test]
async fn test_ingest_full_artwork() {
    let client = Arc::new(FakeTileServer::serving_tiles());
    client.respond(ASSET, PAGE.as_bytes());
    client.respond(DESCRIPTOR_URL, DESCRIPTOR.as_bytes());
    let stores = Stores::new();

    let ingest = ArtworkIngest::new(
        client.clone(),
        UrlSigner::default(),
        TileDecryptor::default(),
        stores.blobs.clone(),
        stores.metadata.clone(),
        JobConfig::default(),
    );
    let summary = ingest
        .ingest(&JobContext::new("harvesters"), ASSET, "img-7")
        .await
        .unwrap();

    assert_eq!(summary.total, 1 + 2 + 6);
    assert_eq!(summary.recorded, 9);
    assert!(summary.is_complete());

    let signed = UrlSigner::default().compute_signed_path("/ci/AL18g_Qm", "tKq9", 2, 1, 2);
    let expected_url = format!("https://lh3.example.com{}", signed);
    assert!(client.requested().contains(&expected_url));

    let record = stores.metadata.record("img-7tKq9_2_1_2").unwrap();
    assert_eq!(record.tile_url, "memory://tiles/img-7tKq9_2_1_2.jpg");
    assert_eq!(stores.blobs.get("img-7tKq9_2_1_2.jpg").unwrap().content_type, "image/jpeg");
}

#[tokio::test]
async fn test_ingest_missing_descriptor_aborts() {
    let client = Arc::new(FakeTileServer::default());
    client.respond(ASSET, PAGE.as_bytes());
    let stores = Stores::new();

    let ingest = ArtworkIngest::new(
        client,
        UrlSigner::default(),
        TileDecryptor::default(),
        stores.blobs.clone(),
        stores.metadata.clone(),
        JobConfig::default(),
    );
    let result = ingest.ingest(&JobContext::new("job"), ASSET, "img").await;

    assert!(result.is_err());
    assert!(stores.blobs.is_empty());
}
