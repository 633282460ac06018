//! INI parsing logic for converting `Ini` → `PipelineConfig`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::file::ConfigError;
use super::settings::{BlobStoreConfig, PipelineConfig, S3Config};
use super::size::parse_size;
use crate::job::RetryPolicy;

/// Parse an `Ini` object into a `PipelineConfig`.
///
/// Starts from `PipelineConfig::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<PipelineConfig, ConfigError> {
    let mut config = PipelineConfig::default();

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(secs) = parse_number::<u64>(section, "download", "timeout_secs")? {
            if secs == 0 {
                return Err(invalid("download", "timeout_secs", "0", "must be at least 1"));
            }
            config.download.timeout = Duration::from_secs(secs);
        }
        if let Some(v) = section.get("max_tile_size") {
            config.download.max_tile_bytes = parse_size(v)
                .map_err(|e| invalid("download", "max_tile_size", v, e.to_string()))?;
        }
    }

    // [job] section
    if let Some(section) = ini.section(Some("job")) {
        if let Some(size) = parse_number::<usize>(section, "job", "batch_size")? {
            if size == 0 {
                return Err(invalid("job", "batch_size", "0", "must be at least 1"));
            }
            config.job.batch_size = size;
        }
        let attempts = parse_number::<u32>(section, "job", "retry_attempts")?;
        let delay_ms = parse_number::<u64>(section, "job", "retry_delay_ms")?;
        if let Some(attempts) = attempts {
            config.job.retry = match attempts {
                0 => return Err(invalid("job", "retry_attempts", "0", "must be at least 1")),
                1 => RetryPolicy::None,
                n => RetryPolicy::fixed(n, Duration::from_millis(delay_ms.unwrap_or(1000))),
            };
        }
    }

    // [crypto] section
    if let Some(section) = ini.section(Some("crypto")) {
        if let Some(v) = section.get("container_marker") {
            config.crypto.container_marker = parse_marker(v)
                .ok_or_else(|| invalid("crypto", "container_marker", v, "expected a u32"))?;
        }
        if let Some(v) = section.get("aes_key") {
            config.crypto.aes_key = parse_block("aes_key", v)?;
        }
        if let Some(v) = section.get("aes_iv") {
            config.crypto.aes_iv = parse_block("aes_iv", v)?;
        }
        if let Some(v) = section.get("hmac_key") {
            let key = hex::decode(v.trim())
                .map_err(|e| invalid("crypto", "hmac_key", v, e.to_string()))?;
            if key.is_empty() {
                return Err(invalid("crypto", "hmac_key", v, "must not be empty"));
            }
            config.crypto.hmac_key = key;
        }
    }

    // [blob_store] section
    if let Some(section) = ini.section(Some("blob_store")) {
        config.blob_store = parse_blob_store(section)?;
    }

    // [metadata] section
    if let Some(section) = ini.section(Some("metadata")) {
        if let Some(v) = non_empty(section, "base_url") {
            config.metadata.base_url = Some(v.trim_end_matches('/').to_string());
        }
        if let Some(v) = non_empty(section, "api_token") {
            config.metadata.api_token = Some(v.to_string());
        }
        if let Some(v) = non_empty(section, "tile_collection") {
            config.metadata.tile_collection = v.to_string();
        }
        if let Some(v) = non_empty(section, "job_collection") {
            config.metadata.job_collection = v.to_string();
        }
        if let Some(v) = non_empty(section, "progress_field") {
            config.metadata.progress_field = v.to_string();
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "level") {
            config.logging.level = v.to_string();
        }
        if let Some(v) = non_empty(section, "directory") {
            config.logging.directory = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(section, "file") {
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

fn parse_blob_store(section: &Properties) -> Result<BlobStoreConfig, ConfigError> {
    let backend = section
        .get("backend")
        .map(|v| v.trim().to_lowercase())
        .unwrap_or_else(|| "memory".to_string());

    match backend.as_str() {
        "memory" => Ok(BlobStoreConfig::Memory),
        "local" => {
            let directory = non_empty(section, "directory")
                .ok_or_else(|| invalid("blob_store", "directory", "", "required for local"))?;
            Ok(BlobStoreConfig::Local {
                directory: PathBuf::from(directory),
                public_base_url: non_empty(section, "public_base_url").map(str::to_string),
            })
        }
        "s3" => {
            let required = |key: &str| {
                non_empty(section, key)
                    .map(str::to_string)
                    .ok_or_else(|| invalid("blob_store", key, "", "required for s3"))
            };
            Ok(BlobStoreConfig::S3(S3Config {
                endpoint: required("endpoint")?.trim_end_matches('/').to_string(),
                bucket: required("bucket")?,
                region: non_empty(section, "region")
                    .unwrap_or("us-east-1")
                    .to_string(),
                access_key: required("access_key")?,
                secret_key: required("secret_key")?,
                public_base_url: non_empty(section, "public_base_url").map(str::to_string),
            }))
        }
        other => Err(invalid(
            "blob_store",
            "backend",
            other,
            "must be one of: memory, local, s3",
        )),
    }
}

fn parse_number<T: FromStr>(
    section: &Properties,
    name: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match section.get(key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(name, key, v, "must be a non-negative integer")),
    }
}

fn parse_marker(value: &str) -> Option<u32> {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex_digits) => u32::from_str_radix(hex_digits, 16).ok(),
        None => value.parse().ok(),
    }
}

fn parse_block(key: &str, value: &str) -> Result<[u8; 16], ConfigError> {
    let bytes =
        hex::decode(value.trim()).map_err(|e| invalid("crypto", key, value, e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| invalid("crypto", key, value, "must be exactly 16 bytes (32 hex chars)"))
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(section: &str, key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<PipelineConfig, ConfigError> {
        PipelineConfig::from_ini_str(text)
    }

    #[test]
    fn test_empty_is_default() {
        let config = parse("").unwrap();
        assert_eq!(config.job.batch_size, 10);
        assert_eq!(config.download.max_tile_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_download_section() {
        let config = parse("[download]\ntimeout_secs = 5\nmax_tile_size = 2MB\n").unwrap();
        assert_eq!(config.download.timeout, Duration::from_secs(5));
        assert_eq!(config.download.max_tile_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = parse("[download]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "timeout_secs"));
    }

    #[test]
    fn test_retry_policy_from_attempts() {
        let config = parse("[job]\nretry_attempts = 3\nretry_delay_ms = 250\n").unwrap();
        assert_eq!(
            config.job.retry,
            RetryPolicy::fixed(3, Duration::from_millis(250))
        );

        let config = parse("[job]\nretry_attempts = 1\n").unwrap();
        assert_eq!(config.job.retry, RetryPolicy::None);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(parse("[job]\nbatch_size = 0\n").is_err());
    }

    #[test]
    fn test_crypto_overrides() {
        let config = parse(
            "[crypto]\ncontainer_marker = 0x01020304\naes_key = 000102030405060708090a0b0c0d0e0f\nhmac_key = ff00\n",
        )
        .unwrap();
        assert_eq!(config.crypto.container_marker, 0x0102_0304);
        assert_eq!(config.crypto.aes_key[15], 0x0f);
        assert_eq!(config.crypto.hmac_key, vec![0xff, 0x00]);
    }

    #[test]
    fn test_short_aes_key_rejected() {
        let err = parse("[crypto]\naes_key = 0001\n").unwrap_err();
        assert!(err.to_string().contains("16 bytes"));
    }

    #[test]
    fn test_s3_backend() {
        let config = parse(
            "[blob_store]\nbackend = s3\nendpoint = http://minio:9000/\nbucket = tiles\naccess_key = ak\nsecret_key = sk\n",
        )
        .unwrap();
        match config.blob_store {
            BlobStoreConfig::S3(s3) => {
                assert_eq!(s3.endpoint, "http://minio:9000");
                assert_eq!(s3.region, "us-east-1");
                assert_eq!(s3.public_base(), "http://minio:9000/tiles");
            }
            other => panic!("expected s3 backend, got {:?}", other),
        }
    }

    #[test]
    fn test_s3_missing_bucket_rejected() {
        let err = parse("[blob_store]\nbackend = s3\nendpoint = http://minio\n").unwrap_err();
        assert!(err.to_string().contains("bucket") || err.to_string().contains("access_key"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = parse("[blob_store]\nbackend = ftp\n").unwrap_err();
        assert!(err.to_string().contains("memory, local, s3"));
    }

    #[test]
    fn test_metadata_and_logging() {
        let config = parse(
            "[metadata]\nbase_url = https://cms.example.com/\napi_token = secret\n\n[logging]\nlevel = debug\ndirectory = /var/log/zoomvault\n",
        )
        .unwrap();
        assert_eq!(
            config.metadata.base_url.as_deref(),
            Some("https://cms.example.com")
        );
        assert_eq!(config.metadata.api_token.as_deref(), Some("secret"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.directory,
            Some(PathBuf::from("/var/log/zoomvault"))
        );
    }
}
