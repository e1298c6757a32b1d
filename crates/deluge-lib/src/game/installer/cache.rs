//! Time-bounded on-disk store for downloaded archives and listings.
//!
//! Every key owns two files in the cache directory: the payload `K.<ext>`
//! and a metadata record `K.cache` holding `timestamp:::ttl_hours`.

use super::config::CACHE_TTL_HOURS;
use super::error::{CacheMetadataInvalid, InstallError};
use crate::utils::fs::{remove_file_if_exists, write_atomic};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const METADATA_EXTENSION: &str = "cache";
const FIELD_SEPARATOR: &str = ":::";

/// Contents of a `K.cache` metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStamp {
    pub fetched_at: DateTime<Utc>,
    pub ttl_hours: u32,
}

impl CacheStamp {
    pub fn new(fetched_at: DateTime<Utc>, ttl_hours: u32) -> Self {
        Self {
            fetched_at,
            ttl_hours,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            self.fetched_at.to_rfc3339(),
            FIELD_SEPARATOR,
            self.ttl_hours
        )
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, CacheMetadataInvalid> {
        let fields: Vec<&str> = raw.trim().split(FIELD_SEPARATOR).collect();
        if fields.len() != 2 {
            return Err(CacheMetadataInvalid::FieldCount(fields.len()));
        }
        let fetched_at = DateTime::parse_from_rfc3339(fields[0])?.with_timezone(&Utc);
        let ttl_hours = fields[1].parse::<u32>()?;
        Ok(Self {
            fetched_at,
            ttl_hours,
        })
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at <= Duration::hours(i64::from(self.ttl_hours))
    }
}

#[derive(Debug)]
pub struct DownloadCache {
    root: PathBuf,
    client: Client,
    ttl_hours: u32,
    extension: String,
}

impl DownloadCache {
    pub fn new(root: impl Into<PathBuf>, client: Client) -> Self {
        Self {
            root: root.into(),
            client,
            ttl_hours: CACHE_TTL_HOURS,
            extension: "zip".to_string(),
        }
    }

    pub fn with_ttl_hours(mut self, hours: u32) -> Self {
        self.ttl_hours = hours;
        self
    }

    /// Payload file extension, `zip` unless overridden
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn payload_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", file_stem(key), self.extension))
    }

    pub fn metadata_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", file_stem(key), METADATA_EXTENSION))
    }

    /// Return the payload for `key`, downloading it from `url` unless a valid
    /// entry is already on disk.
    pub async fn fetch(&self, key: &str, url: &str) -> Result<Vec<u8>> {
        if let Some(bytes) = self.read_valid(key).await {
            log::debug!("[cache] Hit for {}", key);
            return Ok(bytes);
        }

        let failed = |e: anyhow::Error| InstallError::FetchFailed {
            key: key.to_string(),
            url: url.to_string(),
            reason: format!("{e:#}"),
        };

        self.discard(key).map_err(failed)?;

        log::info!("[cache] Downloading {} from {}", key, url);
        let bytes = self.download(url).await.map_err(failed)?;
        self.store(key, bytes.clone()).await.map_err(failed)?;

        Ok(bytes)
    }

    async fn read_valid(&self, key: &str) -> Option<Vec<u8>> {
        let metadata_path = self.metadata_path(key);
        let raw = match tokio::fs::read_to_string(&metadata_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("[cache] Could not read {:?}: {}", metadata_path, e);
                return None;
            }
        };

        let stamp = match CacheStamp::parse(&raw) {
            Ok(stamp) => stamp,
            Err(e) => {
                log::warn!("[cache] Ignoring invalid metadata for {}: {}", key, e);
                return None;
            }
        };

        let age = Utc::now() - stamp.fetched_at;
        if !stamp.is_valid_at(Utc::now()) {
            log::info!(
                "[cache] Entry {} is stale ({}h old, ttl {}h)",
                key,
                age.num_hours(),
                stamp.ttl_hours
            );
            return None;
        }

        match tokio::fs::read(self.payload_path(key)).await {
            Ok(bytes) => {
                log::debug!("[cache] Entry {} is {}m old", key, age.num_minutes());
                Some(bytes)
            }
            Err(e) => {
                log::warn!("[cache] Metadata for {} has no readable payload: {}", key, e);
                None
            }
        }
    }

    /// Delete both files of an entry. Missing files are fine.
    fn discard(&self, key: &str) -> Result<()> {
        for path in [self.payload_path(key), self.metadata_path(key)] {
            remove_file_if_exists(&path)
                .map_err(|e| InstallError::filesystem("remove stale cache file", &path, e))?;
        }
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error {}: {}", response.status(), url);
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let payload_path = self.payload_path(key);
        let metadata_path = self.metadata_path(key);
        let stamp = CacheStamp::new(Utc::now(), self.ttl_hours).encode();

        tokio::task::spawn_blocking(move || -> Result<()> {
            // Payload first: metadata without a payload would read as a hit
            write_atomic(&payload_path, &bytes)
                .with_context(|| format!("Write cache payload {:?}", payload_path))?;
            write_atomic(&metadata_path, stamp.as_bytes())
                .with_context(|| format!("Write cache metadata {:?}", metadata_path))?;
            Ok(())
        })
        .await
        .context("Cache write task panicked")?
    }
}

fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
