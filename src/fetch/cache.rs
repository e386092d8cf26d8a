//! On-disk cache of parsed source lists.
//!
//! One file per source URL, named by the SHA-256 of the URL, holding
//! gzip-compressed JSON. Writes go through a temp file and a rename so a
//! reader never sees a half-written entry from this process. Concurrent
//! writers from other processes are not locked out; a corrupt entry simply
//! reads as a miss.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::metadata::{now, system_time_serde, FetchMetadata};
use crate::Result;

/// Maximum age before a cache entry is re-fetched.
pub const MAX_CACHE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

const CACHE_EXTENSION: &str = "cache";

/// A cached, already parsed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hosts: Vec<String>,
    pub metadata: Option<FetchMetadata>,
    #[serde(with = "system_time_serde")]
    pub cached_at: Option<SystemTime>,
}

/// HTTP validators reported by a freshness check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CacheEntry {
    pub fn new(hosts: Vec<String>, metadata: FetchMetadata) -> Self {
        Self {
            hosts,
            metadata: Some(metadata),
            cached_at: Some(now()),
        }
    }

    /// Time since the entry was written, `Duration::MAX` if unknown.
    pub fn age(&self) -> Duration {
        match self.cached_at {
            None => Duration::MAX,
            Some(at) => SystemTime::now()
                .duration_since(at)
                .unwrap_or(Duration::MAX),
        }
    }

    /// Decide whether the entry must be re-fetched.
    ///
    /// `current` is the result of a HEAD request (or a file stat); `None`
    /// means the check failed, which counts as stale.
    pub fn is_stale(&self, max_age: Duration, current: Option<&Validators>) -> bool {
        let Some(meta) = &self.metadata else {
            return true;
        };
        if self.age() > max_age {
            return true;
        }
        match current {
            None => true,
            Some(v) => v.etag != meta.etag || v.last_modified != meta.last_modified,
        }
    }
}

/// Directory of cache entries keyed by source URL.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable file name for a URL: hex SHA-256 plus `.cache`.
    pub fn key(url: &str) -> String {
        format!("{:x}.{}", Sha256::digest(url.as_bytes()), CACHE_EXTENSION)
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(Self::key(url))
    }

    /// Read the entry for a URL.
    ///
    /// Missing, unreadable and undecodable entries all come back as `None`.
    pub fn read(&self, url: &str) -> Option<CacheEntry> {
        let path = self.path_for(url);
        if !path.exists() {
            return None;
        }
        match Self::decode(&path) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Discarding corrupt cache entry {:?} for {}: {}", path, url, e);
                None
            }
        }
    }

    fn decode(path: &Path) -> Result<CacheEntry> {
        let raw = fs::read(path)?;
        let mut json = Vec::new();
        GzDecoder::new(&raw[..]).read_to_end(&mut json)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Persist an entry for a URL.
    pub fn write(&self, url: &str, entry: &CacheEntry) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_vec(entry)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let data = encoder.finish()?;

        let path = self.path_for(url);
        let temp_path = path.with_extension("tmp");
        let mut temp_file = fs::File::create(&temp_path)?;
        temp_file.write_all(&data)?;
        temp_file.sync_all()?;
        drop(temp_file);
        fs::rename(&temp_path, &path)?;

        log::debug!("Cached {} hosts for {} at {:?}", entry.hosts.len(), url, path);
        Ok(())
    }

    /// Remove the entry for a URL if present.
    pub fn remove(&self, url: &str) -> Result<()> {
        let path = self.path_for(url);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
