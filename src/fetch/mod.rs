//! Source acquisition: HTTP(S) and local-file blocklists behind a
//! freshness-validated disk cache.
//!
//! [`SourceFetcher::fetch`] never fails. Every failure class is caught,
//! recorded in the returned [`FetchMetadata`] and turned into an empty host
//! list, so one broken source never stops the others in a category.

mod cache;

pub use cache::{CacheEntry, CacheStore, Validators, MAX_CACHE_AGE};

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use url::Url;

use crate::converter::parse_auto;
use crate::error::FetchError;
use crate::metadata::FetchMetadata;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A fetchable list location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Http(Url),
    File(PathBuf),
}

impl Source {
    /// Parse a source URL. Only `http`, `https` and `file` are accepted.
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        let parsed = Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(Source::Http(parsed)),
            "file" => parsed
                .to_file_path()
                .map(Source::File)
                .map_err(|_| FetchError::InvalidUrl(format!("{}: not a local path", url))),
            other => Err(FetchError::InvalidUrl(format!(
                "{}: unsupported scheme {:?}",
                url, other
            ))),
        }
    }
}

/// Raw body plus the validators that came with it.
struct Download {
    body: Vec<u8>,
    validators: Validators,
}

/// Fetches and caches source lists.
pub struct SourceFetcher {
    agent: ureq::Agent,
    cache: Option<CacheStore>,
    force_refresh: bool,
    max_age: Duration,
}

impl SourceFetcher {
    /// Create a fetcher without a cache.
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            cache: None,
            force_refresh: false,
            max_age: MAX_CACHE_AGE,
        }
    }

    /// Persist parsed lists under `dir`.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache = Some(CacheStore::new(dir));
        self
    }

    /// Always re-fetch, ignoring cached entries (they are still rewritten).
    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Override the 24 hour maximum cache age.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    /// Fetch a source and return its hosts together with fetch metadata.
    ///
    /// Fresh cache entries are served without touching the network.
    pub fn fetch(&self, url: &str) -> (Vec<String>, FetchMetadata) {
        let source = match Source::parse(url) {
            Ok(source) => source,
            Err(e) => {
                log::warn!("Skipping source {}: {}", url, e);
                return (Vec::new(), FetchMetadata::failed(url, e));
            }
        };

        if let Some(entry) = self.cached(url, &source) {
            log::debug!("Serving {} from cache ({} hosts)", url, entry.hosts.len());
            let meta = entry.metadata.unwrap_or_default();
            return (entry.hosts, meta);
        }

        match self.download(&source) {
            Ok(download) => self.accept(url, download),
            Err(e) => {
                log::warn!("Failed to fetch {}: {}", url, e);
                (Vec::new(), FetchMetadata::failed(url, e))
            }
        }
    }

    /// Return the cache entry for `url` if it exists and is still fresh.
    fn cached(&self, url: &str, source: &Source) -> Option<CacheEntry> {
        if self.force_refresh {
            return None;
        }
        let entry = self.cache.as_ref()?.read(url)?;
        let current = self.current_validators(source);
        if entry.is_stale(self.max_age, current.as_ref()) {
            log::debug!("Cache entry for {} is stale", url);
            return None;
        }
        Some(entry)
    }

    /// Current validators of a source without downloading it.
    ///
    /// HTTP sources are asked with HEAD, local files with a stat whose
    /// modification time stands in for Last-Modified.
    fn current_validators(&self, source: &Source) -> Option<Validators> {
        match source {
            Source::Http(url) => match self.agent.head(url.as_str()).call() {
                Ok(response) => Some(Validators {
                    etag: response.header("ETag").map(str::to_string),
                    last_modified: response.header("Last-Modified").map(str::to_string),
                }),
                Err(e) => {
                    log::debug!("HEAD {} failed, treating cache as stale: {}", url, e);
                    None
                }
            },
            Source::File(path) => file_validators(path).ok(),
        }
    }

    fn download(&self, source: &Source) -> Result<Download, FetchError> {
        match source {
            Source::Http(url) => {
                let response = self.agent.get(url.as_str()).call()?;
                let validators = Validators {
                    etag: response.header("ETag").map(str::to_string),
                    last_modified: response.header("Last-Modified").map(str::to_string),
                };
                let mut body = Vec::new();
                response.into_reader().read_to_end(&mut body)?;
                Ok(Download { body, validators })
            }
            Source::File(path) => {
                let body = fs::read(path)?;
                let validators = file_validators(path)?;
                Ok(Download { body, validators })
            }
        }
    }

    /// Hash, parse and cache a downloaded body.
    fn accept(&self, url: &str, download: Download) -> (Vec<String>, FetchMetadata) {
        let content_hash = format!("{:x}", Sha256::digest(&download.body));
        let text = String::from_utf8_lossy(&download.body);
        let (format, hosts) = parse_auto(&text);

        log::info!("Fetched {}: {} hosts ({} format)", url, hosts.len(), format);

        let meta = FetchMetadata::success(
            url,
            content_hash,
            download.validators.etag,
            download.validators.last_modified,
        );

        if let Some(cache) = &self.cache {
            let entry = CacheEntry::new(hosts.clone(), meta.clone());
            if let Err(e) = cache.write(url, &entry) {
                log::warn!("Failed to cache {}: {}", url, e);
            }
        }

        (hosts, meta)
    }
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

fn file_validators(path: &Path) -> Result<Validators, FetchError> {
    let modified = fs::metadata(path)?.modified()?;
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    Ok(Validators {
        etag: None,
        last_modified: Some(secs.to_string()),
    })
}
