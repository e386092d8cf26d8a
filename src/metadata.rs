//! Per-source fetch metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Outcome of the last fetch of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    #[default]
    Success,
    Failed,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Success => write!(f, "success"),
            FetchStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Metadata recorded for every source URL, whether the fetch worked or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FetchMetadata {
    pub url: String,
    #[serde(with = "system_time_serde")]
    pub fetched_at: Option<SystemTime>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// SHA-256 of the raw body, lowercase hex
    pub content_hash: Option<String>,
    pub status: FetchStatus,
    pub error: Option<String>,
}

pub(crate) mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => {
                let duration = t.duration_since(UNIX_EPOCH).unwrap_or_default();
                Some(duration.as_secs()).serialize(serializer)
            }
            None => None::<u64>.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)))
    }
}

/// Current time truncated to whole seconds, the precision timestamps are
/// persisted with.
pub(crate) fn now() -> SystemTime {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    UNIX_EPOCH + Duration::from_secs(secs)
}

impl FetchMetadata {
    /// Metadata for a successful fetch, stamped with the current time.
    pub fn success(
        url: &str,
        content_hash: String,
        etag: Option<String>,
        last_modified: Option<String>,
    ) -> Self {
        Self {
            url: url.to_string(),
            fetched_at: Some(now()),
            etag,
            last_modified,
            content_hash: Some(content_hash),
            status: FetchStatus::Success,
            error: None,
        }
    }

    /// Metadata for a failed fetch.
    pub fn failed(url: &str, error: impl fmt::Display) -> Self {
        Self {
            url: url.to_string(),
            fetched_at: Some(now()),
            status: FetchStatus::Failed,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    /// Time elapsed since the fetch, `Duration::MAX` if unknown.
    pub fn age(&self) -> Duration {
        match self.fetched_at {
            None => Duration::MAX,
            Some(at) => SystemTime::now()
                .duration_since(at)
                .unwrap_or(Duration::MAX),
        }
    }
}
