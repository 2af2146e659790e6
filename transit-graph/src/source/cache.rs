//! Disk-based cache for fetched station records.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::error::SourceError;
use crate::domain::{Mode, RawStationRecord};

/// Default cache TTL: 24 hours.
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cached records with metadata.
#[derive(Debug, Serialize, Deserialize)]
struct CachedRecords {
    /// Unix timestamp when the cache was written.
    cached_at_secs: u64,
    /// Modes the records were fetched for, sorted.
    modes: Vec<Mode>,
    records: Vec<RawStationRecord>,
}

/// Configuration for the record cache.
#[derive(Debug, Clone)]
pub struct RecordCacheConfig {
    /// Path to the cache file.
    pub path: PathBuf,
    /// How long the cache remains valid.
    pub ttl: Duration,
}

impl RecordCacheConfig {
    /// Create a new cache config with the given path and default TTL (24 hours).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Disk cache for fetched station records.
#[derive(Debug, Clone)]
pub struct RecordCache {
    config: RecordCacheConfig,
}

fn sorted(modes: &[Mode]) -> Vec<Mode> {
    let mut modes = modes.to_vec();
    modes.sort();
    modes.dedup();
    modes
}

fn now_secs() -> Option<u64> {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

impl RecordCache {
    pub fn new(config: RecordCacheConfig) -> Self {
        Self { config }
    }

    /// Load records fetched for exactly `modes`.
    ///
    /// Returns `None` if the cache doesn't exist, is invalid, has expired, or
    /// was written for a different set of modes.
    pub fn load(&self, modes: &[Mode]) -> Option<Vec<RawStationRecord>> {
        let contents = std::fs::read_to_string(&self.config.path).ok()?;
        let cached: CachedRecords = serde_json::from_str(&contents).ok()?;

        let age_secs = now_secs()?.saturating_sub(cached.cached_at_secs);
        if age_secs >= self.config.ttl.as_secs() || cached.modes != sorted(modes) {
            return None;
        }

        Some(cached.records)
    }

    /// Save records fetched for `modes`.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save(&self, modes: &[Mode], records: &[RawStationRecord]) -> Result<(), SourceError> {
        let cached_at_secs = now_secs().ok_or_else(|| SourceError::Cache {
            message: "system time before unix epoch".to_string(),
        })?;

        let cached = CachedRecords {
            cached_at_secs,
            modes: sorted(modes),
            records: records.to_vec(),
        };

        if let Some(parent) = self.config.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| SourceError::Cache {
                message: format!("failed to create cache directory: {}", e),
            })?;
        }

        let json = serde_json::to_string_pretty(&cached).map_err(|e| SourceError::Cache {
            message: format!("failed to serialize cache: {}", e),
        })?;

        std::fs::write(&self.config.path, json).map_err(|e| SourceError::Cache {
            message: format!("failed to write cache file: {}", e),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }
}
