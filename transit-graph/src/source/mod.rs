//! Station records from the transport API.
//!
//! This module provides:
//! - [`StopPointClient`]: fetches stop points per mode with retry and backoff
//! - [`RecordCache`]: disk cache of fetched records with a TTL

mod cache;
mod client;
mod error;

pub use cache::{RecordCache, RecordCacheConfig};
pub use client::{StopPointClient, StopPointConfig, StopPointDto};
pub use error::SourceError;

use tracing::{info, warn};

use crate::domain::{Mode, RawStationRecord};

/// Fetch records for `modes`, using `cache` when it holds a fresh copy.
///
/// A failure to write the cache is logged and otherwise ignored.
pub async fn fetch_with_cache(
    client: &StopPointClient,
    cache: Option<&RecordCache>,
    modes: &[Mode],
) -> Result<Vec<RawStationRecord>, SourceError> {
    if let Some(records) = cache.and_then(|c| c.load(modes)) {
        info!(records = records.len(), "using cached stop points");
        return Ok(records);
    }

    let records = client.fetch_modes(modes).await?;
    if let Some(cache) = cache
        && let Err(e) = cache.save(modes, &records)
    {
        warn!(error = %e, path = %cache.path().display(), "failed to write cache");
    }
    Ok(records)
}
