//! Transport API stop point client.

use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::SourceError;
use crate::domain::{Mode, RawStationRecord};

/// Default base URL for the unified transport API.
const DEFAULT_BASE_URL: &str = "https://api.tfl.gov.uk";

/// Stop types that are entrances, platforms or access areas of a station
/// rather than stations in their own right.
const CHILD_STOP_TYPES: &[&str] = &[
    "NaptanMetroEntrance",
    "NaptanMetroPlatform",
    "NaptanMetroAccessArea",
    "NaptanRailEntrance",
    "NaptanRailPlatform",
    "NaptanRailAccessArea",
];

/// Wrapper for the stop point listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopPointsResponse {
    stop_points: Vec<StopPointDto>,
}

/// A line reference inside a stop point.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineRefDto {
    pub id: String,
}

/// A sub-entry listed under a stop point.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildDto {
    pub common_name: String,
}

/// The fields of a stop point the pipeline uses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPointDto {
    pub naptan_id: String,
    pub common_name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub modes: Vec<String>,
    #[serde(default)]
    pub lines: Vec<LineRefDto>,
    #[serde(default)]
    pub hub_naptan_code: Option<String>,
    #[serde(default)]
    pub station_naptan: Option<String>,
    #[serde(default)]
    pub stop_type: Option<String>,
    #[serde(default)]
    pub children: Vec<ChildDto>,
}

impl From<StopPointDto> for RawStationRecord {
    fn from(dto: StopPointDto) -> Self {
        let is_child = dto
            .stop_type
            .as_deref()
            .is_some_and(|t| CHILD_STOP_TYPES.contains(&t));
        let parent_id = dto
            .station_naptan
            .filter(|p| !p.is_empty() && *p != dto.naptan_id);

        RawStationRecord {
            id: Some(dto.naptan_id),
            name: dto.common_name,
            lat: dto.lat,
            lon: dto.lon,
            modes: dto.modes.iter().map(|m| Mode::parse(m)).collect(),
            lines: dto.lines.into_iter().map(|l| l.id).collect(),
            hub_id: dto.hub_naptan_code.filter(|h| !h.is_empty()),
            parent_id,
            is_child,
            child_stations: dto.children.into_iter().map(|c| c.common_name).collect(),
        }
    }
}

/// Configuration for the stop point client.
#[derive(Debug, Clone)]
pub struct StopPointConfig {
    /// Application key sent as the `app_key` query parameter
    pub app_key: Option<String>,
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Attempts after the first before giving up
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub initial_backoff: Duration,
}

impl StopPointConfig {
    /// Create a config, optionally with an application key.
    pub fn new(app_key: Option<String>) -> Self {
        Self {
            app_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }

    /// Read the application key from `TFL_APP_KEY`.
    pub fn from_env() -> Self {
        Self::new(std::env::var("TFL_APP_KEY").ok().filter(|k| !k.is_empty()))
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Client for the stop point listing endpoint.
#[derive(Debug, Clone)]
pub struct StopPointClient {
    http: reqwest::Client,
    config: StopPointConfig,
}

impl StopPointClient {
    /// Create a new client.
    pub fn new(config: StopPointConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    /// Fetch the stop points of every mode concurrently.
    ///
    /// Records are returned in the order of `modes`. Fails with the first
    /// mode's error if any mode cannot be fetched.
    pub async fn fetch_modes(&self, modes: &[Mode]) -> Result<Vec<RawStationRecord>, SourceError> {
        let results = join_all(modes.iter().map(|mode| self.fetch_mode(mode))).await;

        let mut records = Vec::new();
        for result in results {
            records.extend(result?);
        }
        info!(modes = modes.len(), records = records.len(), "stop points fetched");
        Ok(records)
    }

    /// Fetch one mode, retrying transient failures with exponential backoff.
    pub async fn fetch_mode(&self, mode: &Mode) -> Result<Vec<RawStationRecord>, SourceError> {
        let mut retry = 0;
        loop {
            match self.fetch_once(mode).await {
                Ok(points) => {
                    debug!(%mode, points = points.len(), "mode fetched");
                    return Ok(points.into_iter().map(RawStationRecord::from).collect());
                }
                Err(e) if e.is_transient() && retry < self.config.max_retries => {
                    let delay = self.config.backoff(retry);
                    warn!(%mode, error = %e, attempt = retry + 1, ?delay, "fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(SourceError::RetriesExhausted {
                        mode: mode.to_string(),
                        attempts: retry + 1,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, mode: &Mode) -> Result<Vec<StopPointDto>, SourceError> {
        let url = format!("{}/StopPoint/Mode/{}", self.config.base_url, mode.as_str());

        let mut request = self.http.get(&url);
        if let Some(key) = &self.config.app_key {
            request = request.query(&[("app_key", key)]);
        }
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SourceError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let response: StopPointsResponse = serde_json::from_str(&body).map_err(|e| SourceError::Json {
            message: e.to_string(),
        })?;

        Ok(response.stop_points)
    }
}
