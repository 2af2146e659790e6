//! Graph edge types.

use chrono::{DateTime, Utc};

use super::StationIdx;

/// Line identifier carried by interchange transfer edges.
pub const TRANSFER_LINE: &str = "transfer";

/// Identity of a directed edge: `(source, target, line)`.
///
/// Unique across the non-transfer edges of a graph; transfer edges use
/// [`TRANSFER_LINE`] and are unique per ordered station pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source: StationIdx,
    pub target: StationIdx,
    pub line: String,
}

impl EdgeKey {
    pub fn new(source: StationIdx, target: StationIdx, line: impl Into<String>) -> Self {
        Self {
            source,
            target,
            line: line.into(),
        }
    }

    /// The same line in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            source: self.target,
            target: self.source,
            line: self.line.clone(),
        }
    }
}

/// A directed relation between two stations.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: StationIdx,
    pub target: StationIdx,

    /// Line identifier, or [`TRANSFER_LINE`] for interchange links.
    pub line: String,

    /// Travel time in minutes. `None` means unknown: no weight source has
    /// supplied a value yet. It is never treated as zero cost.
    pub weight: Option<f64>,

    pub transfer: bool,

    /// Scheduled run time in minutes, when the weight source provided one.
    pub duration: Option<f64>,

    /// When the weight was calculated by its source.
    pub calculated_timestamp: Option<DateTime<Utc>>,
}

impl Edge {
    /// A scheduled line segment with unknown weight.
    pub fn segment(source: StationIdx, target: StationIdx, line: impl Into<String>) -> Self {
        Self {
            source,
            target,
            line: line.into(),
            weight: None,
            transfer: false,
            duration: None,
            calculated_timestamp: None,
        }
    }

    /// An interchange walk with a fixed weight.
    pub fn transfer(source: StationIdx, target: StationIdx, minutes: f64) -> Self {
        Self {
            source,
            target,
            line: TRANSFER_LINE.to_string(),
            weight: Some(minutes),
            transfer: true,
            duration: None,
            calculated_timestamp: None,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.source, self.target, self.line.clone())
    }

    /// Whether the edge still carries the unknown-weight sentinel.
    pub fn is_unweighted(&self) -> bool {
        self.weight.is_none()
    }
}
