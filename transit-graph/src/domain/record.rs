//! Raw input records, as received from source data.

use serde::{Deserialize, Serialize};

use super::{Coordinates, Mode};

/// A station record as scraped from the transport API.
///
/// Records are ephemeral: the [`IdentityResolver`](crate::resolve::IdentityResolver)
/// consumes each one exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStationRecord {
    /// Source-specific identifier of this record (e.g. a NaPTAN code).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub lat: Option<f64>,

    #[serde(default)]
    pub lon: Option<f64>,

    #[serde(default)]
    pub modes: Vec<Mode>,

    #[serde(default)]
    pub lines: Vec<String>,

    /// Authoritative cross-modal hub identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub_id: Option<String>,

    /// Identifier of the station complex this record belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Set for platform/entrance sub-entries that must never stand alone.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_child: bool,

    /// Display names of sub-entries listed inline by the source.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_stations: Vec<String>,
}

/// How a record asks to be grouped, in decreasing order of confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingClaim<'a> {
    /// Grouped with every record sharing this hub id.
    Hub(&'a str),
    /// Grouped with every record sharing this station-complex id.
    Parent(&'a str),
    /// Deferred; reattached to the group holding `parent`, or to the group
    /// at the same rounded coordinate.
    Child { parent: Option<&'a str> },
    /// No authoritative id: grouped on canonical key and rounded coordinate.
    Fallback,
}

impl RawStationRecord {
    /// Create a minimal record with a name and position.
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: None,
            name: name.into(),
            lat: Some(lat),
            lon: Some(lon),
            modes: Vec::new(),
            lines: Vec::new(),
            hub_id: None,
            parent_id: None,
            is_child: false,
            child_stations: Vec::new(),
        }
    }

    pub fn with_modes(mut self, modes: impl IntoIterator<Item = Mode>) -> Self {
        self.modes = modes.into_iter().collect();
        self
    }

    pub fn with_lines<S: Into<String>>(mut self, lines: impl IntoIterator<Item = S>) -> Self {
        self.lines = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_hub(mut self, hub_id: impl Into<String>) -> Self {
        self.hub_id = Some(hub_id.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn as_child(mut self) -> Self {
        self.is_child = true;
        self
    }

    pub fn with_child_stations<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.child_stations = names.into_iter().map(Into::into).collect();
        self
    }

    /// The record's position, if both components are present and usable.
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::new(self.lat?, self.lon?)
    }

    /// Classify the record for grouping. Blank identifiers count as absent.
    pub fn grouping_claim(&self) -> GroupingClaim<'_> {
        let hub = non_blank(self.hub_id.as_deref());
        let parent = non_blank(self.parent_id.as_deref());

        if self.is_child {
            return GroupingClaim::Child { parent };
        }
        if let Some(hub) = hub {
            return GroupingClaim::Hub(hub);
        }
        if let Some(parent) = parent {
            return GroupingClaim::Parent(parent);
        }
        GroupingClaim::Fallback
    }

    /// The record's own identifier, if present and not blank.
    pub fn record_id(&self) -> Option<&str> {
        non_blank(self.id.as_deref())
    }

    /// The station-complex identifier, if present and not blank.
    pub fn parent_ref(&self) -> Option<&str> {
        non_blank(self.parent_id.as_deref())
    }

    /// The hub identifier, if present and not blank.
    pub fn hub_ref(&self) -> Option<&str> {
        non_blank(self.hub_id.as_deref())
    }

    /// Identifiers under which this record groups and can be found.
    ///
    /// Hub and parent records register every id they carry, so a record
    /// holding both links the two groups. Child and fallback records carry
    /// no grouping authority.
    pub fn authoritative_ids(&self) -> Vec<&str> {
        match self.grouping_claim() {
            GroupingClaim::Hub(hub) => std::iter::once(hub)
                .chain(self.parent_ref())
                .chain(self.record_id())
                .collect(),
            GroupingClaim::Parent(parent) => std::iter::once(parent)
                .chain(self.record_id())
                .collect(),
            GroupingClaim::Child { .. } | GroupingClaim::Fallback => Vec::new(),
        }
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// A scheduled line segment between two named stations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub source: String,
    pub target: String,
    pub line: String,

    #[serde(default)]
    pub mode: Option<Mode>,

    /// Marks an interchange walk rather than a scheduled service.
    #[serde(default)]
    pub transfer: Option<bool>,
}

impl RawSegment {
    pub fn new(source: impl Into<String>, target: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            line: line.into(),
            mode: None,
            transfer: None,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn as_transfer(mut self) -> Self {
        self.transfer = Some(true);
        self
    }

    pub fn is_transfer(&self) -> bool {
        self.transfer.unwrap_or(false)
    }
}
