//! Canonical station types.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::CanonicalKey;

use super::Mode;

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Index of a station within a [`Graph`](crate::assemble::Graph) or
/// [`StationSet`](crate::resolve::StationSet).
///
/// Indices are assigned in resolution order and never reused, so they are
/// stable for the lifetime of the collection that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationIdx(pub usize);

impl fmt::Display for StationIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// Create a coordinate pair, returning `None` if it is not a usable
    /// position (non-finite, out of range, or the `(0, 0)` placeholder some
    /// feeds emit for "unknown").
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        if lat == 0.0 && lon == 0.0 {
            return None;
        }
        Some(Self { lat, lon })
    }

    /// Round both components to `precision` decimal places and return them
    /// as scaled integers, suitable for use in a hash key.
    ///
    /// At 4 decimal places one unit is roughly 11 m of latitude.
    pub fn rounded(&self, precision: u32) -> (i64, i64) {
        let scale = 10f64.powi(precision as i32);
        (
            (self.lat * scale).round() as i64,
            (self.lon * scale).round() as i64,
        )
    }

    /// Great-circle distance in metres (haversine).
    pub fn distance_m(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// One physical station or interchange complex after identity resolution.
///
/// Stations are built by the [`IdentityResolver`](crate::resolve::IdentityResolver)
/// and are not mutated after resolution finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// Stable identifier: the authoritative hub or parent id when one was
    /// present, otherwise a slug of the canonical key.
    pub id: String,

    /// Display name (the first record's name in input order).
    pub name: String,

    /// Matching key of `name`.
    pub key: CanonicalKey,

    /// Representative position, if any merged record had one.
    pub coordinates: Option<Coordinates>,

    /// Union of modes across merged records, excluding bus.
    pub modes: BTreeSet<Mode>,

    /// Union of filtered line names across merged records.
    pub lines: BTreeSet<String>,

    /// Other display names that refer to this station, in first-seen order.
    pub aliases: Vec<String>,

    /// Authoritative hub identifier, if the station was grouped on one.
    pub hub_id: Option<String>,
}

impl Station {
    /// The display name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Whether `line` is one of the lines serving this station.
    pub fn serves_line(&self, line: &str) -> bool {
        self.lines.contains(line)
    }
}
