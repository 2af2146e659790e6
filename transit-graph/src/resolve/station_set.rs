//! The resolved station collection and its alias table.

use std::collections::HashMap;

use crate::domain::{Station, StationIdx};
use crate::error::PipelineError;

/// Canonical stations plus an exact-match alias table.
///
/// Every display name and alias maps to exactly one station; the
/// constructor rejects collections where that does not hold.
#[derive(Debug, Clone, Default)]
pub struct StationSet {
    stations: Vec<Station>,
    aliases: HashMap<String, StationIdx>,
}

impl StationSet {
    /// Build the alias table, failing if any name belongs to two stations.
    pub fn new(stations: Vec<Station>) -> Result<Self, PipelineError> {
        let mut aliases: HashMap<String, StationIdx> = HashMap::new();

        for (i, station) in stations.iter().enumerate() {
            for name in station.names() {
                match aliases.get(name) {
                    Some(existing) if existing.0 != i => {
                        return Err(PipelineError::DuplicateAlias {
                            alias: name.to_string(),
                            first: stations[existing.0].name.clone(),
                            second: station.name.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        aliases.insert(name.to_string(), StationIdx(i));
                    }
                }
            }
        }

        Ok(Self { stations, aliases })
    }

    /// Find a station by exact display name or alias. Names are not
    /// re-normalized.
    pub fn lookup(&self, name: &str) -> Option<StationIdx> {
        self.aliases.get(name).copied()
    }

    pub fn get(&self, idx: StationIdx) -> Option<&Station> {
        self.stations.get(idx.0)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Stations with their indices, in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = (StationIdx, &Station)> {
        self.stations
            .iter()
            .enumerate()
            .map(|(i, s)| (StationIdx(i), s))
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }
}
