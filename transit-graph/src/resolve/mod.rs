//! Station identity resolution.
//!
//! Groups raw station records into canonical [`Station`]s. Each record is
//! grouped by the strongest claim it carries:
//!
//! 1. a hub identifier;
//! 2. a station-complex (parent) identifier, for non-child records;
//! 3. child sub-entries are deferred and reattached to the group holding
//!    their parent's identifier, or to the group at their rounded position.
//!    When several stations share that position, the one whose key the
//!    child's key starts with wins; otherwise the child is unresolvable;
//! 4. otherwise the composite of canonical key and rounded coordinate. A
//!    record whose own id is another record's parent id joins that group
//!    as well.
//!
//! Membership depends only on these key lookups, never on input order. The
//! representative display name does depend on order: it is the first
//! non-child record's name.

mod groups;
mod station_set;
#[cfg(test)]
mod tests;

pub use station_set::StationSet;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::domain::{Coordinates, GroupingClaim, Mode, RawStationRecord, Station, is_bus_route};
use crate::error::{Issue, PipelineError};
use crate::normalize::{CanonicalKey, NameNormalizer};

use groups::UnionFind;

/// Fallback identity: canonical key plus rounded coordinate.
type CompositeKey = (CanonicalKey, (i64, i64));

/// Outcome of a resolution run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionReport {
    /// Records received.
    pub records_in: usize,
    /// Stations produced.
    pub stations_out: usize,
    /// Records absorbed into a group someone else started.
    pub merged: usize,
    /// Records skipped, with the reason.
    pub issues: Vec<Issue>,
}

/// Resolved stations plus the report describing how they were formed.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub stations: StationSet,
    pub report: ResolutionReport,
}

/// A record that passed input validation, with derived matching data.
struct Prepared {
    record: RawStationRecord,
    key: CanonicalKey,
    coords: Option<Coordinates>,
    lines: Vec<String>,
}

/// Groups raw station records into canonical stations.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    normalizer: NameNormalizer,
    config: PipelineConfig,
}

impl IdentityResolver {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            normalizer: NameNormalizer::default(),
            config: config.clone(),
        }
    }

    /// Use a custom normalizer (e.g. a different override table).
    pub fn with_normalizer(mut self, normalizer: NameNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Resolve `records` into a station set.
    ///
    /// Invalid and unresolvable records are reported in
    /// [`ResolutionReport::issues`]. Fails if no station can be formed, if
    /// two stations share a canonical key, or if a display name would
    /// belong to two stations.
    pub fn resolve(&self, records: Vec<RawStationRecord>) -> Result<Resolution, PipelineError> {
        let records_in = records.len();
        let mut issues = Vec::new();

        let prepared: Vec<Prepared> = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| self.prepare(index, record, &mut issues))
            .collect();

        let mut uf = UnionFind::default();
        let mut assignment: Vec<Option<usize>> = vec![None; prepared.len()];
        let mut authority: HashMap<String, usize> = HashMap::new();

        // Pass 1: hub and parent identifiers
        for (pos, p) in prepared.iter().enumerate() {
            let ids = p.record.authoritative_ids();
            if ids.is_empty() {
                continue;
            }

            let existing: Vec<usize> = ids
                .iter()
                .filter_map(|id| authority.get(*id).copied())
                .collect();
            let group = match existing.split_first() {
                None => uf.push(),
                Some((&first, rest)) => rest.iter().fold(first, |acc, &g| uf.union(acc, g)),
            };

            for id in ids {
                authority.entry(id.to_string()).or_insert(group);
            }
            assignment[pos] = Some(group);
        }

        // Pass 2: composite key for records without authority
        let mut composite: HashMap<CompositeKey, usize> = HashMap::new();
        for (pos, p) in prepared.iter().enumerate() {
            if let (Some(group), Some(coords)) = (assignment[pos], p.coords)
                && !p.key.is_empty()
            {
                composite
                    .entry((p.key.clone(), coords.rounded(self.config.coordinate_precision)))
                    .or_insert(group);
            }
        }

        for (pos, p) in prepared.iter().enumerate() {
            if p.record.grouping_claim() != GroupingClaim::Fallback {
                continue;
            }

            // A station whose own id other records name as their parent
            let by_id = p
                .record
                .record_id()
                .and_then(|id| authority.get(id).copied());
            let composite_key = p
                .coords
                .filter(|_| !p.key.is_empty())
                .map(|c| (p.key.clone(), c.rounded(self.config.coordinate_precision)));

            let group = match (composite_key, by_id) {
                (Some(composite_key), by_id) => {
                    let group = match (composite.get(&composite_key).copied(), by_id) {
                        (Some(a), Some(b)) => uf.union(a, b),
                        (Some(g), None) | (None, Some(g)) => g,
                        (None, None) => uf.push(),
                    };
                    composite.entry(composite_key).or_insert(group);
                    group
                }
                (None, Some(group)) => group,
                (None, None) => {
                    let reason = if p.coords.is_none() {
                        "no authoritative id and no usable coordinates"
                    } else {
                        "name has no matchable content"
                    };
                    issues.push(Issue::UnresolvableIdentity {
                        name: p.record.name.clone(),
                        reason,
                    });
                    continue;
                }
            };

            if let Some(id) = p.record.record_id() {
                authority.entry(id.to_string()).or_insert(group);
            }
            assignment[pos] = Some(group);
        }

        // Pass 3: reattach child entries
        let mut by_position: HashMap<(i64, i64), BTreeSet<usize>> = HashMap::new();
        let mut root_keys: HashMap<usize, BTreeSet<CanonicalKey>> = HashMap::new();
        for (pos, p) in prepared.iter().enumerate() {
            let Some(group) = assignment[pos] else {
                continue;
            };
            let root = uf.find(group);
            if let Some(coords) = p.coords {
                by_position
                    .entry(coords.rounded(self.config.coordinate_precision))
                    .or_default()
                    .insert(root);
            }
            if !p.key.is_empty() {
                root_keys.entry(root).or_default().insert(p.key.clone());
            }
        }

        for (pos, p) in prepared.iter().enumerate() {
            let GroupingClaim::Child { parent } = p.record.grouping_claim() else {
                continue;
            };
            let group = match parent.and_then(|id| authority.get(id).copied()) {
                Some(group) => Ok(group),
                None => {
                    let candidates = p
                        .coords
                        .and_then(|c| by_position.get(&c.rounded(self.config.coordinate_precision)));
                    pick_by_position(&p.key, candidates, &root_keys)
                }
            };
            match group {
                Ok(group) => assignment[pos] = Some(group),
                Err(reason) => issues.push(Issue::UnresolvableIdentity {
                    name: p.record.name.clone(),
                    reason,
                }),
            }
        }

        // Collect members per root, ordered by first member
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (pos, group) in assignment.iter().enumerate() {
            if let Some(group) = group {
                by_root.entry(uf.find(*group)).or_default().push(pos);
            }
        }
        let mut groups: Vec<Vec<usize>> = by_root.into_values().collect();
        groups.sort_by_key(|members| members.first().copied());

        let assigned: usize = groups.iter().map(Vec::len).sum();
        debug!(
            groups_created = uf.len(),
            groups = groups.len(),
            assigned,
            "identity groups formed"
        );

        let mut used_ids = HashSet::new();
        let stations: Vec<Station> = groups
            .iter()
            .filter_map(|positions| {
                let members: Vec<&Prepared> = positions.iter().map(|&pos| &prepared[pos]).collect();
                self.build_station(&members, &mut used_ids)
            })
            .collect();

        for issue in &issues {
            warn!(%issue, "station record skipped");
        }

        if stations.is_empty() {
            return Err(PipelineError::NoValidRecords("station"));
        }

        check_key_uniqueness(&stations)?;
        let stations = StationSet::new(stations)?;

        let report = ResolutionReport {
            records_in,
            stations_out: stations.len(),
            merged: assigned.saturating_sub(stations.len()),
            issues,
        };
        info!(
            records = report.records_in,
            stations = report.stations_out,
            merged = report.merged,
            issues = report.issues.len(),
            "identity resolution complete"
        );

        Ok(Resolution { stations, report })
    }

    /// Validate one record and derive its matching data.
    fn prepare(
        &self,
        index: usize,
        record: RawStationRecord,
        issues: &mut Vec<Issue>,
    ) -> Option<Prepared> {
        if record.name.trim().is_empty() {
            issues.push(Issue::MalformedRecord {
                kind: "station",
                index,
                reason: "empty name".to_string(),
            });
            return None;
        }

        let lines: Vec<String> = record
            .lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty() && !is_bus_route(l))
            .map(str::to_string)
            .collect();

        let only_bus_lines = !record.lines.is_empty() && lines.is_empty();
        let only_excluded_modes = !record.modes.is_empty()
            && record.modes.iter().all(|m| self.config.is_excluded(m));
        if only_bus_lines || (only_excluded_modes && lines.is_empty()) {
            issues.push(Issue::BusOnlyRecord { name: record.name });
            return None;
        }

        Some(Prepared {
            key: self.normalizer.normalize(&record.name),
            coords: record.coordinates(),
            lines,
            record,
        })
    }

    /// Merge one identity group into a station.
    fn build_station(&self, members: &[&Prepared], used_ids: &mut HashSet<String>) -> Option<Station> {
        let rep = members
            .iter()
            .find(|p| !p.record.is_child)
            .or_else(|| members.first())?;

        let name = rep.record.name.trim().to_string();
        let key = self.normalizer.normalize(&name);

        let mut aliases = Vec::new();
        for member in members {
            push_alias(&mut aliases, &name, &member.record.name);
            for child in &member.record.child_stations {
                push_alias(&mut aliases, &name, child);
            }
        }

        let modes: BTreeSet<Mode> = members
            .iter()
            .flat_map(|m| m.record.modes.iter())
            .filter(|m| !self.config.is_excluded(m))
            .cloned()
            .collect();
        let lines: BTreeSet<String> = members.iter().flat_map(|m| m.lines.iter().cloned()).collect();

        let coordinates = rep.coords.or_else(|| members.iter().find_map(|m| m.coords));
        let hub_id = members
            .iter()
            .find_map(|m| m.record.hub_ref())
            .map(str::to_string);
        let base_id = hub_id
            .clone()
            .or_else(|| {
                members
                    .iter()
                    .filter(|m| !m.record.is_child)
                    .find_map(|m| m.record.parent_ref())
                    .map(str::to_string)
            })
            .or_else(|| rep.record.record_id().map(str::to_string))
            .unwrap_or_else(|| slug(&key));

        debug!(
            station = %name,
            members = members.len(),
            aliases = aliases.len(),
            "resolved station"
        );

        Some(Station {
            id: unique_id(base_id, used_ids),
            name,
            key,
            coordinates,
            modes,
            lines,
            aliases,
            hub_id,
        })
    }
}

/// Choose the group a parentless child belongs to from the groups at its
/// rounded position. Several groups at one position are told apart by a
/// station key that the child's key starts with; if that leaves anything
/// but one group, the child is unresolvable.
fn pick_by_position(
    child_key: &CanonicalKey,
    candidates: Option<&BTreeSet<usize>>,
    root_keys: &HashMap<usize, BTreeSet<CanonicalKey>>,
) -> Result<usize, &'static str> {
    let Some(candidates) = candidates.filter(|c| !c.is_empty()) else {
        return Err("child entry matches no parent group");
    };
    if candidates.len() == 1
        && let Some(&only) = candidates.first()
    {
        return Ok(only);
    }

    let named: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|root| {
            root_keys
                .get(root)
                .is_some_and(|keys| keys.iter().any(|k| starts_with_words(child_key, k)))
        })
        .collect();
    match named.as_slice() {
        &[only] => Ok(only),
        _ => Err("child entry position is shared by several stations"),
    }
}

/// Whether `key` begins with the whole words of `prefix`.
fn starts_with_words(key: &CanonicalKey, prefix: &CanonicalKey) -> bool {
    let (key, prefix) = (key.as_str(), prefix.as_str());
    !prefix.is_empty()
        && key
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
}

fn push_alias(aliases: &mut Vec<String>, name: &str, alias: &str) {
    let alias = alias.trim();
    if !alias.is_empty() && alias != name && !aliases.iter().any(|a| a == alias) {
        aliases.push(alias.to_string());
    }
}

fn slug(key: &CanonicalKey) -> String {
    if key.is_empty() {
        return "station".to_string();
    }
    key.as_str().replace(' ', "-")
}

fn unique_id(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Two distinct stations must never share a canonical key.
fn check_key_uniqueness(stations: &[Station]) -> Result<(), PipelineError> {
    let mut seen: HashMap<&CanonicalKey, &str> = HashMap::new();
    for station in stations {
        if station.key.is_empty() {
            continue;
        }
        if let Some(first) = seen.insert(&station.key, &station.name) {
            return Err(PipelineError::AmbiguousNormalization {
                key: station.key.clone(),
                first: first.to_string(),
                second: station.name.clone(),
            });
        }
    }
    Ok(())
}
