//! Reading and writing pipeline files.
//!
//! Input lists are decoded one item at a time so that a malformed record is
//! counted and skipped instead of failing the whole file.

mod document;

pub use document::{EdgeDoc, GraphDocument, NodeAttrs};

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::assemble::Graph;
use crate::domain::{RawSegment, RawStationRecord};
use crate::error::{Issue, PipelineError};
use crate::normalize::NameNormalizer;
use crate::reconcile::{WeightRecord, WeightSource};

/// Weight source groups, highest priority first.
pub const WEIGHT_SOURCE_PRIORITY: &[&str] = &[
    "timetable",
    "tube",
    "elizabeth-line",
    "overground",
    "dlr",
    "tram",
    "national-rail",
    "walking",
];

/// Items decoded from an input list, plus the ones that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub items: Vec<T>,
    pub issues: Vec<Issue>,
}

/// Read a JSON file.
fn read_value(path: &Path) -> Result<Value, PipelineError> {
    let contents = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Write `value` as pretty JSON, creating parent directories.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| PipelineError::io(path, e))
}

/// Decode each element of a JSON array as `T`.
///
/// Fails if `value` is not an array. With `require_any`, also fails when
/// nothing could be decoded.
fn parse_items<T: DeserializeOwned>(
    kind: &'static str,
    value: Value,
    require_any: bool,
) -> Result<Parsed<T>, PipelineError> {
    let Value::Array(elements) = value else {
        return Err(PipelineError::StructuralCorruption(format!(
            "{kind} input is not a JSON list"
        )));
    };

    let mut items = Vec::with_capacity(elements.len());
    let mut issues = Vec::new();
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<T>(element) {
            Ok(item) => items.push(item),
            Err(e) => {
                let issue = Issue::MalformedRecord {
                    kind,
                    index,
                    reason: e.to_string(),
                };
                warn!(%issue, "record skipped");
                issues.push(issue);
            }
        }
    }

    if require_any && items.is_empty() {
        return Err(PipelineError::NoValidRecords(kind));
    }
    debug!(kind, items = items.len(), skipped = issues.len(), "input decoded");
    Ok(Parsed { items, issues })
}

/// Read raw station records from a JSON list.
pub fn read_station_records(path: &Path) -> Result<Parsed<RawStationRecord>, PipelineError> {
    parse_items("station", read_value(path)?, true)
}

pub fn write_station_records(path: &Path, records: &[RawStationRecord]) -> Result<(), PipelineError> {
    write_json(path, &records)
}

/// Read line segments from a JSON list.
pub fn read_segments(path: &Path) -> Result<Parsed<RawSegment>, PipelineError> {
    parse_items("segment", read_value(path)?, true)
}

/// Read one weight source file.
///
/// The file is either a flat list of records, or an object with a
/// `records` list and an optional `calculated_at` timestamp.
pub fn read_weight_source(
    path: &Path,
    name: impl Into<String>,
) -> Result<(WeightSource, Vec<Issue>), PipelineError> {
    let value = read_value(path)?;
    let (records, calculated_at) = match value {
        Value::Object(mut object) => {
            let records = object.remove("records").ok_or_else(|| {
                PipelineError::StructuralCorruption(format!(
                    "{}: weight file has no `records`",
                    path.display()
                ))
            })?;
            let calculated_at = object
                .remove("calculated_at")
                .filter(|v| !v.is_null())
                .map(serde_json::from_value)
                .transpose()?;
            (records, calculated_at)
        }
        other => (other, None),
    };

    let parsed: Parsed<WeightRecord> = parse_items("weight", records, false)?;
    let source = WeightSource {
        name: name.into(),
        records: parsed.items,
        calculated_at,
    };
    Ok((source, parsed.issues))
}

pub fn write_weight_source(path: &Path, source: &WeightSource) -> Result<(), PipelineError> {
    write_json(path, &source.records)
}

/// File name of a weight source group.
pub fn weight_file_name(group: &str) -> String {
    format!("{group}_weights.json")
}

/// The weight files present in `dir`, in priority order.
///
/// Returns `(group, path)` pairs for each group in
/// [`WEIGHT_SOURCE_PRIORITY`] whose `<group>_weights.json` exists.
pub fn discover_weight_sources(dir: &Path) -> Vec<(String, PathBuf)> {
    WEIGHT_SOURCE_PRIORITY
        .iter()
        .map(|group| (group.to_string(), dir.join(weight_file_name(group))))
        .filter(|(_, path)| path.is_file())
        .collect()
}

/// Load every weight file found in `dir`, in priority order.
pub fn load_weight_sources(dir: &Path) -> Result<(Vec<WeightSource>, Vec<Issue>), PipelineError> {
    let mut sources = Vec::new();
    let mut issues = Vec::new();
    for (group, path) in discover_weight_sources(dir) {
        let (source, source_issues) = read_weight_source(&path, group)?;
        info!(
            source = %source.name,
            records = source.records.len(),
            path = %path.display(),
            "weight source loaded"
        );
        sources.push(source);
        issues.extend(source_issues);
    }
    Ok((sources, issues))
}

/// Read a persisted graph.
pub fn read_graph(path: &Path, normalizer: &NameNormalizer) -> Result<Graph, PipelineError> {
    let document = GraphDocument::from_value(read_value(path)?)?;
    let (graph, _) = document.into_graph(normalizer)?;
    info!(
        path = %path.display(),
        stations = graph.station_count(),
        edges = graph.edge_count(),
        "graph loaded"
    );
    Ok(graph)
}

/// Write a graph document.
pub fn write_graph(path: &Path, graph: &Graph) -> Result<(), PipelineError> {
    write_json(path, &GraphDocument::from_graph(graph))?;
    info!(
        path = %path.display(),
        stations = graph.station_count(),
        edges = graph.edge_count(),
        "graph written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::assemble::{Assembly, GraphAssembler};
    use crate::config::PipelineConfig;
    use crate::domain::{Mode, StationIdx};
    use crate::reconcile::WeightReconciler;
    use crate::resolve::IdentityResolver;

    fn write(dir: &TempDir, name: &str, value: Value) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn station_records_skip_malformed_items() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "stations.json",
            json!([
                {"name": "Baker Street", "lat": 51.5226, "lon": -0.1571, "modes": ["tube"], "lines": ["jubilee"]},
                {"lat": 51.5, "lon": -0.1},
                {"name": "Bank", "lat": 51.5133, "lon": -0.0890, "child_stations": ["Bank DLR"]},
                {"name": 42}
            ]),
        );

        let parsed = read_station_records(&path).unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].modes, vec![Mode::Tube]);
        assert_eq!(parsed.items[1].child_stations, vec!["Bank DLR"]);
        assert_eq!(parsed.issues.len(), 2);
        assert!(matches!(parsed.issues[0], Issue::MalformedRecord { kind: "station", index: 1, .. }));
    }

    #[test]
    fn all_malformed_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "segments.json", json!([{"line": "central"}]));
        let err = read_segments(&path).unwrap_err();
        assert!(matches!(err, PipelineError::NoValidRecords("segment")));

        let path = write(&dir, "empty.json", json!([]));
        assert!(read_segments(&path).is_err());
    }

    #[test]
    fn non_list_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "segments.json", json!({"source": "A"}));
        assert!(matches!(
            read_segments(&path).unwrap_err(),
            PipelineError::StructuralCorruption(_)
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_station_records(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }

    #[test]
    fn weight_files_in_both_shapes() {
        let dir = TempDir::new().unwrap();
        let flat = write(
            &dir,
            "tube_weights.json",
            json!([
                {"source": "A", "target": "B", "line": "central", "weight": 2.0, "duration": 1.5},
                {"source": "A", "target": "B", "line": "central"}
            ]),
        );
        let wrapped = write(
            &dir,
            "dlr_weights.json",
            json!({
                "calculated_at": "2024-03-01T12:00:00Z",
                "records": [{"source": "C", "target": "D", "line": "dlr", "weight": 1.0}]
            }),
        );

        let (tube, issues) = read_weight_source(&flat, "tube").unwrap();
        assert_eq!(tube.records, vec![WeightRecord::new("A", "B", "central", 2.0).with_duration(1.5)]);
        assert_eq!(issues.len(), 1);

        let (dlr, issues) = read_weight_source(&wrapped, "dlr").unwrap();
        assert!(issues.is_empty());
        assert!(dlr.calculated_at.is_some());
        assert_eq!(dlr.records.len(), 1);
    }

    #[test]
    fn discovery_follows_priority_order() {
        let dir = TempDir::new().unwrap();
        for group in ["walking", "dlr", "tube", "buses"] {
            write(&dir, &weight_file_name(group), json!([]));
        }

        let found: Vec<String> = discover_weight_sources(dir.path())
            .into_iter()
            .map(|(group, _)| group)
            .collect();
        assert_eq!(found, vec!["tube", "dlr", "walking"]);

        let (sources, _) = load_weight_sources(dir.path()).unwrap();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].name, "tube");
    }

    #[test]
    fn graph_round_trips_through_disk() {
        let config = PipelineConfig::default();
        let records = vec![
            RawStationRecord::new("Baker Street Underground Station", 51.5226, -0.1571)
                .with_modes([Mode::Tube])
                .with_lines(["jubilee"]),
            RawStationRecord::new("Baker Street", 51.5226, -0.1571).with_modes([Mode::Tube]),
            RawStationRecord::new("Bond Street Underground Station", 51.5142, -0.1494)
                .with_modes([Mode::Tube])
                .with_lines(["jubilee"]),
        ];
        let stations = IdentityResolver::new(&config).resolve(records).unwrap().stations;
        let segments = vec![
            RawSegment::new("Baker Street", "Bond Street Underground Station", "jubilee"),
            RawSegment::new("Bond Street Underground Station", "Baker Street", "jubilee"),
        ];
        let Assembly { mut graph, .. } = GraphAssembler::new(&config).assemble(stations, &segments);
        WeightReconciler::default().reconcile(
            &mut graph,
            &[WeightSource::new(
                "tube",
                vec![WeightRecord::new("Baker Street", "Bond Street Underground Station", "jubilee", 2.0)],
            )],
        );

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("graph.json");
        write_graph(&path, &graph).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["edges"][1]["weight"].is_null());
        assert_eq!(raw["nodes"]["Baker Street Underground Station"]["constituent"], json!(["Baker Street"]));

        let loaded = read_graph(&path, &NameNormalizer::default()).unwrap();
        assert_eq!(loaded.station_count(), 2);
        assert_eq!(loaded.edges(), graph.edges());
        assert_eq!(loaded.lookup("Baker Street"), Some(StationIdx(0)));
    }

    #[test]
    fn station_records_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stations.json");
        let records = vec![
            RawStationRecord::new("Bank", 51.5133, -0.0890)
                .with_hub("HUBBAN")
                .with_modes([Mode::Tube, Mode::Dlr]),
        ];
        write_station_records(&path, &records).unwrap();

        let items = read_station_records(&path).unwrap().items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Bank");
        assert_eq!(items[0].hub_id.as_deref(), Some("HUBBAN"));
        assert_eq!(items[0].modes, records[0].modes);
    }
}
