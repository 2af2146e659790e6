//! Merging external travel-time tables into graph edges.
//!
//! Sources are consulted in priority order and the first source holding an
//! edge's key sets its weight. Transfer edges keep the weight the assembler
//! gave them.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assemble::Graph;
use crate::config::DuplicatePolicy;
use crate::domain::EdgeKey;
use crate::error::Issue;

/// One row of a weight source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub source: String,
    pub target: String,
    pub line: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_timestamp: Option<DateTime<Utc>>,
}

impl WeightRecord {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        line: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            line: line.into(),
            weight,
            duration: None,
            calculated_timestamp: None,
        }
    }

    pub fn with_duration(mut self, minutes: f64) -> Self {
        self.duration = Some(minutes);
        self
    }
}

/// A named travel-time table, usually one file per mode group.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSource {
    pub name: String,
    pub records: Vec<WeightRecord>,
    /// Applied to records that carry no timestamp of their own.
    pub calculated_at: Option<DateTime<Utc>>,
}

impl WeightSource {
    pub fn new(name: impl Into<String>, records: Vec<WeightRecord>) -> Self {
        Self {
            name: name.into(),
            records,
            calculated_at: None,
        }
    }

    pub fn with_calculated_at(mut self, at: DateTime<Utc>) -> Self {
        self.calculated_at = Some(at);
        self
    }
}

/// How one source contributed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSummary {
    pub name: String,
    /// Rows that mapped onto station pairs.
    pub entries: usize,
    /// Edges whose weight came from this source.
    pub matched: usize,
    pub duplicates: usize,
    pub unmappable: usize,
}

/// Result of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileSummary {
    /// Line edges considered; transfers are not counted here.
    pub edges: usize,
    pub transfers_skipped: usize,
    /// Per source, in priority order.
    pub sources: Vec<SourceSummary>,
    /// Edges no source covers whose weight is still unknown.
    pub unmatched: usize,
    /// Edges no source covers that kept a weight from an earlier run.
    pub retained: usize,
    pub issues: Vec<Issue>,
}

impl ReconcileSummary {
    pub fn matched(&self) -> usize {
        self.sources.iter().map(|s| s.matched).sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightEntry {
    weight: f64,
    duration: Option<f64>,
    calculated_timestamp: Option<DateTime<Utc>>,
}

/// A source keyed by graph edge key.
struct WeightTable {
    entries: HashMap<EdgeKey, WeightEntry>,
}

/// Applies weight sources to a graph.
#[derive(Debug, Clone, Default)]
pub struct WeightReconciler {
    duplicate_policy: DuplicatePolicy,
}

impl WeightReconciler {
    pub fn new(duplicate_policy: DuplicatePolicy) -> Self {
        Self { duplicate_policy }
    }

    /// Set line-edge weights from `sources`, highest priority first.
    ///
    /// Edges are visited in graph order. Running twice with the same sources
    /// leaves the same weights.
    pub fn reconcile(&self, graph: &mut Graph, sources: &[WeightSource]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        let tables: Vec<WeightTable> = sources
            .iter()
            .map(|source| {
                let (table, source_summary) = self.index(graph, source, &mut summary.issues);
                summary.sources.push(source_summary);
                table
            })
            .collect();

        let mut unmatched = Vec::new();
        for edge in graph.edges_mut() {
            if edge.transfer {
                summary.transfers_skipped += 1;
                continue;
            }
            summary.edges += 1;

            let key = edge.key();
            let hit = tables
                .iter()
                .enumerate()
                .find_map(|(i, table)| table.entries.get(&key).map(|entry| (i, *entry)));

            match hit {
                Some((i, entry)) => {
                    edge.weight = Some(entry.weight);
                    edge.duration = entry.duration;
                    edge.calculated_timestamp = entry.calculated_timestamp;
                    summary.sources[i].matched += 1;
                }
                None if edge.weight.is_some() => summary.retained += 1,
                None => unmatched.push(key),
            }
        }

        summary.unmatched = unmatched.len();
        for key in unmatched {
            let issue = Issue::UnmatchedWeight {
                from: graph.station_name(key.source),
                to: graph.station_name(key.target),
                line: key.line,
            };
            debug!(%issue, "edge weight unknown");
            summary.issues.push(issue);
        }

        for source in &summary.sources {
            debug!(
                source = %source.name,
                entries = source.entries,
                matched = source.matched,
                duplicates = source.duplicates,
                unmappable = source.unmappable,
                "weight source applied"
            );
        }
        info!(
            edges = summary.edges,
            matched = summary.matched(),
            unmatched = summary.unmatched,
            retained = summary.retained,
            transfers_skipped = summary.transfers_skipped,
            "weight reconciliation complete"
        );

        summary
    }

    /// Key one source's rows against the graph's stations.
    fn index(
        &self,
        graph: &Graph,
        source: &WeightSource,
        issues: &mut Vec<Issue>,
    ) -> (WeightTable, SourceSummary) {
        let mut summary = SourceSummary {
            name: source.name.clone(),
            ..SourceSummary::default()
        };
        let mut entries: HashMap<EdgeKey, WeightEntry> = HashMap::new();

        for (index, record) in source.records.iter().enumerate() {
            if !record.weight.is_finite() || record.weight < 0.0 {
                let issue = Issue::MalformedRecord {
                    kind: "weight",
                    index,
                    reason: format!("invalid weight {}", record.weight),
                };
                warn!(source = %source.name, %issue, "weight row skipped");
                issues.push(issue);
                continue;
            }

            let (Some(from), Some(to)) = (graph.lookup(&record.source), graph.lookup(&record.target))
            else {
                let missing = if graph.lookup(&record.source).is_none() {
                    &record.source
                } else {
                    &record.target
                };
                summary.unmappable += 1;
                issues.push(Issue::UnmappableWeight {
                    source_name: source.name.clone(),
                    missing: missing.clone(),
                });
                continue;
            };

            let entry = WeightEntry {
                weight: record.weight,
                duration: record.duration,
                calculated_timestamp: record.calculated_timestamp.or(source.calculated_at),
            };
            match entries.entry(EdgeKey::new(from, to, record.line.trim())) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                    summary.entries += 1;
                }
                Entry::Occupied(mut slot) => {
                    summary.duplicates += 1;
                    issues.push(Issue::DuplicateWeight {
                        source_name: source.name.clone(),
                        from: record.source.clone(),
                        to: record.target.clone(),
                        line: record.line.clone(),
                    });
                    if self.duplicate_policy == DuplicatePolicy::Minimum
                        && entry.weight < slot.get().weight
                    {
                        slot.insert(entry);
                    }
                }
            }
        }

        (WeightTable { entries }, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{Assembly, GraphAssembler};
    use crate::config::PipelineConfig;
    use crate::domain::{Mode, RawSegment, RawStationRecord, StationIdx};
    use crate::resolve::IdentityResolver;

    const EDGWARE: &str = "Edgware Road (Circle Line) Underground Station";
    const PADDINGTON: &str = "Paddington Underground Station";
    const BAYSWATER: &str = "Bayswater Underground Station";

    fn paddington_graph() -> Graph {
        let config = PipelineConfig::default();
        let records = vec![
            RawStationRecord::new(EDGWARE, 51.5203, -0.1679)
                .with_modes([Mode::Tube])
                .with_lines(["circle", "district", "hammersmith-city"]),
            RawStationRecord::new(PADDINGTON, 51.5154, -0.1755)
                .with_modes([Mode::Tube])
                .with_lines(["circle", "district", "bakerloo"]),
            RawStationRecord::new(BAYSWATER, 51.5122, -0.1879)
                .with_modes([Mode::Tube])
                .with_lines(["circle", "district"]),
        ];
        let stations = IdentityResolver::new(&config).resolve(records).unwrap().stations;
        let segments = vec![
            RawSegment::new(EDGWARE, PADDINGTON, "circle"),
            RawSegment::new(PADDINGTON, BAYSWATER, "circle"),
            RawSegment::new(BAYSWATER, PADDINGTON, "circle"),
            RawSegment::new(PADDINGTON, BAYSWATER, "district"),
            RawSegment::new(EDGWARE, BAYSWATER, "").as_transfer(),
        ];
        let Assembly { graph, .. } = GraphAssembler::new(&config).assemble(stations, &segments);
        graph
    }

    fn weight(graph: &Graph, from: usize, to: usize, line: &str) -> Option<f64> {
        graph
            .edge(&EdgeKey::new(StationIdx(from), StationIdx(to), line))
            .and_then(|e| e.weight)
    }

    #[test]
    fn scenario_uncovered_edge_stays_unknown() {
        let mut graph = paddington_graph();
        let sources = vec![WeightSource::new(
            "tube",
            vec![WeightRecord::new(PADDINGTON, BAYSWATER, "circle", 2.0)],
        )];

        let summary = WeightReconciler::default().reconcile(&mut graph, &sources);

        assert_eq!(weight(&graph, 0, 1, "circle"), None);
        assert_eq!(summary.unmatched, 3);
        assert!(summary.issues.contains(&Issue::UnmatchedWeight {
            from: EDGWARE.to_string(),
            to: PADDINGTON.to_string(),
            line: "circle".to_string(),
        }));
        assert_eq!(weight(&graph, 1, 2, "circle"), Some(2.0));
    }

    #[test]
    fn first_source_in_priority_order_wins() {
        let mut graph = paddington_graph();
        let sources = vec![
            WeightSource::new(
                "timetable",
                vec![WeightRecord::new(PADDINGTON, BAYSWATER, "circle", 2.5).with_duration(2.0)],
            ),
            WeightSource::new(
                "tube",
                vec![
                    WeightRecord::new(PADDINGTON, BAYSWATER, "circle", 3.0),
                    WeightRecord::new(BAYSWATER, PADDINGTON, "circle", 3.0),
                ],
            ),
        ];

        let summary = WeightReconciler::default().reconcile(&mut graph, &sources);

        let edge = graph
            .edge(&EdgeKey::new(StationIdx(1), StationIdx(2), "circle"))
            .unwrap();
        assert_eq!(edge.weight, Some(2.5));
        assert_eq!(edge.duration, Some(2.0));
        assert_eq!(weight(&graph, 2, 1, "circle"), Some(3.0));
        assert_eq!(summary.sources[0].matched, 1);
        assert_eq!(summary.sources[1].matched, 1);
    }

    #[test]
    fn lines_are_matched_exactly() {
        let mut graph = paddington_graph();
        let sources = vec![WeightSource::new(
            "tube",
            vec![WeightRecord::new(PADDINGTON, BAYSWATER, "district", 4.0)],
        )];

        WeightReconciler::default().reconcile(&mut graph, &sources);
        assert_eq!(weight(&graph, 1, 2, "district"), Some(4.0));
        assert_eq!(weight(&graph, 1, 2, "circle"), None);
    }

    #[test]
    fn transfers_are_left_alone() {
        let mut graph = paddington_graph();
        let sources = vec![WeightSource::new(
            "walking",
            vec![WeightRecord::new(EDGWARE, BAYSWATER, "transfer", 12.0)],
        )];

        let summary = WeightReconciler::default().reconcile(&mut graph, &sources);
        assert_eq!(weight(&graph, 0, 2, "transfer"), Some(5.0));
        assert_eq!(summary.transfers_skipped, 2);
        assert_eq!(summary.edges, 4);
    }

    #[test]
    fn duplicate_rows_first_wins_by_default() {
        let rows = vec![
            WeightRecord::new(PADDINGTON, BAYSWATER, "circle", 3.0),
            WeightRecord::new(PADDINGTON, BAYSWATER, "circle", 2.0),
        ];

        let mut graph = paddington_graph();
        let summary = WeightReconciler::default()
            .reconcile(&mut graph, &[WeightSource::new("tube", rows.clone())]);
        assert_eq!(weight(&graph, 1, 2, "circle"), Some(3.0));
        assert_eq!(summary.sources[0].duplicates, 1);
        assert!(matches!(summary.issues[0], Issue::DuplicateWeight { .. }));

        // The later, smaller row replaces the earlier one and is still reported
        let mut graph = paddington_graph();
        let summary = WeightReconciler::new(DuplicatePolicy::Minimum)
            .reconcile(&mut graph, &[WeightSource::new("tube", rows)]);
        assert_eq!(weight(&graph, 1, 2, "circle"), Some(2.0));
        assert_eq!(summary.sources[0].duplicates, 1);
        assert!(matches!(summary.issues[0], Issue::DuplicateWeight { .. }));
    }

    #[test]
    fn bad_rows_are_counted() {
        let mut graph = paddington_graph();
        let sources = vec![WeightSource::new(
            "tube",
            vec![
                WeightRecord::new(PADDINGTON, "Lancaster Gate Underground Station", "central", 2.0),
                WeightRecord::new(PADDINGTON, BAYSWATER, "circle", f64::NAN),
                WeightRecord::new(PADDINGTON, BAYSWATER, "circle", -1.0),
            ],
        )];

        let summary = WeightReconciler::default().reconcile(&mut graph, &sources);
        assert_eq!(summary.sources[0].unmappable, 1);
        assert_eq!(summary.sources[0].entries, 0);
        assert_eq!(
            summary.issues[0],
            Issue::UnmappableWeight {
                source_name: "tube".to_string(),
                missing: "Lancaster Gate Underground Station".to_string(),
            }
        );
        assert!(matches!(summary.issues[1], Issue::MalformedRecord { kind: "weight", index: 1, .. }));
        assert_eq!(weight(&graph, 1, 2, "circle"), None);
    }

    #[test]
    fn source_timestamp_fills_missing_row_timestamp() {
        let at = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut graph = paddington_graph();
        let sources = vec![
            WeightSource::new("tube", vec![WeightRecord::new(PADDINGTON, BAYSWATER, "circle", 2.0)])
                .with_calculated_at(at),
        ];

        WeightReconciler::default().reconcile(&mut graph, &sources);
        let edge = graph
            .edge(&EdgeKey::new(StationIdx(1), StationIdx(2), "circle"))
            .unwrap();
        assert_eq!(edge.calculated_timestamp, Some(at));
    }

    #[test]
    fn reconciling_twice_is_identical() {
        let sources = vec![
            WeightSource::new("timetable", vec![WeightRecord::new(EDGWARE, PADDINGTON, "circle", 1.7)]),
            WeightSource::new(
                "tube",
                vec![
                    WeightRecord::new(PADDINGTON, BAYSWATER, "circle", 2.1),
                    WeightRecord::new(PADDINGTON, BAYSWATER, "circle", 1.9),
                    WeightRecord::new(BAYSWATER, PADDINGTON, "circle", 2.3),
                ],
            ),
        ];
        let reconciler = WeightReconciler::new(DuplicatePolicy::Minimum);

        let mut graph = paddington_graph();
        let first = reconciler.reconcile(&mut graph, &sources);
        let weights: Vec<Option<u64>> = graph.edges().iter().map(|e| e.weight.map(f64::to_bits)).collect();

        let second = reconciler.reconcile(&mut graph, &sources);
        let again: Vec<Option<u64>> = graph.edges().iter().map(|e| e.weight.map(f64::to_bits)).collect();

        assert_eq!(weights, again);
        assert_eq!(first.matched(), second.matched());
        assert_eq!(first.unmatched, second.unmatched);
    }

    #[test]
    fn earlier_weights_are_retained_when_uncovered() {
        let mut graph = paddington_graph();
        WeightReconciler::default().reconcile(
            &mut graph,
            &[WeightSource::new("tube", vec![WeightRecord::new(PADDINGTON, BAYSWATER, "circle", 2.0)])],
        );

        let summary = WeightReconciler::default().reconcile(&mut graph, &[]);
        assert_eq!(weight(&graph, 1, 2, "circle"), Some(2.0));
        assert_eq!(summary.retained, 1);
        assert_eq!(summary.unmatched, 3);
    }
}
