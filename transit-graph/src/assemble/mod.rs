//! Graph assembly from resolved stations and raw line segments.
//!
//! Line edges are added in segment input order. Transfer edges follow,
//! generated from station positions in ascending index order so that the
//! edge list is identical across runs.

mod graph;

pub use graph::Graph;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::domain::{Edge, Line, RawSegment, StationIdx, TRANSFER_LINE, is_bus_route};
use crate::error::Issue;
use crate::resolve::StationSet;

/// Counts and rejected segments from one assembly run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyReport {
    pub segments_in: usize,
    /// Line edges added.
    pub line_edges: usize,
    /// Transfer edges added, counting each direction.
    pub transfer_edges: usize,
    /// Segments whose edge already existed.
    pub duplicates_skipped: usize,
    /// Segments on bus routes or excluded modes.
    pub excluded: usize,
    pub issues: Vec<Issue>,
}

impl AssemblyReport {
    /// Segments rejected with an issue.
    pub fn rejected(&self) -> usize {
        self.issues.len()
    }
}

/// The assembled graph plus its report.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub graph: Graph,
    pub report: AssemblyReport,
}

/// Builds a [`Graph`] from stations and line segments.
#[derive(Debug, Clone)]
pub struct GraphAssembler {
    config: PipelineConfig,
}

impl GraphAssembler {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Assemble a new graph.
    pub fn assemble(&self, stations: StationSet, segments: &[RawSegment]) -> Assembly {
        let mut graph = Graph::new(stations);
        let report = self.extend(&mut graph, segments);
        Assembly { graph, report }
    }

    /// Add `segments` and the interchange transfers to an existing graph.
    ///
    /// Edges whose key is already present are skipped, so extending a graph
    /// with segments it was built from changes nothing.
    pub fn extend(&self, graph: &mut Graph, segments: &[RawSegment]) -> AssemblyReport {
        let mut report = AssemblyReport {
            segments_in: segments.len(),
            ..AssemblyReport::default()
        };

        for (index, segment) in segments.iter().enumerate() {
            self.add_segment(graph, index, segment, &mut report);
        }

        report.transfer_edges += self.add_complex_transfers(graph);

        for issue in &report.issues {
            warn!(%issue, "segment rejected");
        }
        info!(
            segments = report.segments_in,
            line_edges = report.line_edges,
            transfer_edges = report.transfer_edges,
            duplicates = report.duplicates_skipped,
            excluded = report.excluded,
            rejected = report.rejected(),
            "graph assembly complete"
        );

        report
    }

    fn add_segment(
        &self,
        graph: &mut Graph,
        index: usize,
        segment: &RawSegment,
        report: &mut AssemblyReport,
    ) {
        let line = segment.line.trim();
        let transfer = segment.is_transfer();

        if !transfer {
            if line.is_empty() {
                report.issues.push(Issue::MalformedRecord {
                    kind: "segment",
                    index,
                    reason: "empty line id".to_string(),
                });
                return;
            }
            if line.eq_ignore_ascii_case(TRANSFER_LINE) {
                report.issues.push(Issue::MalformedRecord {
                    kind: "segment",
                    index,
                    reason: format!("line id {TRANSFER_LINE:?} is reserved for interchange links"),
                });
                return;
            }
            let excluded_mode = segment
                .mode
                .as_ref()
                .is_some_and(|m| self.config.is_excluded(m));
            if excluded_mode || is_bus_route(line) {
                report.excluded += 1;
                return;
            }
        }

        let (Some(source), Some(target)) = (graph.lookup(&segment.source), graph.lookup(&segment.target))
        else {
            let missing = if graph.lookup(&segment.source).is_none() {
                &segment.source
            } else {
                &segment.target
            };
            report.issues.push(Issue::UnmappableSegment {
                from: segment.source.clone(),
                to: segment.target.clone(),
                line: segment.line.clone(),
                missing: missing.clone(),
            });
            return;
        };

        if source == target {
            report.issues.push(Issue::SelfLoopSegment {
                from: segment.source.clone(),
                to: segment.target.clone(),
                line: segment.line.clone(),
            });
            return;
        }

        if transfer {
            let added = self.add_transfer_pair(graph, source, target);
            if added == 0 {
                report.duplicates_skipped += 1;
            }
            report.transfer_edges += added;
            return;
        }

        if graph.insert(Edge::segment(source, target, line)) {
            report.line_edges += 1;
        } else {
            report.duplicates_skipped += 1;
        }
        graph.register_line(Line::new(line, segment.mode.clone()));
    }

    /// Insert transfers in both directions, returning how many were new.
    fn add_transfer_pair(&self, graph: &mut Graph, a: StationIdx, b: StationIdx) -> usize {
        [(a, b), (b, a)]
            .into_iter()
            .filter(|&(s, t)| graph.insert(Edge::transfer(s, t, self.config.transfer_minutes)))
            .count()
    }

    /// Link distinct stations of one interchange complex.
    ///
    /// Two stations form a complex when they are within the complex radius
    /// of each other, serve different lines, and no line edge joins them.
    fn add_complex_transfers(&self, graph: &mut Graph) -> usize {
        let mut pairs = Vec::new();
        {
            let located: Vec<_> = graph
                .stations()
                .iter()
                .filter_map(|(idx, s)| s.coordinates.map(|c| (idx, s, c)))
                .collect();

            for (i, &(a, station_a, pos_a)) in located.iter().enumerate() {
                for &(b, station_b, pos_b) in &located[i + 1..] {
                    if station_a.lines == station_b.lines || graph.linked(a, b) {
                        continue;
                    }
                    let distance = pos_a.distance_m(&pos_b);
                    if distance <= self.config.complex_radius_m {
                        debug!(
                            a = %station_a.name,
                            b = %station_b.name,
                            distance_m = distance.round(),
                            "interchange complex"
                        );
                        pairs.push((a, b));
                    }
                }
            }
        }

        pairs
            .into_iter()
            .map(|(a, b)| self.add_transfer_pair(graph, a, b))
            .sum()
    }
}
