//! The assembled station graph.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::{Edge, EdgeKey, Line, Station, StationIdx};
use crate::resolve::StationSet;

/// Stations plus a directed multigraph of edges between them.
///
/// Parallel edges are allowed when they differ by line. Edges keep their
/// insertion order, which later stages rely on for deterministic output.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    stations: StationSet,
    edges: Vec<Edge>,
    index: HashMap<EdgeKey, usize>,
    /// Unordered station pairs joined by at least one line edge.
    linked: HashSet<(StationIdx, StationIdx)>,
    lines: BTreeMap<String, Line>,
}

impl Graph {
    /// A graph with no edges.
    pub fn new(stations: StationSet) -> Self {
        Self {
            stations,
            ..Self::default()
        }
    }

    /// Build a graph from loaded edges.
    ///
    /// Repeated `(source, target, line)` keys collapse into the first edge,
    /// keeping the smallest known weight. Returns the graph and the number
    /// of edges collapsed.
    pub fn from_edges(stations: StationSet, edges: impl IntoIterator<Item = Edge>) -> (Self, usize) {
        let mut graph = Self::new(stations);
        let mut collapsed = 0;
        for edge in edges {
            if !graph.insert_or_min(edge) {
                collapsed += 1;
            }
        }
        (graph, collapsed)
    }

    /// Add an edge unless one with the same key exists. Returns whether the
    /// edge was added.
    pub fn insert(&mut self, edge: Edge) -> bool {
        if self.index.contains_key(&edge.key()) {
            return false;
        }
        self.push(edge);
        true
    }

    /// Like [`insert`](Self::insert), but an existing edge takes the smaller
    /// of the two weights. An unknown weight never replaces a known one.
    pub fn insert_or_min(&mut self, edge: Edge) -> bool {
        let Some(&pos) = self.index.get(&edge.key()) else {
            self.push(edge);
            return true;
        };

        let existing = &mut self.edges[pos];
        if let Some(weight) = edge.weight
            && existing.weight.is_none_or(|w| weight < w)
        {
            existing.weight = Some(weight);
            existing.duration = edge.duration;
            existing.calculated_timestamp = edge.calculated_timestamp;
        }
        false
    }

    fn push(&mut self, edge: Edge) {
        if !edge.transfer {
            self.linked.insert(unordered(edge.source, edge.target));
            self.lines
                .entry(edge.line.clone())
                .or_insert_with(|| Line::new(edge.line.clone(), None));
        }
        self.index.insert(edge.key(), self.edges.len());
        self.edges.push(edge);
    }

    /// Record reference data for a line. The first mode seen for a line is
    /// kept.
    pub fn register_line(&mut self, line: Line) {
        match self.lines.get_mut(&line.id) {
            Some(existing) => {
                if existing.mode.is_none() {
                    existing.mode = line.mode;
                }
            }
            None => {
                self.lines.insert(line.id.clone(), line);
            }
        }
    }

    pub fn stations(&self) -> &StationSet {
        &self.stations
    }

    pub fn station(&self, idx: StationIdx) -> Option<&Station> {
        self.stations.get(idx)
    }

    /// Find a station by exact display name or alias.
    pub fn lookup(&self, name: &str) -> Option<StationIdx> {
        self.stations.lookup(name)
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Mutable access for weight reconciliation. Keys must not change.
    pub(crate) fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.edges.iter().filter(|e| e.transfer).count()
    }

    pub fn edge(&self, key: &EdgeKey) -> Option<&Edge> {
        self.index.get(key).map(|&pos| &self.edges[pos])
    }

    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.index.contains_key(key)
    }

    /// Whether a line edge joins `a` and `b` in either direction.
    pub fn linked(&self, a: StationIdx, b: StationIdx) -> bool {
        self.linked.contains(&unordered(a, b))
    }

    /// Lines seen on edges or registered explicitly, ordered by id.
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.values()
    }

    pub fn line(&self, id: &str) -> Option<&Line> {
        self.lines.get(id)
    }

    /// Display name of a station, or its index if it is unknown.
    pub fn station_name(&self, idx: StationIdx) -> String {
        self.station(idx)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| idx.to_string())
    }
}

fn unordered(a: StationIdx, b: StationIdx) -> (StationIdx, StationIdx) {
    if a <= b { (a, b) } else { (b, a) }
}
