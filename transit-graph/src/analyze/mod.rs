//! Connectivity checks over an assembled graph.
//!
//! All traversals are breadth-first over adjacency lists built once when the
//! analyzer is created. Results are ordered by station index so reports are
//! stable across runs.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, info, warn};

use crate::assemble::Graph;
use crate::domain::{EdgeKey, StationIdx};

/// Forward and backward reachability from one station.
#[derive(Debug, Clone, PartialEq)]
pub struct Reachability {
    pub station: StationIdx,
    /// Stations reachable over outgoing edges, excluding `station`.
    pub forward: BTreeSet<StationIdx>,
    /// Stations that can reach `station`, excluding it.
    pub backward: BTreeSet<StationIdx>,
}

impl Reachability {
    /// Stations reachable from `station` that cannot get back to it.
    pub fn asymmetric(&self) -> Vec<StationIdx> {
        self.forward.difference(&self.backward).copied().collect()
    }

    pub fn is_symmetric(&self) -> bool {
        self.forward == self.backward
    }
}

/// Summary of a full connectivity analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectivityReport {
    pub stations: usize,
    pub edges: usize,
    /// Stations with no incident edge at all.
    pub isolated: Vec<StationIdx>,
    /// Undirected components, largest first. Members are in index order.
    pub components: Vec<Vec<StationIdx>>,
    /// Stations outside the largest component.
    pub disconnected: Vec<StationIdx>,
    /// Per line, stations with exactly one distinct neighbour on it.
    pub terminals: BTreeMap<String, Vec<StationIdx>>,
    /// Line edges with no return edge on the same line.
    pub one_way: Vec<EdgeKey>,
}

impl ConnectivityReport {
    pub fn main_component(&self) -> &[StationIdx] {
        self.components.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether every station is in one component.
    pub fn is_connected(&self) -> bool {
        self.components.len() <= 1
    }
}

/// Runs connectivity checks over a graph.
pub struct ConnectivityAnalyzer<'a> {
    graph: &'a Graph,
    /// Distinct successors per station, ascending.
    outgoing: Vec<Vec<StationIdx>>,
    /// Distinct predecessors per station, ascending.
    incoming: Vec<Vec<StationIdx>>,
}

impl<'a> ConnectivityAnalyzer<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        let n = graph.station_count();
        let mut outgoing = vec![Vec::new(); n];
        let mut incoming = vec![Vec::new(); n];

        for edge in graph.edges() {
            let (s, t) = (edge.source.0, edge.target.0);
            if s >= n || t >= n {
                continue;
            }
            outgoing[s].push(edge.target);
            incoming[t].push(edge.source);
        }
        for list in outgoing.iter_mut().chain(incoming.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }

        Self {
            graph,
            outgoing,
            incoming,
        }
    }

    /// Run every check.
    pub fn analyze(&self) -> ConnectivityReport {
        let components = self.components();
        let disconnected: Vec<StationIdx> = {
            let mut rest: Vec<StationIdx> = components.iter().skip(1).flatten().copied().collect();
            rest.sort_unstable();
            rest
        };

        let report = ConnectivityReport {
            stations: self.graph.station_count(),
            edges: self.graph.edge_count(),
            isolated: self.isolated(),
            disconnected,
            terminals: self.terminals(),
            one_way: self.one_way_edges(),
            components,
        };

        for &idx in &report.isolated {
            warn!(station = %self.graph.station_name(idx), "isolated station");
        }
        if !report.is_connected() {
            warn!(
                components = report.components.len(),
                disconnected = report.disconnected.len(),
                "graph is not connected"
            );
        }
        info!(
            stations = report.stations,
            edges = report.edges,
            components = report.components.len(),
            main_component = report.main_component().len(),
            isolated = report.isolated.len(),
            one_way = report.one_way.len(),
            "connectivity analysis complete"
        );

        report
    }

    /// Stations with zero incident edges in either direction.
    pub fn isolated(&self) -> Vec<StationIdx> {
        (0..self.outgoing.len())
            .filter(|&i| self.outgoing[i].is_empty() && self.incoming[i].is_empty())
            .map(StationIdx)
            .collect()
    }

    /// Connected components of the undirected closure of the edge set.
    ///
    /// Every station belongs to exactly one component. Components are
    /// sorted by size, largest first, with ties broken by smallest member.
    pub fn components(&self) -> Vec<Vec<StationIdx>> {
        let n = self.outgoing.len();
        let mut seen = vec![false; n];
        let mut components = Vec::new();

        for start in 0..n {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut members = vec![StationIdx(start)];
            let mut queue = VecDeque::from([start]);

            while let Some(current) = queue.pop_front() {
                let neighbours = self.outgoing[current].iter().chain(&self.incoming[current]);
                for next in neighbours {
                    if !seen[next.0] {
                        seen[next.0] = true;
                        members.push(*next);
                        queue.push_back(next.0);
                    }
                }
            }

            members.sort_unstable();
            components.push(members);
        }

        components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
        debug!(components = components.len(), "components computed");
        components
    }

    /// Forward and backward reachability from `station`.
    ///
    /// Returns `None` for an index outside the graph.
    pub fn reachability(&self, station: StationIdx) -> Option<Reachability> {
        if station.0 >= self.outgoing.len() {
            return None;
        }
        Some(Reachability {
            station,
            forward: bfs(&self.outgoing, station),
            backward: bfs(&self.incoming, station),
        })
    }

    /// Terminal stations per line, considering line edges only.
    ///
    /// A station is terminal on a line when its distinct neighbours on that
    /// line, counted over both directions, number exactly one.
    pub fn terminals(&self) -> BTreeMap<String, Vec<StationIdx>> {
        let mut neighbours: BTreeMap<&str, BTreeMap<StationIdx, BTreeSet<StationIdx>>> = BTreeMap::new();
        for edge in self.graph.edges().iter().filter(|e| !e.transfer) {
            let by_station = neighbours.entry(edge.line.as_str()).or_default();
            by_station.entry(edge.source).or_default().insert(edge.target);
            by_station.entry(edge.target).or_default().insert(edge.source);
        }

        neighbours
            .into_iter()
            .map(|(line, by_station)| {
                let ends = by_station
                    .into_iter()
                    .filter(|(_, set)| set.len() == 1)
                    .map(|(station, _)| station)
                    .collect();
                (line.to_string(), ends)
            })
            .collect()
    }

    /// Line edges `a -> b` on line `l` with no `b -> a` on `l`, in edge
    /// order.
    pub fn one_way_edges(&self) -> Vec<EdgeKey> {
        self.graph
            .edges()
            .iter()
            .filter(|e| !e.transfer)
            .map(|e| e.key())
            .filter(|key| !self.graph.contains_edge(&key.reversed()))
            .collect()
    }
}

/// Analyze `graph` with a freshly built analyzer.
pub fn analyze(graph: &Graph) -> ConnectivityReport {
    ConnectivityAnalyzer::new(graph).analyze()
}

/// Stations reachable from `start` over `adjacency`, excluding `start`.
fn bfs(adjacency: &[Vec<StationIdx>], start: StationIdx) -> BTreeSet<StationIdx> {
    let mut seen = BTreeSet::from([start]);
    let mut frontier = vec![start];

    while !frontier.is_empty() {
        let mut next_frontier = Vec::new();
        for station in frontier {
            for &next in &adjacency[station.0] {
                if seen.insert(next) {
                    next_frontier.push(next);
                }
            }
        }
        frontier = next_frontier;
    }

    seen.remove(&start);
    seen
}
