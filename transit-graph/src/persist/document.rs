//! The persisted graph document.
//!
//! ```json
//! {
//!   "nodes": {
//!     "Baker Street Underground Station": {
//!       "id": "940GZZLUBST", "modes": ["tube"], "lines": ["jubilee"],
//!       "constituent": ["Baker Street"], "lat": 51.5226, "lon": -0.1571
//!     }
//!   },
//!   "edges": [
//!     {"source": "...", "target": "...", "line": "jubilee", "weight": 2.0, "transfer": false}
//!   ]
//! }
//! ```
//!
//! `weight` is `null` while a line edge's travel time is unknown.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::assemble::Graph;
use crate::domain::{Coordinates, Edge, Mode, Station};
use crate::error::PipelineError;
use crate::normalize::NameNormalizer;
use crate::resolve::StationSet;

/// Attributes of one station, keyed by display name in [`GraphDocument::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAttrs {
    pub id: String,
    #[serde(default)]
    pub modes: BTreeSet<Mode>,
    #[serde(default)]
    pub lines: BTreeSet<String>,
    /// Aliases and child station names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constituent: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

/// One edge, with endpoints named by display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDoc {
    pub source: String,
    pub target: String,
    pub line: String,
    /// Minutes, or `null` when unknown.
    pub weight: Option<f64>,
    #[serde(default)]
    pub transfer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_timestamp: Option<DateTime<Utc>>,
}

/// The on-disk form of a [`Graph`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: BTreeMap<String, NodeAttrs>,
    pub edges: Vec<EdgeDoc>,
}

impl GraphDocument {
    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph
            .stations()
            .stations()
            .iter()
            .map(|s| {
                let attrs = NodeAttrs {
                    id: s.id.clone(),
                    modes: s.modes.clone(),
                    lines: s.lines.clone(),
                    constituent: s.aliases.clone(),
                    hub_id: s.hub_id.clone(),
                    lat: s.coordinates.map(|c| c.lat),
                    lon: s.coordinates.map(|c| c.lon),
                };
                (s.name.clone(), attrs)
            })
            .collect();

        let edges = graph
            .edges()
            .iter()
            .map(|e| EdgeDoc {
                source: graph.station_name(e.source),
                target: graph.station_name(e.target),
                line: e.line.clone(),
                weight: e.weight,
                transfer: e.transfer,
                duration: e.duration,
                calculated_timestamp: e.calculated_timestamp,
            })
            .collect();

        Self { nodes, edges }
    }

    /// Check the top-level structure, then decode nodes and edges.
    pub fn from_value(value: Value) -> Result<Self, PipelineError> {
        let Value::Object(mut root) = value else {
            return Err(PipelineError::StructuralCorruption(
                "document is not a JSON object".to_string(),
            ));
        };
        let nodes = root
            .remove("nodes")
            .ok_or_else(|| PipelineError::StructuralCorruption("missing `nodes`".to_string()))?;
        let edges = root
            .remove("edges")
            .ok_or_else(|| PipelineError::StructuralCorruption("missing `edges`".to_string()))?;

        let nodes: BTreeMap<String, NodeAttrs> = serde_json::from_value(nodes)
            .map_err(|e| PipelineError::StructuralCorruption(format!("invalid `nodes`: {e}")))?;
        let edges: Vec<EdgeDoc> = serde_json::from_value(edges)
            .map_err(|e| PipelineError::StructuralCorruption(format!("invalid `edges`: {e}")))?;

        Ok(Self { nodes, edges })
    }

    /// Rebuild the graph.
    ///
    /// Stations are indexed in node-name order. Repeated edge keys collapse
    /// to the smallest weight; the number collapsed is returned alongside.
    pub fn into_graph(self, normalizer: &NameNormalizer) -> Result<(Graph, usize), PipelineError> {
        let stations: Vec<Station> = self
            .nodes
            .into_iter()
            .map(|(name, attrs)| Station {
                id: attrs.id,
                key: normalizer.normalize(&name),
                coordinates: attrs.lat.zip(attrs.lon).and_then(|(lat, lon)| Coordinates::new(lat, lon)),
                modes: attrs.modes,
                lines: attrs.lines,
                aliases: attrs.constituent,
                hub_id: attrs.hub_id,
                name,
            })
            .collect();
        let stations = StationSet::new(stations)?;

        let mut edges = Vec::with_capacity(self.edges.len());
        for (i, doc) in self.edges.into_iter().enumerate() {
            let endpoint = |name: &str| {
                stations.lookup(name).ok_or_else(|| {
                    PipelineError::StructuralCorruption(format!("edge {i} names unknown node {name:?}"))
                })
            };
            edges.push(Edge {
                source: endpoint(&doc.source)?,
                target: endpoint(&doc.target)?,
                line: doc.line,
                weight: doc.weight,
                transfer: doc.transfer,
                duration: doc.duration,
                calculated_timestamp: doc.calculated_timestamp,
            });
        }

        let (graph, collapsed) = Graph::from_edges(stations, edges);
        if collapsed > 0 {
            warn!(collapsed, "duplicate edges collapsed to minimum weight");
        }
        debug!(
            stations = graph.station_count(),
            edges = graph.edge_count(),
            "graph document decoded"
        );
        Ok((graph, collapsed))
    }
}
