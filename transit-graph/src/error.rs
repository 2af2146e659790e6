//! Error types for the reconciliation pipeline.
//!
//! [`Issue`]s are stage-local problems with individual records: they are
//! collected in the stage's report, logged in the stage summary, and never
//! stop the pipeline on their own. [`PipelineError`]s mean the stage cannot
//! produce a consistent result and must abort.

use std::path::PathBuf;

use crate::normalize::CanonicalKey;

/// A counted, non-fatal problem with one input record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Issue {
    /// A required field is missing or has the wrong type.
    #[error("malformed {kind} record #{index}: {reason}")]
    MalformedRecord {
        kind: &'static str,
        index: usize,
        reason: String,
    },

    /// A station record that cannot be placed in any identity group.
    #[error("cannot resolve station {name:?}: {reason}")]
    UnresolvableIdentity { name: String, reason: &'static str },

    /// A station record whose lines are all bus routes.
    #[error("dropped {name:?}: serves only bus routes")]
    BusOnlyRecord { name: String },

    /// A segment endpoint with no matching station alias.
    #[error("segment {from:?} -> {to:?} on {line}: no station named {missing:?}")]
    UnmappableSegment {
        from: String,
        to: String,
        line: String,
        missing: String,
    },

    /// A segment whose endpoints resolve to the same station.
    #[error("segment {from:?} -> {to:?} on {line} starts and ends at one station")]
    SelfLoopSegment {
        from: String,
        to: String,
        line: String,
    },

    /// A line edge that no weight source covers; its weight stays unknown.
    #[error("no weight for {from} -> {to} on {line}")]
    UnmatchedWeight {
        from: String,
        to: String,
        line: String,
    },

    /// A repeated key inside one weight source. Which entry survives is
    /// decided by [`DuplicatePolicy`](crate::config::DuplicatePolicy): the
    /// earlier one, or the smaller weight.
    #[error("weight source {source_name:?} repeats {from} -> {to} on {line}")]
    DuplicateWeight {
        source_name: String,
        from: String,
        to: String,
        line: String,
    },

    /// A weight-source entry naming a station the graph does not know.
    #[error("weight source {source_name:?}: no station named {missing:?}")]
    UnmappableWeight {
        source_name: String,
        missing: String,
    },
}

/// A fatal error that aborts the current pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Two distinct stations normalize to the same key. Fix by growing the
    /// override table.
    #[error("stations {first:?} and {second:?} both normalize to {key:?}")]
    AmbiguousNormalization {
        key: CanonicalKey,
        first: String,
        second: String,
    },

    /// One display name would refer to two stations.
    #[error("alias {alias:?} is claimed by both {first:?} and {second:?}")]
    DuplicateAlias {
        alias: String,
        first: String,
        second: String,
    },

    /// A persisted graph document is missing required structure.
    #[error("corrupt graph document: {0}")]
    StructuralCorruption(String),

    /// Every record of an input was rejected.
    #[error("no valid {0} records")]
    NoValidRecords(&'static str),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
