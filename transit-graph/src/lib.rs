//! Transit network reconciliation.
//!
//! Turns raw station and line-segment records from several sources into one
//! consistent, weighted station graph: names are normalized, duplicate
//! stations merged, edges assembled, travel times attached from prioritized
//! weight tables, and the result checked for connectivity defects.

pub mod analyze;
pub mod assemble;
pub mod config;
pub mod domain;
pub mod error;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod reconcile;
pub mod resolve;
pub mod source;
