//! Runs the reconciliation stages in order.
//!
//! resolve, assemble, reconcile, analyze. A fatal error in any stage
//! stops the run before the next stage starts.

use tracing::info;

use crate::analyze::{ConnectivityReport, analyze};
use crate::assemble::{Assembly, AssemblyReport, Graph, GraphAssembler};
use crate::config::PipelineConfig;
use crate::domain::{RawSegment, RawStationRecord};
use crate::error::{Issue, PipelineError};
use crate::normalize::NameNormalizer;
use crate::persist::Parsed;
use crate::reconcile::{ReconcileSummary, WeightReconciler, WeightSource};
use crate::resolve::{IdentityResolver, ResolutionReport};

/// Decoded input files, with the items that could not be decoded.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub stations: Parsed<RawStationRecord>,
    pub segments: Parsed<RawSegment>,
    /// Weight sources, highest priority first.
    pub weight_sources: Vec<WeightSource>,
    /// Weight rows skipped while decoding the sources.
    pub weight_issues: Vec<Issue>,
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub graph: Graph,
    pub resolution: ResolutionReport,
    pub assembly: AssemblyReport,
    pub weights: ReconcileSummary,
    pub connectivity: ConnectivityReport,
}

impl PipelineOutput {
    /// Total stage-local issues across all stages.
    pub fn issue_count(&self) -> usize {
        self.resolution.issues.len() + self.assembly.issues.len() + self.weights.issues.len()
    }
}

/// Build, weight and check a graph from raw inputs using the default
/// normalizer.
pub fn run(
    config: &PipelineConfig,
    stations: Vec<RawStationRecord>,
    segments: &[RawSegment],
    weight_sources: &[WeightSource],
) -> Result<PipelineOutput, PipelineError> {
    run_with(config, NameNormalizer::default(), stations, segments, weight_sources)
}

/// Like [`run`], with a custom normalizer.
pub fn run_with(
    config: &PipelineConfig,
    normalizer: NameNormalizer,
    stations: Vec<RawStationRecord>,
    segments: &[RawSegment],
    weight_sources: &[WeightSource],
) -> Result<PipelineOutput, PipelineError> {
    let output = run_stages(config, normalizer, stations, segments, weight_sources)?;
    log_summary(&output);
    Ok(output)
}

/// Like [`run`], for decoded files. Items skipped while decoding are
/// reported by the stage that consumes their input, ahead of that stage's
/// own issues.
pub fn run_input(config: &PipelineConfig, input: PipelineInput) -> Result<PipelineOutput, PipelineError> {
    let PipelineInput {
        stations,
        segments,
        weight_sources,
        weight_issues,
    } = input;

    let mut output = run_stages(
        config,
        NameNormalizer::default(),
        stations.items,
        &segments.items,
        &weight_sources,
    )?;

    output.resolution.records_in += stations.issues.len();
    prepend(&mut output.resolution.issues, stations.issues);
    output.assembly.segments_in += segments.issues.len();
    prepend(&mut output.assembly.issues, segments.issues);
    prepend(&mut output.weights.issues, weight_issues);

    log_summary(&output);
    Ok(output)
}

fn run_stages(
    config: &PipelineConfig,
    normalizer: NameNormalizer,
    stations: Vec<RawStationRecord>,
    segments: &[RawSegment],
    weight_sources: &[WeightSource],
) -> Result<PipelineOutput, PipelineError> {
    let resolution = IdentityResolver::new(config)
        .with_normalizer(normalizer)
        .resolve(stations)?;

    let Assembly {
        mut graph,
        report: assembly,
    } = GraphAssembler::new(config).assemble(resolution.stations, segments);

    let weights = WeightReconciler::new(config.duplicate_policy).reconcile(&mut graph, weight_sources);
    let connectivity = analyze(&graph);

    Ok(PipelineOutput {
        graph,
        resolution: resolution.report,
        assembly,
        weights,
        connectivity,
    })
}

fn prepend(issues: &mut Vec<Issue>, mut earlier: Vec<Issue>) {
    earlier.append(issues);
    *issues = earlier;
}

fn log_summary(output: &PipelineOutput) {
    info!(
        stations = output.graph.station_count(),
        edges = output.graph.edge_count(),
        issues = output.issue_count(),
        "pipeline complete"
    );
}
