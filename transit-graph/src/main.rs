use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use transit_graph::analyze::{ConnectivityAnalyzer, ConnectivityReport};
use transit_graph::assemble::Graph;
use transit_graph::config::{DuplicatePolicy, PipelineConfig};
use transit_graph::domain::Mode;
use transit_graph::normalize::NameNormalizer;
use transit_graph::persist;
use transit_graph::error::Issue;
use transit_graph::pipeline::{self, PipelineInput};
use transit_graph::reconcile::{WeightReconciler, WeightSource};
use transit_graph::source::{self, RecordCache, RecordCacheConfig, StopPointClient, StopPointConfig};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "transit-graph: reconcile transit station data into one weighted graph",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Fetch station records from the transport API",
        after_help = "EXAMPLES:\n    transit-graph fetch --mode tube --mode dlr --out stations.json"
    )]
    Fetch(FetchArgs),

    #[command(
        about = "Build a weighted graph from station, segment and weight files",
        after_help = "EXAMPLES:\n    transit-graph build --stations stations.json --segments segments.json \\\n        --weights-dir weights/ --out graph.json"
    )]
    Build(BuildArgs),

    #[command(about = "Apply weight files to an existing graph")]
    Reweight(ReweightArgs),

    #[command(about = "Report connectivity defects in a graph")]
    Validate(ValidateArgs),

    #[command(
        about = "Print the matching key of station names",
        after_help = "EXAMPLES:\n    transit-graph normalize \"Baker Street Underground Station\" \"Baker Street\""
    )]
    Normalize {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Transport mode to fetch; repeat for several.
    #[arg(long = "mode", required = true)]
    modes: Vec<String>,

    #[arg(long)]
    out: PathBuf,

    /// Reuse records fetched within the last day.
    #[arg(long)]
    cache: Option<PathBuf>,

    #[arg(long, default_value_t = 3)]
    max_retries: u32,
}

#[derive(Args, Debug)]
struct Tunables {
    /// Decimal places of the rounded-coordinate identity key.
    #[arg(long, default_value_t = 4)]
    precision: u32,

    /// Distance in metres under which distinct stations form one interchange.
    #[arg(long, default_value_t = 150.0)]
    complex_radius: f64,

    /// Fixed weight of a transfer edge, in minutes.
    #[arg(long, default_value_t = 5.0)]
    transfer_minutes: f64,

    /// Keep the smallest weight when a weight file repeats an edge.
    #[arg(long)]
    min_duplicates: bool,
}

impl Tunables {
    fn config(&self) -> PipelineConfig {
        let policy = if self.min_duplicates {
            DuplicatePolicy::Minimum
        } else {
            DuplicatePolicy::FirstWins
        };
        PipelineConfig::new(self.precision, self.complex_radius, self.transfer_minutes, policy)
    }
}

#[derive(Args, Debug)]
struct BuildArgs {
    #[arg(long)]
    stations: PathBuf,

    #[arg(long)]
    segments: PathBuf,

    /// Weight file, highest priority first; repeat for several.
    #[arg(long)]
    weights: Vec<PathBuf>,

    /// Directory of `<group>_weights.json` files, used after `--weights`.
    #[arg(long)]
    weights_dir: Option<PathBuf>,

    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    tunables: Tunables,
}

#[derive(Args, Debug)]
struct ReweightArgs {
    #[arg(long)]
    graph: PathBuf,

    #[arg(long, required = true)]
    weights: Vec<PathBuf>,

    #[arg(long)]
    out: PathBuf,

    #[arg(long)]
    min_duplicates: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[arg(long)]
    graph: PathBuf,

    /// Also check that every station reachable from this one can get back.
    #[arg(long)]
    from: Option<String>,

    /// Exit non-zero if the graph has isolated or disconnected stations.
    #[arg(long)]
    strict: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TRANSIT_GRAPH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "transit_graph=debug,info"
        } else {
            "transit_graph=info,warn"
        })
    });

    let format = env::var("TRANSIT_GRAPH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch(args) => fetch(args).await,
        Commands::Build(args) => build(args),
        Commands::Reweight(args) => reweight(args),
        Commands::Validate(args) => validate(args),
        Commands::Normalize { names } => {
            normalize(&names);
            Ok(())
        }
    }
}

async fn fetch(args: FetchArgs) -> anyhow::Result<()> {
    let modes: Vec<Mode> = args.modes.iter().map(|m| Mode::parse(m)).collect();

    let config = StopPointConfig::from_env().with_max_retries(args.max_retries);
    if config.app_key.is_none() {
        warn!("TFL_APP_KEY not set; requests are rate limited");
    }
    let client = StopPointClient::new(config).context("failed to create API client")?;
    let cache = args.cache.map(|path| RecordCache::new(RecordCacheConfig::new(path)));

    let records = source::fetch_with_cache(&client, cache.as_ref(), &modes)
        .await
        .context("failed to fetch station records")?;
    persist::write_station_records(&args.out, &records)?;

    println!("Wrote {} station records to {}", records.len(), args.out.display());
    Ok(())
}

/// Read weight files in order, with the rows skipped while decoding them.
fn read_weight_files(paths: &[PathBuf]) -> anyhow::Result<(Vec<WeightSource>, Vec<Issue>)> {
    let mut sources = Vec::with_capacity(paths.len());
    let mut skipped = Vec::new();
    for path in paths {
        let name = weight_source_name(path);
        let (source, issues) = persist::read_weight_source(path, name)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if !issues.is_empty() {
            warn!(source = %source.name, skipped = issues.len(), "weight rows skipped");
        }
        sources.push(source);
        skipped.extend(issues);
    }
    Ok((sources, skipped))
}

/// `tube_weights.json` → `tube`.
fn weight_source_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.strip_suffix("_weights").map(str::to_string).unwrap_or(stem)
}

fn build(args: BuildArgs) -> anyhow::Result<()> {
    let config = args.tunables.config();

    let stations = persist::read_station_records(&args.stations)
        .with_context(|| format!("failed to read {}", args.stations.display()))?;
    let segments = persist::read_segments(&args.segments)
        .with_context(|| format!("failed to read {}", args.segments.display()))?;

    let (mut sources, mut weight_issues) = read_weight_files(&args.weights)?;
    if let Some(dir) = &args.weights_dir {
        let (found, issues) = persist::load_weight_sources(dir)?;
        if !issues.is_empty() {
            warn!(skipped = issues.len(), "weight rows skipped");
        }
        sources.extend(found);
        weight_issues.extend(issues);
    }

    let input = PipelineInput {
        stations,
        segments,
        weight_sources: sources,
        weight_issues,
    };
    let output = pipeline::run_input(&config, input)?;
    persist::write_graph(&args.out, &output.graph)?;

    println!(
        "Built {} stations and {} edges, {} of them transfers ({} merged, {} rejected segments, {} edges without weight)",
        output.graph.station_count(),
        output.graph.edge_count(),
        output.graph.transfer_count(),
        output.resolution.merged,
        output.assembly.rejected(),
        output.weights.unmatched,
    );
    println!(
        "{} issues: {} station, {} segment, {} weight",
        output.issue_count(),
        output.resolution.issues.len(),
        output.assembly.issues.len(),
        output.weights.issues.len(),
    );
    print_connectivity(&output.graph, &output.connectivity);
    Ok(())
}

fn reweight(args: ReweightArgs) -> anyhow::Result<()> {
    let mut graph = persist::read_graph(&args.graph, &NameNormalizer::default())
        .with_context(|| format!("failed to load {}", args.graph.display()))?;
    let (sources, skipped) = read_weight_files(&args.weights)?;

    let policy = if args.min_duplicates {
        DuplicatePolicy::Minimum
    } else {
        DuplicatePolicy::FirstWins
    };
    let summary = WeightReconciler::new(policy).reconcile(&mut graph, &sources);
    persist::write_graph(&args.out, &graph)?;

    for source in &summary.sources {
        println!("{:>16}: {} edges", source.name, source.matched);
    }
    println!("{:>16}: {} edges", "unknown", summary.unmatched);
    let rejected_rows = summary
        .issues
        .iter()
        .filter(|issue| !matches!(issue, Issue::UnmatchedWeight { .. }))
        .count();
    println!("{:>16}: {} rows", "skipped", skipped.len() + rejected_rows);
    Ok(())
}

fn validate(args: ValidateArgs) -> anyhow::Result<()> {
    let graph = persist::read_graph(&args.graph, &NameNormalizer::default())
        .with_context(|| format!("failed to load {}", args.graph.display()))?;
    let analyzer = ConnectivityAnalyzer::new(&graph);
    let report = analyzer.analyze();
    print_connectivity(&graph, &report);

    if let Some(name) = &args.from {
        let Some(station) = graph.lookup(name) else {
            bail!("no station named {name:?}");
        };
        if let Some(reach) = analyzer.reachability(station) {
            let asymmetric = reach.asymmetric();
            println!(
                "From {name}: reaches {}, reached by {}",
                reach.forward.len(),
                reach.backward.len()
            );
            for idx in &asymmetric {
                println!("  no way back from {}", graph.station_name(*idx));
            }
        }
    }

    if args.strict && (!report.isolated.is_empty() || !report.is_connected()) {
        bail!("graph has {} disconnected stations", report.disconnected.len());
    }
    info!("validation complete");
    Ok(())
}

fn print_connectivity(graph: &Graph, report: &ConnectivityReport) {
    println!(
        "{} components; main component has {} of {} stations",
        report.components.len(),
        report.main_component().len(),
        report.stations
    );
    for idx in &report.isolated {
        println!("  isolated: {}", graph.station_name(*idx));
    }
    for idx in &report.disconnected {
        if !report.isolated.contains(idx) {
            println!("  disconnected: {}", graph.station_name(*idx));
        }
    }
    for key in &report.one_way {
        println!(
            "  one-way: {} -> {} on {}",
            graph.station_name(key.source),
            graph.station_name(key.target),
            key.line
        );
    }
}

fn normalize(names: &[String]) {
    let normalizer = NameNormalizer::default();
    for name in names {
        println!("{name}\t{}", normalizer.normalize(name));
    }

    let collisions = normalizer.collisions(names.iter().map(String::as_str));
    for collision in &collisions {
        println!("{} <- {}", collision.key, collision.names.join(" | "));
    }
}
