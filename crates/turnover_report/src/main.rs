//! Employee turnover report CLI
//!
//! Loads an employee table, runs the turnover pipeline, and prints the
//! report as text or JSON.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use turnover_pipeline::{ClassWeight, DatasetCache, PipelineConfig, TurnoverPipeline};
use turnover_report::{build_report, render_text};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "turnover-report")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Employee turnover analysis: statistics, random forest, key drivers")]
#[command(long_about = None)]
struct Args {
    /// Input CSV dataset path (header row required)
    #[arg(short, long)]
    input: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fraction of rows used for training
    #[arg(long)]
    train_ratio: Option<f64>,

    /// Random seed for the split and the forest
    #[arg(long)]
    seed: Option<u64>,

    /// Number of trees
    #[arg(long)]
    trees: Option<usize>,

    /// Maximum tree depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// Class balancing: none, balanced, balanced_subsample
    #[arg(long)]
    class_weight: Option<ClassWeight>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Exit with an error if any section failed or a metric is undefined
    #[arg(long)]
    strict: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(ratio) = args.train_ratio {
        config.split.train_ratio = ratio;
    }
    if let Some(seed) = args.seed {
        config.split.seed = seed;
        config.forest.seed = seed;
    }
    if let Some(trees) = args.trees {
        config.forest.n_estimators = trees;
    }
    if let Some(depth) = args.max_depth {
        config.forest.max_depth = depth;
    }
    if let Some(class_weight) = args.class_weight {
        config.forest.class_weight = class_weight;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    info!("Employee Turnover Report v{}", turnover_report::VERSION);

    let config = load_config(&args)?;
    info!(
        features = config.data.features.len(),
        train_ratio = config.split.train_ratio,
        trees = config.forest.n_estimators,
        max_depth = config.forest.max_depth,
        class_weight = %config.forest.class_weight,
        "configuration ready"
    );

    let mut datasets = DatasetCache::new();
    let dataset = datasets
        .load(&args.input)
        .with_context(|| format!("Failed to load dataset {}", args.input.display()))?;
    info!(
        rows = dataset.len(),
        columns = dataset.column_names().len(),
        fingerprint = dataset.fingerprint(),
        "dataset loaded"
    );

    let mut pipeline = TurnoverPipeline::new(config).context("Failed to create pipeline")?;
    let report = build_report(&dataset, &mut pipeline);

    let rendered = match args.format {
        OutputFormat::Text => render_text(&report).context("Failed to render report")?,
        OutputFormat::Json => {
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        }
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{rendered}"),
    }

    let failed = report.failed_sections();
    if !failed.is_empty() {
        warn!(sections = ?failed, "report rendered with unavailable sections");
    }

    if args.strict {
        if !failed.is_empty() {
            bail!("sections unavailable: {}", failed.join(", "));
        }
        if let Some(model) = report.model.ready() {
            let undefined = model.evaluation.undefined_metrics();
            if !undefined.is_empty() {
                bail!("undefined metrics: {}", undefined.join(", "));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use turnover_pipeline::ForestConfig;

    fn parse(extra: &[&str]) -> Args {
        let argv = ["turnover-report", "--input", "employees.csv"]
            .iter()
            .chain(extra)
            .copied();
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let config = load_config(&parse(&[])).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_seed_flag_sets_split_and_forest() {
        let config = load_config(&parse(&["--seed", "7"])).unwrap();
        assert_eq!(config.split.seed, 7);
        assert_eq!(config.forest.seed, 7);
    }

    #[test]
    fn test_model_flags_override() {
        let args = parse(&[
            "--trees",
            "25",
            "--max-depth",
            "3",
            "--class-weight",
            "balanced",
            "--train-ratio",
            "0.75",
        ]);
        let config = load_config(&args).unwrap();

        assert_eq!(config.forest.n_estimators, 25);
        assert_eq!(config.forest.max_depth, 3);
        assert_eq!(config.forest.class_weight, ClassWeight::Balanced);
        assert_eq!(config.split.train_ratio, 0.75);
    }

    #[test]
    fn test_unknown_class_weight_rejected_by_parser() {
        let argv = ["turnover-report", "--input", "x.csv", "--class-weight", "heavy"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[forest]\nn_estimators = 50\nmax_depth = 4").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = load_config(&parse(&["--config", path.as_str(), "--trees", "10"])).unwrap();
        assert_eq!(config.forest.n_estimators, 10);
        assert_eq!(config.forest.max_depth, 4);
        assert_eq!(config.forest.seed, ForestConfig::default().seed);
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        assert!(load_config(&parse(&["--train-ratio", "1.5"])).is_err());
        assert!(load_config(&parse(&["--trees", "0"])).is_err());
    }
}
