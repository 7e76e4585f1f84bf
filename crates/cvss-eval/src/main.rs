//! CLI entry point for the CVSS evaluation toolkit.

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use cvss_eval::ai::RetryPolicy;
use cvss_eval::extractor::default_output_path;
use cvss_eval::{
    AnalystConfig, Analyst, Annotator, AnnotatorConfig, Extractor, ExtractorConfig,
    ProgressUpdate, RecordVariant, ReportGenerator, RunReport, Scorer, ScorerConfig,
};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[cfg(feature = "ai")]
use cvss_eval::ai::{AzureConfig, AzureOpenAIProvider, LabelProvider, OpenRouterConfig, OpenRouterProvider};
#[cfg(feature = "ai")]
use std::env;

/// CLI-compatible record variant enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliVariant {
    /// Description only; severity is predicted too
    DescriptionOnly,
    /// Description plus vendor and product
    VendorProduct,
}

impl From<CliVariant> for RecordVariant {
    fn from(cli: CliVariant) -> Self {
        match cli {
            CliVariant::DescriptionOnly => RecordVariant::DescriptionOnly,
            CliVariant::VendorProduct => RecordVariant::VendorProduct,
        }
    }
}

/// CLI-compatible provider enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliProvider {
    /// OpenRouter chat completions (OPENROUTER_API_KEY)
    Openrouter,
    /// Azure OpenAI deployment (AZURE_OPENAI_API_KEY, AZURE_OPENAI_ENDPOINT)
    Azure,
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "CVSS v3.1 label generation and evaluation toolkit",
    long_about = "Batch jobs for studying how well a language model infers CVSS v3.1 base \
                  metrics from vulnerability descriptions.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  OPENROUTER_API_KEY        API key for OpenRouter\n  \
                  AZURE_OPENAI_API_KEY      API key for Azure OpenAI\n  \
                  AZURE_OPENAI_ENDPOINT     Azure OpenAI resource endpoint\n  \
                  AZURE_OPENAI_API_VERSION  Azure OpenAI API version (optional)\n\n\
                  EXAMPLES:\n  \
                  cvss-eval extract -i cves/2023 -o cve_data2023.csv\n  \
                  cvss-eval annotate -i cve_data -o scored --variant vendor-product\n  \
                  cvss-eval score-accuracy -i scored -o results\n  \
                  cvss-eval score-confusion -b runs -f gpt4o,gpt4 -o results\n  \
                  cvss-eval analyze -b all_scraped"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only warnings and errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Write the run report as JSON next to the job's outputs
    #[arg(short = 'r', long, global = true)]
    emit_report: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a directory of CVE JSON documents into one CSV
    Extract(ExtractArgs),
    /// Convert each sub-directory of a folder into cve_data<folder>.csv
    ExtractAll(ExtractAllArgs),
    /// Generate CVSS labels for CSV records with a language model
    Annotate(AnnotateArgs),
    /// Per-field exact-match accuracy over annotated CSVs
    ScoreAccuracy(ScoreAccuracyArgs),
    /// Base-score difference buckets and vector-string matching
    ScoreDiff(ScoreDiffArgs),
    /// Confusion matrices, precision / recall / F1 and ROC-AUC
    ScoreConfusion(ScoreConfusionArgs),
    /// Distributions, description lengths and Cramér's V
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Directory of CVE JSON documents
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV; defaults to <input>.csv next to the input directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "description-only")]
    variant: CliVariant,

    /// Only read JSON files directly inside the input directory
    #[arg(long)]
    no_recursive: bool,
}

#[derive(Args, Debug)]
struct ExtractAllArgs {
    /// Parent directory whose sub-directories hold CVE JSON documents
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for the cve_data<folder>.csv files
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    #[arg(long, value_enum, default_value = "description-only")]
    variant: CliVariant,
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// A CSV file, or a directory of CSV files
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for scored_<name>.csv files
    #[arg(short, long, default_value = "scored")]
    output: PathBuf,

    #[arg(long, value_enum, default_value = "description-only")]
    variant: CliVariant,

    #[arg(long, value_enum, default_value = "openrouter")]
    provider: CliProvider,

    /// Model id (OpenRouter) or deployment name (Azure)
    #[arg(short, long)]
    model: Option<String>,

    /// Records per request
    #[arg(long, default_value = "20")]
    batch_size: usize,

    #[arg(long, default_value = "1000")]
    max_tokens: u32,

    #[arg(long, default_value = "0.2")]
    temperature: f32,

    /// Total attempts per batch when rate limited (at most 20)
    #[arg(long, default_value = "5")]
    max_attempts: u32,

    /// Delay before the first retry, in seconds
    #[arg(long, default_value = "5.0")]
    base_delay: f64,

    /// Also write CVE_<id>_scored.json files into this directory
    #[arg(long)]
    export_json: Option<PathBuf>,

    /// Do not derive Generated Vector String / Generated Score
    #[arg(long)]
    no_derive_scores: bool,
}

#[derive(Args, Debug)]
struct ScoreAccuracyArgs {
    /// Directory of annotated CSV files
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long, default_value = "scoring_results")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ScoreDiffArgs {
    /// Annotated CSV files with scores and vector strings
    #[arg(short, long, num_args = 1.., required = true)]
    input: Vec<PathBuf>,

    #[arg(short, long, default_value = "scoring_results")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ScoreConfusionArgs {
    /// Base directory holding the folders
    #[arg(short, long)]
    base: PathBuf,

    /// Folder names under the base directory, in order
    #[arg(short, long, value_delimiter = ',', required = true)]
    folders: Vec<String>,

    #[arg(short, long, default_value = "scoring_results")]
    output: PathBuf,

    /// Skip the heatmaps and ROC plots
    #[arg(long)]
    no_plots: bool,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Directory searched recursively for CSV files
    #[arg(short, long)]
    base: PathBuf,

    /// Name of the results directory created under the base directory
    #[arg(long, default_value = "analysis_results")]
    output_name: String,

    /// Histogram bins for description lengths
    #[arg(long, default_value = "50")]
    bins: usize,

    /// Missing-description samples to print
    #[arg(long, default_value = "10")]
    sample_limit: usize,

    /// Skip chart rendering
    #[arg(long)]
    no_plots: bool,
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Progress callback that logs each update.
fn log_progress(update: ProgressUpdate) {
    info!(
        "[{:.0}%] {}: {}",
        update.progress * 100.0,
        update.stage.display_name(),
        update.message
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet);

    // Load environment variables from .env file
    dotenv().ok();

    let (report, report_dir) = match &cli.command {
        Command::Extract(args) => run_extract(args, cli.quiet)?,
        Command::ExtractAll(args) => run_extract_all(args, cli.quiet)?,
        Command::Annotate(args) => run_annotate(args, cli.quiet)?,
        Command::ScoreAccuracy(args) => {
            let scorer = build_scorer(&args.output, true, cli.quiet)?;
            let (_, report) = scorer.accuracy(&args.input)?;
            (report, args.output.clone())
        }
        Command::ScoreDiff(args) => {
            let scorer = build_scorer(&args.output, false, cli.quiet)?;
            let (_, report) = scorer.score_diff(&args.input)?;
            (report, args.output.clone())
        }
        Command::ScoreConfusion(args) => {
            let scorer = build_scorer(&args.output, !args.no_plots, cli.quiet)?;
            let (_, report) = scorer.confusion(&args.base, &args.folders)?;
            (report, args.output.clone())
        }
        Command::Analyze(args) => run_analyze(args, cli.quiet)?,
    };

    report.print_summary();

    if cli.emit_report {
        let path = ReportGenerator::new(report_dir).write_run_report(&report)?;
        info!("Run report written to: {}", path.display());
    }

    Ok(())
}

fn run_extract(args: &ExtractArgs, quiet: bool) -> Result<(RunReport, PathBuf)> {
    let config = ExtractorConfig::builder()
        .variant(args.variant.into())
        .recursive(!args.no_recursive)
        .build()?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));

    let report = extractor(config, quiet).extract_dir(&args.input, &output)?;
    Ok((report, parent_dir(&output)))
}

fn run_extract_all(args: &ExtractAllArgs, quiet: bool) -> Result<(RunReport, PathBuf)> {
    let config = ExtractorConfig::builder()
        .variant(args.variant.into())
        .build()?;
    let report = extractor(config, quiet).extract_all(&args.input, &args.output)?;
    Ok((report, args.output.clone()))
}

fn extractor(config: ExtractorConfig, quiet: bool) -> Extractor {
    let extractor = Extractor::new(config);
    if quiet {
        extractor
    } else {
        extractor.with_progress(Arc::new(cvss_eval::ClosureProgressReporter::new(log_progress)))
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn run_annotate(args: &AnnotateArgs, quiet: bool) -> Result<(RunReport, PathBuf)> {
    let mut config_builder = AnnotatorConfig::builder()
        .variant(args.variant.into())
        .batch_size(args.batch_size)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .retry(RetryPolicy {
            max_attempts: args.max_attempts,
            base_delay_secs: args.base_delay,
            ..RetryPolicy::default()
        })
        .derive_scores(!args.no_derive_scores);

    if let Some(ref dir) = args.export_json {
        config_builder = config_builder.export_json_dir(dir);
    }

    let config = config_builder.build()?;
    let annotator = build_annotator(args, config, quiet)?;

    let report = if args.input.is_dir() {
        annotator.process_dir(&args.input, &args.output)?
    } else if args.input.is_file() {
        let output = cvss_eval::annotator::scored_output_path(&args.input, &args.output);
        annotator.annotate_file(&args.input, &output)?
    } else {
        return Err(anyhow!("Input not found: {}", args.input.display()));
    };

    Ok((report, args.output.clone()))
}

/// Build the annotator with the selected provider
#[cfg(feature = "ai")]
fn build_annotator(args: &AnnotateArgs, config: AnnotatorConfig, quiet: bool) -> Result<Annotator> {
    let provider: Arc<dyn LabelProvider> = match args.provider {
        CliProvider::Openrouter => {
            let api_key = env::var("OPENROUTER_API_KEY")
                .map_err(|_| anyhow!("OPENROUTER_API_KEY is not set"))?;
            let mut provider_config = OpenRouterConfig::builder();
            if let Some(ref model) = args.model {
                provider_config = provider_config.model(model);
            }
            Arc::new(OpenRouterProvider::with_config(api_key, provider_config.build())?)
        }
        CliProvider::Azure => {
            let api_key = env::var("AZURE_OPENAI_API_KEY")
                .map_err(|_| anyhow!("AZURE_OPENAI_API_KEY is not set"))?;
            let endpoint = env::var("AZURE_OPENAI_ENDPOINT")
                .map_err(|_| anyhow!("AZURE_OPENAI_ENDPOINT is not set"))?;
            let mut provider_config = AzureConfig::builder(endpoint);
            if let Ok(version) = env::var("AZURE_OPENAI_API_VERSION") {
                provider_config = provider_config.api_version(version);
            }
            if let Some(ref deployment) = args.model {
                provider_config = provider_config.deployment(deployment);
            }
            Arc::new(AzureOpenAIProvider::with_config(api_key, provider_config.build())?)
        }
    };

    let mut builder = Annotator::builder().config(config).provider(provider);
    if !quiet {
        builder = builder.on_progress(log_progress);
    }

    builder.build().map_err(|e| {
        error!("Failed to build annotator: {}", e);
        anyhow!(e)
    })
}

/// Without the `ai` feature there is no provider to annotate with
#[cfg(not(feature = "ai"))]
fn build_annotator(args: &AnnotateArgs, _config: AnnotatorConfig, _quiet: bool) -> Result<Annotator> {
    Err(anyhow!(
        "{:?} provider not compiled in; rebuild with --features ai",
        args.provider
    ))
}

fn build_scorer(output: &Path, render_plots: bool, quiet: bool) -> Result<Scorer> {
    let config = ScorerConfig::builder()
        .output_dir(output)
        .render_plots(render_plots)
        .build()?;
    let scorer = Scorer::new(config);
    Ok(if quiet {
        scorer
    } else {
        scorer.with_progress(Arc::new(cvss_eval::ClosureProgressReporter::new(log_progress)))
    })
}

fn run_analyze(args: &AnalyzeArgs, quiet: bool) -> Result<(RunReport, PathBuf)> {
    let config = AnalystConfig::builder()
        .histogram_bins(args.bins)
        .output_dir_name(&args.output_name)
        .sample_limit(args.sample_limit)
        .render_plots(!args.no_plots)
        .build()?;

    let mut analyst = Analyst::new(config);
    if !quiet {
        analyst =
            analyst.with_progress(Arc::new(cvss_eval::ClosureProgressReporter::new(log_progress)));
    }
    let output_dir = analyst.output_dir(&args.base);
    let (_, report) = analyst.analyze(&args.base)?;
    Ok((report, output_dir))
}
