use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Mesoatlas Developers",
    version,
    about = "Atlas CLI - Classify, score, catalog and gap-fill molecular simulations driven by an external engine.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Options shared by every command that touches configuration or the output root.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Output root holding the catalog, coverage and failure reports.
    /// Defaults to the configured data directory.
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S scoring.weights.k-charge=1.5
    #[arg(short = 'S', long = "set", global = true, value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the classification labels of a molecular formula.
    Classify(ClassifyArgs),
    /// Compute the priority score of a formula under the configured weights.
    Score(ScoreArgs),
    /// Catalog a finished simulation from its structure and diagnostics.
    Record(RecordArgs),
    /// List the under-sampled or inconsistent cells of the coverage grid.
    Gaps(GapsArgs),
    /// Run a batch of simulations targeting the coverage gaps.
    Fill(FillArgs),
    /// Summarize the catalog, optionally exporting it as CSV.
    Report(ReportArgs),
    /// Check catalog invariants, optionally rescoring under alternative weights.
    Check(CheckArgs),
    /// Manage the default output root directory.
    Data(DataArgs),
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Molecular formula, e.g. C7H5N3O6.
    #[arg(required = true)]
    pub formula: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthArg {
    Converged,
    Bounded,
    Exploded,
    Invalid,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Molecular formula, e.g. H2O.
    #[arg(required = true)]
    pub formula: String,

    /// Total charge of the system.
    #[arg(long, default_value_t = 0.0, value_name = "FLOAT", allow_hyphen_values = true)]
    pub charge: f64,

    /// Health band of the simulation outcome.
    #[arg(long, value_enum, default_value = "converged")]
    pub health: HealthArg,

    /// The simulation reported convergence.
    #[arg(long)]
    pub converged: bool,

    /// The simulation stayed bounded.
    #[arg(long)]
    pub bounded: bool,

    /// Use the long-range cost model (N^2) instead of N^1.5.
    #[arg(long)]
    pub long_range: bool,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// XYZ file holding the final structure.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub structure: PathBuf,

    /// Diagnostics text printed by the engine.
    #[arg(short, long, value_name = "PATH")]
    pub diagnostics: Option<PathBuf>,

    /// Label stored as the card's generation method.
    #[arg(short, long, value_name = "NAME")]
    pub method: Option<String>,

    /// Skip the compound database and answer from the cache only.
    #[arg(long)]
    pub offline: bool,
}

#[derive(Args, Debug)]
pub struct GapsArgs {
    /// Maximum number of gaps to print.
    #[arg(short, long, value_name = "INT")]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct FillArgs {
    /// Number of simulations to schedule.
    #[arg(short = 'n', long, required = true, value_name = "INT")]
    pub runs: usize,

    /// Maximum number of concurrent engine processes.
    #[arg(long, value_name = "INT")]
    pub jobs: Option<usize>,

    /// Per-run wall-clock limit in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to the simulation engine executable.
    #[arg(long, value_name = "PATH")]
    pub engine: Option<PathBuf>,

    /// Number of simulation steps per run.
    #[arg(long, value_name = "INT")]
    pub steps: Option<u32>,

    /// Skip the compound database and answer from the cache only.
    #[arg(long)]
    pub offline: bool,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Export the cards index as CSV to this path.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Number of top-scoring cards to list.
    #[arg(long, default_value_t = 10, value_name = "INT")]
    pub top: usize,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// TOML file with alternative `[scoring]` settings to rescore the catalog under.
    #[arg(long, value_name = "PATH")]
    pub weights: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DataArgs {
    #[command(subcommand)]
    pub command: DataCommands,
}

#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Show the absolute path to the default output root.
    Path,
    /// Set a custom absolute path for the default output root.
    SetPath {
        /// The new path to use as output root.
        #[arg(required = true)]
        path: PathBuf,
    },
    /// Reset the output root to its default, OS-specific location.
    ResetPath,
}
