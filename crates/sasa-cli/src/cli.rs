use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "sasaprobe CLI - Solvent-accessible-surface probing of a macromolecule with an external energy evaluator.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate the probe interaction energy at every accessible sample point.
    Run(RunArgs),
}

/// Arguments for the `run` subcommand.
///
/// Structure files, templates and the output file are resolved against the execution
/// directory, which is also the working directory of every evaluator process.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Evaluator ---
    /// Evaluator executable (e.g. `lmp`).
    #[arg(short, long, value_name = "PATH")]
    pub evaluator: Option<PathBuf>,

    /// Command placed before the evaluator, e.g. "mpirun -np 1".
    #[arg(long, value_name = "COMMAND", allow_hyphen_values = true)]
    pub launcher: Option<String>,

    // --- Inputs ---
    /// LAMMPS data file of the macromolecule.
    #[arg(short, long, value_name = "PATH")]
    pub data_file: Option<PathBuf>,

    /// LAMMPS molecule file of the probe.
    #[arg(short, long, value_name = "PATH")]
    pub mol_file: Option<PathBuf>,

    /// Tab-separated file of retained sample points (atom x y z res [angle ax ay az]).
    #[arg(short, long, value_name = "PATH")]
    pub points: Option<PathBuf>,

    // --- Sampling ---
    /// Scale factor applied to atomic radii when sampling probe positions. Must match
    /// the `# probe-radius-scale:` the sample-point file records.
    #[arg(short = 'r', long, value_name = "FLOAT")]
    pub probe_radius_scale: Option<f64>,

    /// Maximum number of sample points kept per atom.
    #[arg(short = 'n', long, value_name = "INT")]
    pub max_samples: Option<usize>,

    // --- Execution ---
    /// Number of evaluator processes run in parallel.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Directory the evaluator runs in.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub execution_dir: Option<PathBuf>,

    /// Result file, relative to the execution directory.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// File with force-field parameter commands, copied to `ff_params.dat`.
    #[arg(long, value_name = "PATH")]
    pub ff_file: Option<PathBuf>,

    /// File with the dump command, copied to `dump_com.dat`.
    #[arg(long, value_name = "PATH")]
    pub dump_file: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S run.workers=8
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
