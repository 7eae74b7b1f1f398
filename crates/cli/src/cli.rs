//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// recmorph - pattern-driven record transformation
#[derive(Parser, Debug)]
#[command(
    name = "recmorph",
    author,
    version,
    about = "Pattern-driven record transformation engine",
    long_about = "Reads a stream of structured records (records, nested entities and \n\
                  name/value literals), routes every value to the rules whose source \n\
                  pattern matches its flattened path, and writes the rule output to \n\
                  the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RECMORPH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (logs go to stderr)
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "RECMORPH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transform an NDJSON event stream with a definition
    Run(RunArgs),

    /// Validate a definition file without running it
    Validate(ValidateArgs),

    /// Display definition information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to definition file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "morph.toml",
        env = "RECMORPH_DEFINITION"
    )]
    pub definition: PathBuf,

    /// NDJSON event input ("-" or absent = stdin)
    #[arg(short, long, env = "RECMORPH_INPUT")]
    pub input: Option<PathBuf>,

    /// Stop after this many records (0 = unlimited)
    #[arg(long, default_value = "0", env = "RECMORPH_MAX_RECORDS")]
    pub max_records: u64,

    /// Override the error policy of the definition
    #[arg(long, value_enum, env = "RECMORPH_ERROR_POLICY")]
    pub error_policy: Option<PolicyArg>,

    /// Skip input lines that are not valid events instead of aborting
    #[arg(long)]
    pub skip_invalid: bool,

    /// Validate the definition and assemble the engine, then exit
    #[arg(long)]
    pub dry_run: bool,

    /// Print run statistics as JSON on stderr
    #[arg(long)]
    pub stats_json: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "RECMORPH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to definition file to validate
    #[arg(short, long, default_value = "morph.toml")]
    pub definition: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to definition file
    #[arg(short, long, default_value = "morph.toml")]
    pub definition: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show rule parameters
    #[arg(long)]
    pub rules: bool,

    /// Load lookup tables and show their sizes
    #[arg(long)]
    pub maps: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Error policy override
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PolicyArg {
    /// Abort on the first stage failure
    Fail,
    /// Log stage failures and continue
    Log,
}

impl From<PolicyArg> for contracts::ErrorPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Fail => Self::Fail,
            PolicyArg::Log => Self::Log,
        }
    }
}
