use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::strategy::{DownloadStrategy, StrategySelection};

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision Detect and run it with the given properties
    Run(RunArgs),

    /// Validate the global configuration file
    Validate(ValidateArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the global configuration file (defaults to ./rsdetect.yaml if present)
    #[arg(short, long)]
    pub config: Option<Utf8PathBuf>,

    /// Detect properties, written as on a command line (e.g. `--a=1 --b="x y"`)
    #[arg(short, long, default_value = "")]
    pub properties: String,

    /// How to obtain Detect
    #[arg(long, value_enum, default_value = "inherit")]
    pub strategy: StrategyArg,

    /// Tool installation used by the air-gap strategy
    #[arg(long, required_if_eq("strategy", "air-gap"))]
    pub installation: Option<String>,

    /// JDK home used to run a Detect jar
    #[arg(long)]
    pub jdk_home: Option<String>,

    /// Working directory for the scan (defaults to the current directory)
    #[arg(short = 'w', long)]
    pub working_dir: Option<Utf8PathBuf>,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Resolve and assemble the command without running it
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Converts the strategy flags into a selection.
    pub fn selection(&self) -> StrategySelection {
        match self.strategy {
            StrategyArg::Inherit => StrategySelection::Inherit,
            StrategyArg::Script => StrategySelection::Explicit(DownloadStrategy::Script),
            StrategyArg::AirGap => StrategySelection::Explicit(DownloadStrategy::AirGap {
                installation: self.installation.clone().unwrap_or_default(),
            }),
        }
    }
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the global configuration file
    #[arg(short, long, default_value = "rsdetect.yaml")]
    pub config: Utf8PathBuf,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

/// Download strategy as selected on the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Use the global configuration
    Inherit,
    /// Download the Detect script
    Script,
    /// Use the jar of a local tool installation
    AirGap,
}

/// Represents log levels for controlling the verbosity of logging output.
///
/// This enum maps directly to the log levels used by the `tracing` crate and
/// is also forwarded to Detect as its default log level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The matching Detect log level name.
    pub fn detect_level(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

pub fn parse_args() -> Result<Cli> {
    Ok(Cli::parse())
}
