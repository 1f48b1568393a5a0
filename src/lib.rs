pub mod args;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod provision;
pub mod remote;
pub mod strategy;

pub use error::RsdetectError;

use std::sync::Arc;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::cancel::CancellationToken;
use crate::environment::EnvironmentSnapshot;
use crate::executor::CommandExecutor;
use crate::pipeline::{Invocation, Pipeline, ScanOutcome};
use crate::provision::HttpDownloader;
use crate::remote::LocalNode;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Runs one Detect invocation on this machine.
pub fn run_scan(
    opts: &cli::RunArgs,
    launcher: Arc<dyn CommandExecutor>,
    cancel: CancellationToken,
) -> Result<ScanOutcome, RsdetectError> {
    let global = config::load_optional_config(opts.config.as_deref())?;

    let working_dir = match &opts.working_dir {
        Some(dir) => dir.clone(),
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| RsdetectError::io("failed to read current directory", e))?;
            Utf8PathBuf::from_path_buf(cwd).map_err(|p| {
                RsdetectError::Validation(format!(
                    "working directory is not valid UTF-8: {}",
                    p.display()
                ))
            })?
        }
    };

    let invocation = Invocation {
        properties: opts.properties.clone(),
        selection: opts.selection(),
        jdk_home: opts.jdk_home.clone(),
        working_dir,
        log_level: opts.log_level,
    };

    let node = LocalNode::new(Arc::new(HttpDownloader::default()));
    let pipeline = Pipeline::new(global.as_ref(), &node, launcher.as_ref(), cancel);
    pipeline.run(&EnvironmentSnapshot::capture(), &invocation)
}

pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let config = config::load_global_config(&opts.config)
        .with_context(|| format!("failed to load configuration from {}", opts.config))?;
    info!("validation successful:\n{:#?}", config);
    Ok(())
}
