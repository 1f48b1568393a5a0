use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::CommandFactory;
use tracing::error;

use rsdetect::cancel::CancellationToken;
use rsdetect::cli::{self, Commands};
use rsdetect::executor::RealCommandExecutor;

/// Exit code reported when the invocation was interrupted.
const EXIT_CANCELLED: u8 = 130;

fn main() -> Result<ExitCode> {
    let args = cli::parse_args()?;

    let log_level = match &args.command {
        Commands::Run(opts) => opts.log_level,
        Commands::Validate(opts) => opts.log_level,
        Commands::Completions(opts) => {
            let mut cmd = cli::Cli::command();
            let name = env!("CARGO_PKG_NAME");
            clap_complete::generate(opts.shell, &mut cmd, name, &mut std::io::stdout());
            return Ok(ExitCode::SUCCESS);
        }
    };

    rsdetect::init_logging(log_level)?;

    match &args.command {
        Commands::Run(opts) => {
            let cancel = CancellationToken::new();
            cancel.register_signals()?;
            let executor = Arc::new(RealCommandExecutor {
                dry_run: opts.dry_run,
            });
            match rsdetect::run_scan(opts, executor, cancel) {
                Ok(outcome) => {
                    let code = outcome.exit_code.unwrap_or(0);
                    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
                }
                Err(e) if e.is_cancelled() => {
                    error!("build aborted: {}", e);
                    Ok(ExitCode::from(EXIT_CANCELLED))
                }
                Err(e) => {
                    error!("build failed: {}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Validate(opts) => {
            rsdetect::run_validate(opts)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions(_) => Ok(ExitCode::SUCCESS),
    }
}
