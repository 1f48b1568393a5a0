//! Invocation pipeline.
//!
//! Runs the four stages of one Detect invocation in order:
//!
//! 1. **Resolve**: pick the execution strategy
//! 2. **Provision**: obtain the invocation prefix on the execution node
//! 3. **Assemble**: build the escaped argv and its redacted log line
//! 4. **Launch**: run the command and report its exit code
//!
//! Any error aborts the invocation; nothing is spawned unless stages 1-3 succeed.

use camino::Utf8PathBuf;
use tracing::{debug, info, info_span, warn};

use crate::args::{self, AutoProperties};
use crate::cancel::CancellationToken;
use crate::cli::LogLevel;
use crate::config::GlobalConfig;
use crate::environment::{self, EnvironmentSnapshot};
use crate::error::RsdetectError;
use crate::executor::{CommandExecutor, CommandSpec};
use crate::provision::ProvisionRequest;
use crate::remote::RemoteExecutionPort;
use crate::strategy::{self, ExecutionStrategy, StrategySelection};

/// Subdirectory of the working directory used for scripts when no global
/// configuration names a tools directory.
const FALLBACK_TOOLS_DIR: &str = ".rsdetect/tools";

/// Per-invocation inputs supplied by the caller.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Raw Detect property string
    pub properties: String,
    pub selection: StrategySelection,
    /// JDK selected for this build, if any
    pub jdk_home: Option<String>,
    pub working_dir: Utf8PathBuf,
    /// The caller's log level, forwarded to Detect unless overridden
    pub log_level: LogLevel,
}

/// How the scanner process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Exit code, or `None` when nothing was run (dry run)
    pub exit_code: Option<i32>,
}

impl ScanOutcome {
    /// Returns true when the scanner reported success or was not run.
    pub fn success(&self) -> bool {
        self.exit_code.is_none_or(|code| code == 0)
    }
}

/// Orchestrates a single invocation against explicit collaborators.
///
/// The global configuration is passed in rather than read from shared state,
/// and is not modified.
pub struct Pipeline<'a> {
    global: Option<&'a GlobalConfig>,
    node: &'a dyn RemoteExecutionPort,
    launcher: &'a dyn CommandExecutor,
    cancel: CancellationToken,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        global: Option<&'a GlobalConfig>,
        node: &'a dyn RemoteExecutionPort,
        launcher: &'a dyn CommandExecutor,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            global,
            node,
            launcher,
            cancel,
        }
    }

    /// Runs the invocation against the captured environment.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of any stage. A non-zero exit code is
    /// not an error; it is reported in [`ScanOutcome`].
    pub fn run(
        &self,
        env: &EnvironmentSnapshot,
        invocation: &Invocation,
    ) -> Result<ScanOutcome, RsdetectError> {
        let span = info_span!("invocation", id = %uuid::Uuid::new_v4());
        let _enter = span.enter();

        debug!(
            "PATH on the orchestrator: {}",
            env.get(environment::PATH).unwrap_or_default()
        );

        let strategy =
            strategy::resolve(env, &invocation.selection, self.global, self.node, &self.cancel)?;
        debug!("resolved execution strategy: {:?}", strategy);

        let request = self.provision_request(&strategy, env, invocation)?;
        let prefix = self.node.provision(&request, &self.cancel)?;

        let escaping_enabled = env.flag(environment::DETECT_SHOULD_ESCAPE, true);
        if !escaping_enabled {
            info!("{} is false, arguments will not be escaped", environment::DETECT_SHOULD_ESCAPE);
        }
        let auto = AutoProperties {
            log_level: invocation.log_level.detect_level().to_string(),
            platform_version: self.global.and_then(|g| g.platform_version.clone()),
            plugin_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        };
        let assembly = args::assemble(
            prefix,
            &invocation.properties,
            env,
            strategy.escaper(escaping_enabled),
            &auto,
            true,
        )?;
        info!("Running Detect command: {}", assembly.log_line());

        let child_env = match self.global {
            Some(global) => env.with_defaults(global.child_environment()),
            None => env.clone(),
        };

        let mut argv = assembly.argv().into_iter();
        let command = argv.next().ok_or_else(|| {
            RsdetectError::Unexpected("provisioning returned an empty prefix".to_string())
        })?;
        let spec = CommandSpec::new(command, argv.collect())
            .with_cwd(invocation.working_dir.clone())
            .with_envs(child_env.iter())
            .with_clear_env();

        if self.cancel.is_cancelled() {
            return Err(RsdetectError::Cancelled);
        }

        let result = self
            .launcher
            .execute(&spec, &self.cancel)
            .map_err(RsdetectError::from_anyhow)?;

        let exit_code = match result.status {
            None => None,
            Some(status) => Some(status.code().ok_or_else(|| RsdetectError::Execution {
                command: spec.command.clone(),
                status: format!("terminated without an exit code: {}", status),
            })?),
        };

        match exit_code {
            Some(0) => info!("Detect finished successfully"),
            Some(code) => warn!("Detect exited with code {}", code),
            None => info!("dry run, Detect was not started"),
        }

        Ok(ScanOutcome { exit_code })
    }

    fn provision_request(
        &self,
        strategy: &ExecutionStrategy,
        env: &EnvironmentSnapshot,
        invocation: &Invocation,
    ) -> Result<ProvisionRequest, RsdetectError> {
        let installation_home = match strategy {
            ExecutionStrategy::AirGapJar { installation_name } => Some(
                self.global
                    .and_then(|g| g.installation_home(installation_name))
                    .map(|home| home.to_path_buf())
                    .ok_or_else(|| {
                        RsdetectError::ConfigurationMissing(format!(
                            "installation '{}' is not configured",
                            installation_name
                        ))
                    })?,
            ),
            _ => None,
        };

        let tools_root = self
            .global
            .map(|g| g.tools_dir.clone())
            .unwrap_or_else(|| invocation.working_dir.join(FALLBACK_TOOLS_DIR));

        Ok(ProvisionRequest {
            strategy: strategy.clone(),
            env: env.clone(),
            jdk_home: invocation.jdk_home.clone(),
            installation_home,
            tools_root,
            proxy: self.global.and_then(GlobalConfig::proxy_descriptor),
        })
    }
}
