//! Execution strategy resolution.
//!
//! Decides how Detect is invoked before anything is downloaded or spawned:
//! a user-provided jar wins, then the caller's download strategy, then the
//! global configuration, then the built-in default (the script).

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::info;

use crate::args::Escaper;
use crate::cancel::CancellationToken;
use crate::config::GlobalConfig;
use crate::environment::{self, EnvironmentSnapshot};
use crate::error::RsdetectError;
use crate::remote::{OsFamily, RemoteExecutionPort};

/// Shell used to run the Detect script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Interpreter {
    Bash,
    PowerShell,
}

impl Interpreter {
    /// PowerShell on Windows nodes, Bash everywhere else.
    pub fn for_os(os: OsFamily) -> Self {
        match os {
            OsFamily::Windows => Self::PowerShell,
            OsFamily::Unix => Self::Bash,
        }
    }
}

/// How Detect is obtained, as configured by the caller or globally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum DownloadStrategy {
    /// Download the Detect script on demand.
    #[default]
    Script,
    /// Run the jar shipped with a local tool installation.
    AirGap { installation: String },
}

/// The caller's choice of download strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StrategySelection {
    /// Defer to the global configuration.
    #[default]
    Inherit,
    /// Use the given strategy.
    Explicit(DownloadStrategy),
}

/// Where the adopted download strategy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StrategySource {
    /// Chosen by the caller for this invocation.
    Configured,
    /// Taken from the global configuration.
    System,
    /// Built-in fallback.
    Default,
}

/// The resolved way of invoking Detect for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Run a user-provided jar.
    Jar { jar_path: String },
    /// Run the jar found in an air-gapped tool installation.
    AirGapJar { installation_name: String },
    /// Download and run the Detect script.
    Script { interpreter: Interpreter },
}

impl ExecutionStrategy {
    /// Returns the escaper matching how arguments will be re-parsed.
    ///
    /// When escaping is disabled every strategy uses [`Escaper::Identity`].
    pub fn escaper(&self, escaping_enabled: bool) -> Escaper {
        if !escaping_enabled {
            return Escaper::Identity;
        }
        match self {
            Self::Jar { .. } | Self::AirGapJar { .. } => Escaper::Identity,
            Self::Script {
                interpreter: Interpreter::Bash,
            } => Escaper::Posix,
            Self::Script {
                interpreter: Interpreter::PowerShell,
            } => Escaper::PowerShell,
        }
    }
}

/// Picks the download strategy from the caller's selection and the global configuration.
///
/// # Errors
///
/// Returns [`RsdetectError::ConfigurationMissing`] if the selection is
/// [`StrategySelection::Inherit`] and no global configuration exists.
pub fn adopt_download_strategy(
    selection: &StrategySelection,
    global: Option<&GlobalConfig>,
) -> Result<(DownloadStrategy, StrategySource), RsdetectError> {
    match selection {
        StrategySelection::Explicit(strategy) => Ok((strategy.clone(), StrategySource::Configured)),
        StrategySelection::Inherit => {
            let global = global.ok_or_else(|| {
                RsdetectError::ConfigurationMissing(
                    "download strategy is set to inherit but no global configuration is available"
                        .to_string(),
                )
            })?;
            Ok(match &global.download_strategy {
                Some(strategy) => (strategy.clone(), StrategySource::System),
                None => (DownloadStrategy::default(), StrategySource::Default),
            })
        }
    }
}

/// Resolves the execution strategy for one invocation.
///
/// Only a script strategy touches the execution node, to learn its OS family.
///
/// # Errors
///
/// - [`RsdetectError::ConfigurationMissing`] if nothing resolves or an air-gap
///   strategy names no installation
/// - [`RsdetectError::Cancelled`] if interrupted while querying the node
pub fn resolve(
    env: &EnvironmentSnapshot,
    selection: &StrategySelection,
    global: Option<&GlobalConfig>,
    node: &dyn RemoteExecutionPort,
    cancel: &CancellationToken,
) -> Result<ExecutionStrategy, RsdetectError> {
    if let Some(jar_path) = env.get_non_blank(environment::DETECT_JAR) {
        info!("{} is set, running the jar at {}", environment::DETECT_JAR, jar_path);
        return Ok(ExecutionStrategy::Jar {
            jar_path: jar_path.trim().to_string(),
        });
    }

    let (strategy, source) = adopt_download_strategy(selection, global)?;
    info!("using {} download strategy: {:?}", source, strategy);

    match strategy {
        DownloadStrategy::AirGap { installation } => {
            if installation.trim().is_empty() {
                return Err(RsdetectError::ConfigurationMissing(
                    "air gap download strategy requires an installation name".to_string(),
                ));
            }
            Ok(ExecutionStrategy::AirGapJar {
                installation_name: installation,
            })
        }
        DownloadStrategy::Script => {
            let os = node.os_family(cancel)?;
            Ok(ExecutionStrategy::Script {
                interpreter: Interpreter::for_os(os),
            })
        }
    }
}
