//! Provisioning of the Detect invocation prefix on the execution node.
//!
//! This module provides:
//! - [`ProvisionRequest`] / [`ProvisionResponse`]: plain serializable messages
//!   exchanged with a (possibly remote) node
//! - [`provision`]: the node-side handler turning a request into an
//!   [`InvocationPrefix`]
//! - [`Downloader`] / [`HttpDownloader`]: script download with proxy support

mod airgap;
mod download;
mod java;
mod script;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use airgap::find_detect_jar;
pub use download::{DOWNLOAD_TIMEOUT, Downloader, HttpDownloader, ProxyDescriptor};
pub use java::resolve_java;
pub use script::{
    BASH_SCRIPT_NAME, BASH_SCRIPT_URL, INSTALL_DIRECTORY, POWERSHELL_SCRIPT_NAME,
    POWERSHELL_SCRIPT_URL, install_script, script_path, script_prefix,
};

use crate::environment::EnvironmentSnapshot;
use crate::error::RsdetectError;
use crate::remote::OsFamily;
use crate::strategy::ExecutionStrategy;

/// Leading argv tokens: interpreter and target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationPrefix(Vec<String>);

impl InvocationPrefix {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    pub fn args(&self) -> &[String] {
        &self.0
    }

    pub fn into_args(self) -> Vec<String> {
        self.0
    }
}

/// Everything the node needs to produce the prefix for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub strategy: ExecutionStrategy,
    /// Build environment, used for java lookup on the node
    pub env: EnvironmentSnapshot,
    /// JDK selected for this build, if any
    pub jdk_home: Option<String>,
    /// Home of the air-gapped installation named by the strategy
    pub installation_home: Option<Utf8PathBuf>,
    /// Root directory for downloaded scripts
    pub tools_root: Utf8PathBuf,
    pub proxy: Option<ProxyDescriptor>,
}

/// A provisioning failure in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProvisionFailure {
    ConfigurationMissing { message: String },
    ArtifactResolution { count: usize, directory: Utf8PathBuf },
    ArtifactDownload { url: String, reason: String },
    Cancelled,
    Other { message: String },
}

impl From<RsdetectError> for ProvisionFailure {
    fn from(err: RsdetectError) -> Self {
        match err {
            RsdetectError::ConfigurationMissing(message) => Self::ConfigurationMissing { message },
            RsdetectError::ArtifactResolution { count, directory } => {
                Self::ArtifactResolution { count, directory }
            }
            RsdetectError::ArtifactDownload { url, reason } => {
                Self::ArtifactDownload { url, reason }
            }
            RsdetectError::Cancelled => Self::Cancelled,
            other => Self::Other {
                message: other.to_string(),
            },
        }
    }
}

impl From<ProvisionFailure> for RsdetectError {
    fn from(failure: ProvisionFailure) -> Self {
        match failure {
            ProvisionFailure::ConfigurationMissing { message } => {
                Self::ConfigurationMissing(message)
            }
            ProvisionFailure::ArtifactResolution { count, directory } => {
                Self::ArtifactResolution { count, directory }
            }
            ProvisionFailure::ArtifactDownload { url, reason } => {
                Self::ArtifactDownload { url, reason }
            }
            ProvisionFailure::Cancelled => Self::Cancelled,
            ProvisionFailure::Other { message } => Self::Unexpected(message),
        }
    }
}

/// Reply to a [`ProvisionRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum ProvisionResponse {
    Ready(InvocationPrefix),
    Failed(ProvisionFailure),
}

impl ProvisionResponse {
    pub fn into_result(self) -> Result<InvocationPrefix, RsdetectError> {
        match self {
            Self::Ready(prefix) => Ok(prefix),
            Self::Failed(failure) => Err(failure.into()),
        }
    }
}

impl From<Result<InvocationPrefix, RsdetectError>> for ProvisionResponse {
    fn from(result: Result<InvocationPrefix, RsdetectError>) -> Self {
        match result {
            Ok(prefix) => Self::Ready(prefix),
            Err(err) => Self::Failed(err.into()),
        }
    }
}

/// Produces the invocation prefix on the node this code runs on.
///
/// # Errors
///
/// - [`RsdetectError::ConfigurationMissing`] if an air-gap request lacks the installation home
/// - [`RsdetectError::ArtifactResolution`] if the installation holds no or several jars
/// - [`RsdetectError::ArtifactDownload`] if the script download fails
pub fn provision(
    request: &ProvisionRequest,
    downloader: &dyn Downloader,
) -> Result<InvocationPrefix, RsdetectError> {
    let os = OsFamily::current();
    match &request.strategy {
        ExecutionStrategy::Jar { jar_path } => {
            let java = resolve_java(request.jdk_home.as_deref(), &request.env, os);
            info!("running Detect jar {} with {}", jar_path, java);
            Ok(InvocationPrefix::new([java, "-jar".to_string(), jar_path.clone()]))
        }
        ExecutionStrategy::AirGapJar { installation_name } => {
            let home = request.installation_home.as_deref().ok_or_else(|| {
                RsdetectError::ConfigurationMissing(format!(
                    "no home directory configured for installation '{}'",
                    installation_name
                ))
            })?;
            let java = resolve_java(request.jdk_home.as_deref(), &request.env, os);
            let jar = find_detect_jar(home)?;
            info!("running air gap Detect jar {} with {}", jar, java);
            Ok(InvocationPrefix::new([java, "-jar".to_string(), jar.into_string()]))
        }
        ExecutionStrategy::Script { interpreter } => {
            let script = install_script(
                *interpreter,
                &request.tools_root,
                request.proxy.as_ref(),
                downloader,
            )?;
            Ok(script_prefix(*interpreter, &script))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_round_trips_to_typed_error() {
        let failure: ProvisionFailure = RsdetectError::ArtifactResolution {
            count: 0,
            directory: Utf8PathBuf::from("/opt/detect"),
        }
        .into();
        let json = serde_json::to_string(&ProvisionResponse::Failed(failure)).unwrap();
        let decoded: ProvisionResponse = serde_json::from_str(&json).unwrap();
        match decoded.into_result() {
            Err(RsdetectError::ArtifactResolution { count, directory }) => {
                assert_eq!(count, 0);
                assert_eq!(directory, "/opt/detect");
            }
            other => panic!("expected ArtifactResolution, got {:?}", other),
        }
    }

    #[test]
    fn test_untyped_failures_become_unexpected() {
        let failure: ProvisionFailure = RsdetectError::Validation("bad".to_string()).into();
        let err: RsdetectError = failure.into();
        assert!(matches!(
            err,
            RsdetectError::Unexpected(msg) if msg == "validation error: bad"
        ));
    }

    #[test]
    fn test_jar_prefix() {
        struct NoDownloads;
        impl Downloader for NoDownloads {
            fn download(
                &self,
                url: &url::Url,
                _: Option<&ProxyDescriptor>,
            ) -> anyhow::Result<Vec<u8>> {
                panic!("unexpected download of {}", url);
            }
        }

        let request = ProvisionRequest {
            strategy: ExecutionStrategy::Jar {
                jar_path: "/tmp/detect.jar".to_string(),
            },
            env: EnvironmentSnapshot::default(),
            jdk_home: Some("/nonexistent/jdk".to_string()),
            installation_home: None,
            tools_root: Utf8PathBuf::from("/nonexistent/tools"),
            proxy: None,
        };
        let prefix = provision(&request, &NoDownloads).unwrap();
        let java = if cfg!(windows) { "java.exe" } else { "java" };
        assert_eq!(
            prefix.args(),
            [
                format!("/nonexistent/jdk/bin/{}", java),
                "-jar".to_string(),
                "/tmp/detect.jar".to_string()
            ]
        );
    }
}
