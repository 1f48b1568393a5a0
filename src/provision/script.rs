//! Download and caching of the Detect shell scripts.

use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};
use url::Url;

use super::InvocationPrefix;
use super::download::{Downloader, ProxyDescriptor};
use crate::error::RsdetectError;
use crate::strategy::Interpreter;

/// Subdirectory of the tools root holding the downloaded scripts.
pub const INSTALL_DIRECTORY: &str = "Detect_Installation";
pub const BASH_SCRIPT_URL: &str = "https://detect.blackduck.com/detect10.sh";
pub const BASH_SCRIPT_NAME: &str = "detect10.sh";
pub const POWERSHELL_SCRIPT_URL: &str = "https://detect.blackduck.com/detect10.ps1";
pub const POWERSHELL_SCRIPT_NAME: &str = "detect10.ps1";

fn script_source(interpreter: Interpreter) -> (&'static str, &'static str) {
    match interpreter {
        Interpreter::Bash => (BASH_SCRIPT_URL, BASH_SCRIPT_NAME),
        Interpreter::PowerShell => (POWERSHELL_SCRIPT_URL, POWERSHELL_SCRIPT_NAME),
    }
}

/// Returns the deterministic cache location of the script for `interpreter`.
pub fn script_path(tools_root: &Utf8Path, interpreter: Interpreter) -> Utf8PathBuf {
    let (_, name) = script_source(interpreter);
    tools_root.join(INSTALL_DIRECTORY).join(name)
}

/// Ensures the Detect script for `interpreter` exists under `tools_root`.
///
/// An existing file is reused without network access. Otherwise the script is
/// downloaded once and moved into place atomically.
///
/// # Errors
///
/// - [`RsdetectError::ArtifactDownload`] if the download fails or is empty
/// - [`RsdetectError::Io`] if the install directory cannot be written
pub fn install_script(
    interpreter: Interpreter,
    tools_root: &Utf8Path,
    proxy: Option<&ProxyDescriptor>,
    downloader: &dyn Downloader,
) -> Result<Utf8PathBuf, RsdetectError> {
    let (url, _) = script_source(interpreter);
    let target = script_path(tools_root, interpreter);

    if target.exists() {
        info!("Detect script already installed at {}", target);
        return Ok(target);
    }

    let install_dir = tools_root.join(INSTALL_DIRECTORY);
    fs::create_dir_all(&install_dir)
        .map_err(|e| RsdetectError::io(format!("failed to create directory: {}", install_dir), e))?;

    info!("downloading Detect script from {} to {}", url, target);
    let download_error = |reason: String| RsdetectError::ArtifactDownload {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| download_error(e.to_string()))?;
    let body = downloader
        .download(&parsed, proxy)
        .map_err(|e| download_error(format!("{:#}", e)))?;
    if body.is_empty() {
        return Err(download_error("empty response body".to_string()));
    }

    let mut staged = tempfile::NamedTempFile::new_in(&install_dir)
        .map_err(|e| {
            RsdetectError::io(format!("failed to create temporary file in {}", install_dir), e)
        })?;
    staged
        .write_all(&body)
        .map_err(|e| RsdetectError::io(format!("failed to write {}", staged.path().display()), e))?;
    #[cfg(unix)]
    if interpreter == Interpreter::Bash {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(0o755))
            .map_err(|e| RsdetectError::io(format!("failed to set permissions on {}", target), e))?;
    }
    staged
        .persist(&target)
        .map_err(|e| {
            RsdetectError::io(format!("failed to move script into place: {}", target), e.error)
        })?;

    debug!("installed {} bytes to {}", body.len(), target);
    Ok(target)
}

/// Builds the invocation prefix for an installed script.
pub fn script_prefix(interpreter: Interpreter, script: &Utf8Path) -> InvocationPrefix {
    match interpreter {
        Interpreter::Bash => InvocationPrefix::new(["bash".to_string(), script.to_string()]),
        Interpreter::PowerShell => InvocationPrefix::new([
            "powershell".to_string(),
            format!("\"Import-Module '{}'; detect\"", script),
        ]),
    }
}
