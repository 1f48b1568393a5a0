//! Global configuration loading.
//!
//! The global configuration is read once per invocation from a YAML file and
//! passed explicitly to the strategy resolver and the provisioner. It holds
//! the server connection, the default download strategy, the tools directory,
//! air-gapped tool installations, proxy settings and the credentials they
//! refer to.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::RsdetectError;
use crate::provision::ProxyDescriptor;
use crate::strategy::DownloadStrategy;

/// Default file name looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "rsdetect.yaml";

fn default_tools_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("tools")
}

fn default_timeout() -> u64 {
    120
}

/// A stored secret.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    /// An API token.
    Token { token: String },
    /// A username and password pair.
    UsernamePassword { username: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token { .. } => f.write_str("Token(********)"),
            Self::UsernamePassword { username, .. } => {
                write!(f, "UsernamePassword({}, ********)", username)
            }
        }
    }
}

/// Looks up credentials by id.
pub trait CredentialLookup {
    /// Returns the credentials registered under `id`, if any.
    fn lookup(&self, id: &str) -> Option<&Credentials>;
}

/// Connection settings for the scan server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Server URL
    pub url: Url,
    /// Credentials id (token or username/password)
    #[serde(default)]
    pub credentials: Option<String>,
    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Trust the server certificate without verification
    #[serde(default)]
    pub trust_cert: bool,
}

/// Proxy used for the script download and handed to the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    /// Credentials id (username/password)
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub ntlm_domain: Option<String>,
    #[serde(default)]
    pub ntlm_workstation: Option<String>,
    /// Host patterns that bypass the proxy, separated by whitespace, `,` or `|`
    #[serde(default)]
    pub no_proxy_hosts: String,
}

/// A locally installed, air-gapped Detect distribution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolInstallation {
    pub name: String,
    pub home: Utf8PathBuf,
}

/// Global configuration shared by every invocation on this controller.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    #[serde(default)]
    pub server: Option<ServerConfig>,
    /// System-wide download strategy. Absent means the built-in default.
    #[serde(default)]
    pub download_strategy: Option<DownloadStrategy>,
    /// Root directory for downloaded scripts
    #[serde(default = "default_tools_dir")]
    pub tools_dir: Utf8PathBuf,
    #[serde(default)]
    pub installations: Vec<ToolInstallation>,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub credentials: BTreeMap<String, Credentials>,
    /// Version of the CI platform, reported through telemetry
    #[serde(default)]
    pub platform_version: Option<String>,
}

impl CredentialLookup for GlobalConfig {
    fn lookup(&self, id: &str) -> Option<&Credentials> {
        self.credentials.get(id)
    }
}

impl GlobalConfig {
    /// Resolves relative paths relative to the given base directory.
    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        if self.tools_dir.is_relative() {
            self.tools_dir = base_dir.join(&self.tools_dir);
        }
        for installation in &mut self.installations {
            if installation.home.is_relative() {
                installation.home = base_dir.join(&installation.home);
            }
        }
    }

    /// Returns the home directory of the named installation.
    pub fn installation_home(&self, name: &str) -> Option<&Utf8Path> {
        self.installations
            .iter()
            .find(|i| i.name == name)
            .map(|i| i.home.as_path())
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - Referenced credential ids exist, with username/password for the proxy
    /// - Installation names are non-blank and unique
    /// - An air-gap download strategy names a configured installation
    /// - The proxy host is non-blank and the port is non-zero
    pub fn validate(&self) -> Result<(), RsdetectError> {
        if let Some(server) = &self.server
            && let Some(id) = &server.credentials
            && self.lookup(id).is_none()
        {
            return Err(RsdetectError::Validation(format!(
                "server credentials '{}' are not defined",
                id
            )));
        }

        let mut names = HashSet::new();
        for installation in &self.installations {
            if installation.name.trim().is_empty() {
                return Err(RsdetectError::Validation(
                    "installation name must not be empty".to_string(),
                ));
            }
            if !names.insert(installation.name.as_str()) {
                return Err(RsdetectError::Validation(format!(
                    "duplicate installation name '{}'",
                    installation.name
                )));
            }
        }

        if let Some(DownloadStrategy::AirGap { installation }) = &self.download_strategy
            && self.installation_home(installation).is_none()
        {
            return Err(RsdetectError::Validation(format!(
                "air gap installation '{}' is not defined",
                installation
            )));
        }

        if let Some(proxy) = &self.proxy {
            if proxy.host.trim().is_empty() {
                return Err(RsdetectError::Validation(
                    "proxy host must not be empty".to_string(),
                ));
            }
            if proxy.port == 0 {
                return Err(RsdetectError::Validation("proxy port must not be 0".to_string()));
            }
            if let Some(id) = &proxy.credentials {
                match self.lookup(id) {
                    Some(Credentials::UsernamePassword { .. }) => {}
                    Some(Credentials::Token { .. }) => {
                        return Err(RsdetectError::Validation(format!(
                            "proxy credentials '{}' must be a username and password",
                            id
                        )));
                    }
                    None => {
                        return Err(RsdetectError::Validation(format!(
                            "proxy credentials '{}' are not defined",
                            id
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Builds the proxy descriptor handed to the provisioner.
    pub fn proxy_descriptor(&self) -> Option<ProxyDescriptor> {
        let proxy = self.proxy.as_ref()?;
        let (username, password) = match proxy.credentials.as_deref().and_then(|id| self.lookup(id))
        {
            Some(Credentials::UsernamePassword { username, password }) => {
                (Some(username.clone()), Some(password.clone()))
            }
            _ => (None, None),
        };
        Some(ProxyDescriptor {
            host: proxy.host.clone(),
            port: proxy.port,
            username,
            password,
            ntlm_domain: proxy.ntlm_domain.clone(),
            ntlm_workstation: proxy.ntlm_workstation.clone(),
            ignored_hosts: ProxyDescriptor::parse_ignored_hosts(&proxy.no_proxy_hosts),
        })
    }

    /// Environment variables describing the server and proxy for the scanner.
    ///
    /// These are defaults: the caller merges them under the captured snapshot
    /// so values set by the build take precedence.
    pub fn child_environment(&self) -> Vec<(String, String)> {
        let mut vars = Vec::new();

        if let Some(server) = &self.server {
            vars.push(("BLACKDUCK_URL".to_string(), server.url.to_string()));
            vars.push(("BLACKDUCK_TIMEOUT".to_string(), server.timeout.to_string()));
            vars.push(("BLACKDUCK_TRUST_CERT".to_string(), server.trust_cert.to_string()));
            match server.credentials.as_deref().and_then(|id| self.lookup(id)) {
                Some(Credentials::Token { token }) => {
                    vars.push(("BLACKDUCK_API_TOKEN".to_string(), token.clone()));
                }
                Some(Credentials::UsernamePassword { username, password }) => {
                    vars.push(("BLACKDUCK_USERNAME".to_string(), username.clone()));
                    vars.push(("BLACKDUCK_PASSWORD".to_string(), password.clone()));
                }
                None => {}
            }
        }

        if let Some(proxy) = self.proxy_descriptor() {
            vars.push(("BLACKDUCK_PROXY_HOST".to_string(), proxy.host.clone()));
            vars.push(("BLACKDUCK_PROXY_PORT".to_string(), proxy.port.to_string()));
            let optional = [
                ("BLACKDUCK_PROXY_USERNAME", proxy.username),
                ("BLACKDUCK_PROXY_PASSWORD", proxy.password),
                ("BLACKDUCK_PROXY_NTLM_DOMAIN", proxy.ntlm_domain),
                ("BLACKDUCK_PROXY_NTLM_WORKSTATION", proxy.ntlm_workstation),
            ];
            for (name, value) in optional {
                if let Some(value) = value.filter(|v| !v.is_empty()) {
                    vars.push((name.to_string(), value));
                }
            }
            if !proxy.ignored_hosts.is_empty() {
                vars.push((
                    "BLACKDUCK_PROXY_IGNORED_HOSTS".to_string(),
                    proxy.ignored_hosts.join(","),
                ));
            }
        }

        vars
    }
}

/// Parses a global configuration from YAML text.
///
/// Relative paths are resolved against `base_dir` and the result is validated.
pub fn parse_global_config(
    yaml: &str,
    base_dir: &Utf8Path,
) -> Result<GlobalConfig, RsdetectError> {
    let mut config: GlobalConfig = serde_yaml::from_str(yaml)
        .map_err(|e| RsdetectError::Config(format!("YAML parse error: {}", e)))?;
    config.resolve_paths(base_dir);
    config.validate()?;
    Ok(config)
}

/// Loads the global configuration from `path`.
pub fn load_global_config(path: &Utf8Path) -> Result<GlobalConfig, RsdetectError> {
    let file = File::open(path).map_err(|e| RsdetectError::io(path.as_str(), e))?;
    let reader = BufReader::new(file);
    let mut config: GlobalConfig = serde_yaml::from_reader(reader)
        .map_err(|e| RsdetectError::Config(format!("YAML parse error in {}: {}", path, e)))?;

    let base_dir = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    config.resolve_paths(base_dir);
    config.validate()?;

    debug!("loaded global configuration from {}", path);
    Ok(config)
}

/// Loads the configuration named on the command line, or the default file if present.
///
/// Returns `Ok(None)` when no path was given and the default file does not exist.
pub fn load_optional_config(
    path: Option<&Utf8Path>,
) -> Result<Option<GlobalConfig>, RsdetectError> {
    match path {
        Some(path) => load_global_config(path).map(Some),
        None => {
            let default = Utf8Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                load_global_config(default).map(Some)
            } else {
                debug!("no global configuration found");
                Ok(None)
            }
        }
    }
}
