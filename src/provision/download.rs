//! HTTP download of the Detect script, with proxy selection.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// Fixed timeout for a single download attempt.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Proxy settings resolved from the global configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDescriptor {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ntlm_domain: Option<String>,
    pub ntlm_workstation: Option<String>,
    /// Host patterns (`*` wildcard) that bypass the proxy
    pub ignored_hosts: Vec<String>,
}

impl fmt::Debug for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("ntlm_domain", &self.ntlm_domain)
            .field("ntlm_workstation", &self.ntlm_workstation)
            .field("ignored_hosts", &self.ignored_hosts)
            .finish()
    }
}

impl ProxyDescriptor {
    /// Splits a no-proxy list on whitespace, `,` and `|`.
    pub fn parse_ignored_hosts(raw: &str) -> Vec<String> {
        raw.split(|c: char| c.is_whitespace() || c == ',' || c == '|')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Returns true unless `host` matches one of the ignored patterns.
    ///
    /// Matching is anchored and case-insensitive; `*` matches any run of characters.
    pub fn applies_to(&self, host: &str) -> bool {
        !self
            .ignored_hosts
            .iter()
            .any(|pattern| host_matches(pattern, host))
    }

    fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

fn host_matches(pattern: &str, host: &str) -> bool {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    match Regex::new(&format!("(?i)^{}$", body)) {
        Ok(re) => re.is_match(host),
        Err(e) => {
            warn!("ignoring invalid no-proxy pattern '{}': {}", pattern, e);
            false
        }
    }
}

/// Fetches a remote resource.
///
/// Implementations must be `Send + Sync` so a node can run downloads on a
/// worker thread.
pub trait Downloader: Send + Sync {
    /// Downloads `url` in a single attempt, through `proxy` when it applies.
    fn download(&self, url: &Url, proxy: Option<&ProxyDescriptor>) -> Result<Vec<u8>>;
}

/// Downloader backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    pub timeout: Duration,
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self {
            timeout: DOWNLOAD_TIMEOUT,
        }
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &Url, proxy: Option<&ProxyDescriptor>) -> Result<Vec<u8>> {
        let mut builder = reqwest::blocking::Client::builder().timeout(self.timeout);

        let host = url.host_str().unwrap_or_default();
        match proxy.filter(|p| p.applies_to(host)) {
            Some(proxy) => {
                debug!("downloading {} through proxy {}:{}", url, proxy.host, proxy.port);
                let mut reqwest_proxy = reqwest::Proxy::all(proxy.url())
                    .with_context(|| format!("invalid proxy {}:{}", proxy.host, proxy.port))?;
                if proxy.ntlm_domain.is_some() || proxy.ntlm_workstation.is_some() {
                    warn!(
                        "NTLM proxy authentication is not supported for downloads, \
                        using basic auth"
                    );
                }
                if let (Some(username), Some(password)) = (&proxy.username, &proxy.password) {
                    reqwest_proxy = reqwest_proxy.basic_auth(username, password);
                }
                builder = builder.proxy(reqwest_proxy);
            }
            None => {
                debug!("downloading {} without proxy", url);
                builder = builder.no_proxy();
            }
        }

        let client = builder.build().context("failed to build HTTP client")?;
        let response = client
            .get(url.clone())
            .send()
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("server rejected request to {}", url))?;
        let body = response
            .bytes()
            .with_context(|| format!("failed to read response body from {}", url))?;

        Ok(body.to_vec())
    }
}
