//! Argument assembly for the Detect invocation.
//!
//! This module provides:
//! - [`tokenize`]: shell-style splitting of the user property string
//! - [`expand`]: `$NAME` expansion against the environment snapshot
//! - [`Escaper`]: interpreter-specific escaping
//! - [`ArgumentAssembler`]: builds the final argv and its redacted log line

mod escape;
mod macros;
mod tokenizer;

use std::fmt;

use tracing::{debug, warn};

pub use escape::Escaper;
pub use macros::{Expansion, expand};
pub use tokenizer::tokenize;

use crate::environment::EnvironmentSnapshot;
use crate::error::RsdetectError;
use crate::provision::InvocationPrefix;

/// Property controlling Detect's own log verbosity.
pub const LOGGING_LEVEL_KEY: &str = "logging.level.detect";
/// Telemetry passthrough carrying the CI platform version.
pub const PLATFORM_VERSION_KEY: &str = "detect.phone.home.passthrough.ci.version";
/// Telemetry passthrough carrying this tool's version.
pub const PLUGIN_VERSION_KEY: &str = "detect.phone.home.passthrough.ci.plugin.version";
/// Marker for properties whose values must be passed through unescaped and unlogged.
pub const API_TOKEN_KEY: &str = "blackduck.api.token";
/// Value used when a version lookup yields nothing.
pub const UNKNOWN_VERSION: &str = "UNKNOWN";

/// Where an argv element came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Interpreter and target produced by provisioning.
    Prefix,
    /// Parsed from the user's property string.
    UserSupplied,
    /// Appended automatically (log level, telemetry).
    AutoGenerated,
    /// User-supplied credential. Never escaped, never logged beyond its key.
    Secret,
}

/// A single argv element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyToken {
    value: String,
    provenance: Provenance,
    /// Set when only the key may appear in the log line.
    logged_key: Option<String>,
}

impl PropertyToken {
    fn new(value: String, provenance: Provenance) -> Self {
        Self {
            value,
            provenance,
            logged_key: None,
        }
    }

    fn redacted(value: String, provenance: Provenance, key: &str) -> Self {
        Self {
            value,
            provenance,
            logged_key: Some(key.to_string()),
        }
    }

    /// The exact argv value.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Returns true if the value is hidden from the log line.
    pub fn is_redacted(&self) -> bool {
        self.logged_key.is_some()
    }

    fn log_form(&self) -> &str {
        self.logged_key.as_deref().unwrap_or(&self.value)
    }
}

/// Returns the `--key` part of a `--key=value` property.
pub fn property_key(token: &str) -> &str {
    token.split_once('=').map_or(token, |(key, _)| key)
}

/// Values for the automatically appended properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoProperties {
    /// Detect log level used when the user did not set one (e.g. `INFO`).
    pub log_level: String,
    /// CI platform version, if known.
    pub platform_version: Option<String>,
    /// Version of this tool, if known.
    pub plugin_version: Option<String>,
}

/// The assembled command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    tokens: Vec<PropertyToken>,
    log_line: String,
}

impl Assembly {
    pub fn tokens(&self) -> &[PropertyToken] {
        &self.tokens
    }

    /// The argv, program first.
    pub fn argv(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.value.clone()).collect()
    }

    /// The human-readable command line with redactions applied.
    pub fn log_line(&self) -> &str {
        &self.log_line
    }
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.log_line)
    }
}

/// Builder for the final Detect argv.
///
/// Tokens are kept in the order they are pushed: prefix, user properties,
/// then generated properties.
#[derive(Debug)]
pub struct ArgumentAssembler {
    escaper: Escaper,
    show_phone_home_keys: bool,
    tokens: Vec<PropertyToken>,
}

impl ArgumentAssembler {
    /// Creates an assembler that escapes with `escaper`.
    ///
    /// With `show_phone_home_keys` the telemetry passthrough tokens appear in
    /// the log line by key only; without it they are left out altogether.
    /// Their values are never logged.
    pub fn new(escaper: Escaper, show_phone_home_keys: bool) -> Self {
        Self {
            escaper,
            show_phone_home_keys,
            tokens: Vec::new(),
        }
    }

    /// Appends the invocation prefix verbatim.
    pub fn push_prefix(&mut self, prefix: InvocationPrefix) {
        self.tokens.extend(
            prefix
                .into_args()
                .into_iter()
                .map(|arg| PropertyToken::new(arg, Provenance::Prefix)),
        );
    }

    /// Tokenizes, expands and escapes the user property string.
    ///
    /// # Errors
    ///
    /// Returns [`RsdetectError::ArgumentSyntax`] if the string is malformed.
    pub fn push_user_properties(
        &mut self,
        raw: &str,
        vars: &EnvironmentSnapshot,
    ) -> Result<(), RsdetectError> {
        for token in tokenize(raw)? {
            let expansion = expand(&token, vars);
            let key = property_key(&expansion.value).to_string();
            let secret = key.contains(API_TOKEN_KEY);

            if expansion.unresolved {
                if secret {
                    warn!(
                        "variable may not have been properly replaced in {}; \
                        make sure the variable is defined for this build",
                        key
                    );
                } else {
                    warn!(
                        original = token.as_str(),
                        resolved = expansion.value.as_str(),
                        "variable may not have been properly replaced: argument '{}' resolved \
                        to '{}'; make sure the variable is defined for this build",
                        token,
                        expansion.value
                    );
                }
            }

            if key.contains(PLATFORM_VERSION_KEY) || key.contains(PLUGIN_VERSION_KEY) {
                warn!("{} is generated automatically, ignoring the supplied value", key);
                continue;
            }

            if secret {
                self.tokens
                    .push(PropertyToken::redacted(expansion.value, Provenance::Secret, &key));
            } else {
                let escaped = self.escaper.escape(&expansion.value);
                self.tokens
                    .push(PropertyToken::new(escaped, Provenance::UserSupplied));
            }
        }
        Ok(())
    }

    /// Appends the log level, platform version and plugin version properties.
    ///
    /// The log level is skipped if the user already supplied one.
    pub fn push_auto_properties(&mut self, auto: &AutoProperties) {
        let has_log_level = self.tokens.iter().any(|t| {
            t.provenance != Provenance::Prefix && property_key(&t.value).contains(LOGGING_LEVEL_KEY)
        });
        if has_log_level {
            debug!("user supplied {}, not adding a default", LOGGING_LEVEL_KEY);
        } else {
            let property = format!("--{}={}", LOGGING_LEVEL_KEY, auto.log_level);
            self.tokens.push(PropertyToken::new(
                self.escaper.escape(&property),
                Provenance::AutoGenerated,
            ));
        }

        for (key, version) in [
            (PLATFORM_VERSION_KEY, &auto.platform_version),
            (PLUGIN_VERSION_KEY, &auto.plugin_version),
        ] {
            let version = version.as_deref().unwrap_or(UNKNOWN_VERSION);
            let property = format!("--{}={}", key, version);
            self.tokens.push(PropertyToken::redacted(
                self.escaper.escape(&property),
                Provenance::AutoGenerated,
                &format!("--{}", key),
            ));
        }
    }

    /// Finishes assembly and renders the log line.
    pub fn finish(self) -> Assembly {
        let log_line = self
            .tokens
            .iter()
            .filter(|t| {
                self.show_phone_home_keys
                    || !(t.provenance == Provenance::AutoGenerated && t.is_redacted())
            })
            .map(PropertyToken::log_form)
            .collect::<Vec<_>>()
            .join(" ");

        Assembly {
            tokens: self.tokens,
            log_line,
        }
    }
}

/// Builds the complete argv in one call.
///
/// # Errors
///
/// Returns [`RsdetectError::ArgumentSyntax`] if `raw_properties` is malformed.
pub fn assemble(
    prefix: InvocationPrefix,
    raw_properties: &str,
    vars: &EnvironmentSnapshot,
    escaper: Escaper,
    auto: &AutoProperties,
    show_phone_home_keys: bool,
) -> Result<Assembly, RsdetectError> {
    let mut assembler = ArgumentAssembler::new(escaper, show_phone_home_keys);
    assembler.push_prefix(prefix);
    assembler.push_user_properties(raw_properties, vars)?;
    assembler.push_auto_properties(auto);
    Ok(assembler.finish())
}
