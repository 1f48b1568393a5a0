//! Environment snapshot captured once per invocation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Path to a user-provided Detect jar. When set, the jar is run directly.
pub const DETECT_JAR: &str = "DETECT_JAR";
/// Escaping toggle. Anything other than `true` (case-insensitive) disables escaping.
pub const DETECT_SHOULD_ESCAPE: &str = "DETECT_SHOULD_ESCAPE";
/// Java executable override used when no JDK home is given explicitly.
pub const DETECT_JAVA_PATH: &str = "DETECT_JAVA_PATH";
/// Java home fallback.
pub const JAVA_HOME: &str = "JAVA_HOME";
/// Search path, used for diagnostics and bare `java` lookup.
pub const PATH: &str = "PATH";

/// Immutable mapping of environment variable names to values.
///
/// Names are case-sensitive and iteration order is by name. The snapshot
/// is used both for macro expansion and as the complete environment of the
/// scanner process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvironmentSnapshot {
    /// Captures the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Builds a snapshot from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the value of `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Returns the value of `name` if it is set and not blank.
    pub fn get_non_blank(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }

    /// Reads a boolean toggle. Absent or blank values yield `default`.
    pub fn flag(&self, name: &str, default: bool) -> bool {
        match self.get_non_blank(name) {
            Some(value) => value.trim().eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    /// Returns a new snapshot with `defaults` added for names not already present.
    pub fn with_defaults<I>(&self, defaults: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars = self.vars.clone();
        for (key, value) in defaults {
            vars.entry(key).or_insert(value);
        }
        Self { vars }
    }

    /// Iterates over all variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
