//! `$NAME` / `${NAME}` expansion against the environment snapshot.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::environment::EnvironmentSnapshot;

/// Matches `${NAME}` (group 1) or `$NAME` (group 2).
static MACRO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid macro regex")
});

/// Result of expanding one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub value: String,
    /// The value still contains a `$` after substitution.
    pub unresolved: bool,
}

/// Replaces every known variable reference in `token` with its value.
///
/// References to unknown variables are left untouched and substituted values
/// are not expanded again. A leftover `$` is flagged through
/// [`Expansion::unresolved`] rather than logged here, since the caller knows
/// whether the token may be shown.
pub fn expand(token: &str, vars: &EnvironmentSnapshot) -> Expansion {
    let value = MACRO_PATTERN
        .replace_all(token, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match vars.get(name) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    Expansion {
        unresolved: value.contains('$'),
        value,
    }
}
