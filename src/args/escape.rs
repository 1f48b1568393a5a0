//! Argument escaping for the interpreter that will re-parse the arguments.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Characters that carry meaning in POSIX shells or PowerShell.
const SPECIAL_CHARACTERS: &[char] = &[
    '|', '&', ';', '<', '>', '(', ')', '$', '`', '\\', '"', '\'', ' ', '\t', '*', '?', '[', '#',
    '~', '=', '%', ',',
];

/// Escaping rule applied to user-supplied and generated arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Escaper {
    /// Arguments reach the JVM argv directly; nothing re-parses them.
    Identity,
    /// Backslash before each special character, for the Bash script.
    Posix,
    /// Backtick before each special character, for the PowerShell script.
    PowerShell,
}

impl Escaper {
    /// Escapes `raw` for this interpreter. CR and LF are always removed
    /// by the shell escapers.
    pub fn escape(&self, raw: &str) -> String {
        match self {
            Self::Identity => raw.to_string(),
            Self::Posix => escape_with(raw, '\\'),
            Self::PowerShell => escape_with(raw, '`'),
        }
    }
}

fn escape_with(raw: &str, escape_char: char) -> String {
    let mut escaped = String::with_capacity(raw.len() * 2);
    for c in raw.chars() {
        match c {
            '\r' | '\n' => {}
            c if SPECIAL_CHARACTERS.contains(&c) => {
                escaped.push(escape_char);
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}
