//! Shell-style splitting of user property strings.

use crate::error::RsdetectError;

/// Splits a raw property string into arguments.
///
/// Quoting and backslash escapes follow POSIX shell rules. Every resulting
/// word is then split again on line breaks, so a property block written over
/// several lines (even inside quotes) yields one argument per line. Blank
/// arguments are dropped.
///
/// # Errors
///
/// Returns [`RsdetectError::ArgumentSyntax`] on unterminated quotes or a
/// trailing escape. The raw input is not echoed because it may hold secrets.
pub fn tokenize(raw: &str) -> Result<Vec<String>, RsdetectError> {
    let words = shell_words::split(&escape_word_comments(raw))
        .map_err(|e| RsdetectError::ArgumentSyntax(e.to_string()))?;

    Ok(words
        .iter()
        .flat_map(|word| word.split('\n'))
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|token| !token.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Escapes every unquoted `#` that starts a word.
///
/// A shell reads such a `#` as the start of a comment and drops the rest of
/// the line. Property values may start with `#`, so it is kept literal.
fn escape_word_comments(raw: &str) -> String {
    #[derive(PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut out = String::with_capacity(raw.len());
    let mut quote = Quote::None;
    let mut escaped = false;
    let mut word_start = true;

    for c in raw.chars() {
        if escaped {
            escaped = false;
            out.push(c);
            word_start = false;
            continue;
        }
        match (&quote, c) {
            (Quote::None, '#') if word_start => out.push_str("\\#"),
            (Quote::None | Quote::Double, '\\') => {
                escaped = true;
                out.push(c);
            }
            (Quote::None, '\'') => {
                quote = Quote::Single;
                out.push(c);
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                out.push(c);
            }
            (Quote::Single, '\'') | (Quote::Double, '"') => {
                quote = Quote::None;
                out.push(c);
            }
            _ => out.push(c),
        }
        word_start = quote == Quote::None && c.is_whitespace();
    }
    out
}
