//! Validation of the code handed to the bridge.
//!
//! The bridge only ever calls what it is given, so the source must be a
//! function: a declaration/expression (`function`, `async function`,
//! `function*`) or an arrow (`() => …`, `x => …`, `async (a, b) => …`).
//! The check is syntactic and shallow; a malformed body is left for the
//! page to reject at injection time.

use crate::error::{BridgeError, Result};

/// Source text of a JavaScript function, checked to be callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsFunction {
    source: String,
}

impl JsFunction {
    /// Parses function source, rejecting anything that is not callable.
    pub fn parse(source: &str) -> Result<Self> {
        let trimmed = source.trim();
        if is_function(trimmed) {
            Ok(Self {
                source: trimmed.to_string(),
            })
        } else {
            Err(BridgeError::NotAFunction)
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl TryFrom<&str> for JsFunction {
    type Error = BridgeError;

    fn try_from(source: &str) -> Result<Self> {
        Self::parse(source)
    }
}

fn is_function(source: &str) -> bool {
    if is_plain_function(source) {
        return true;
    }
    // `async` may also be a parameter name (`async => 1`), which the
    // check above already accepted.
    match strip_keyword(source, "async") {
        Some(rest) => is_plain_function(rest),
        None => false,
    }
}

fn is_plain_function(source: &str) -> bool {
    if let Some(rest) = strip_keyword(source, "function") {
        return !rest.is_empty() && !rest.starts_with("=>");
    }
    if source.starts_with("function*") || source.starts_with("function(") {
        return true;
    }
    if source.starts_with('(') {
        return match closing_paren(source) {
            Some(end) => source[end + 1..].trim_start().starts_with("=>"),
            None => false,
        };
    }
    let ident_len = identifier_len(source);
    ident_len > 0 && source[ident_len..].trim_start().starts_with("=>")
}

/// Strips `keyword` when it is followed by whitespace, returning the rest.
fn strip_keyword<'a>(source: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = source.strip_prefix(keyword)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else if rest.starts_with('(') && keyword == "async" {
        Some(rest)
    } else {
        None
    }
}

fn identifier_len(source: &str) -> usize {
    let mut len = 0;
    for (i, c) in source.char_indices() {
        let valid = if i == 0 {
            c.is_alphabetic() || c == '_' || c == '$'
        } else {
            c.is_alphanumeric() || c == '_' || c == '$'
        };
        if !valid {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}

/// Byte index of the `)` matching the `(` at index 0, skipping string
/// literals, template literals and comments inside parameter lists.
fn closing_paren(source: &str) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (bytes[i] == b')').then_some(i);
                }
            }
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = source[i + 2..].find("*/")?;
                i += end + 3;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = source[i..].find('\n')?;
                i += end;
            }
            _ => {}
        }
        i += 1;
    }
    None
}
