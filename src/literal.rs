//! Parsing of flat sequence literals like `"[1, 2, 3]"` or `"('a', 'b')"`.
//!
//! Sequence-valued flags accept literal syntax rather than JSON because the
//! same parser must also validate values supplied directly by calling code.
//! The grammar is deliberately tiny: a single `[..]` or `(..)` of
//! comma-separated scalar literals (bool, int, float, quoted string).
//! Everything else — nesting, unquoted identifiers, dict syntax — is
//! rejected with a descriptive error.
//!
//! Input is bounded and screened before parsing: a length cap, an element
//! count cap, a nesting-depth cap, and a blocklist of substrings associated
//! with dynamic execution. Violations fail loudly; nothing is truncated.

use crate::error::FlagError;
use crate::value::Value;

/// Maximum accepted input length in bytes.
pub const MAX_INPUT_LEN: usize = 4096;

/// Maximum number of elements in a parsed sequence.
pub const MAX_ELEMENTS: usize = 1024;

/// Maximum bracket nesting the pre-scan will walk before giving up.
/// Anything deeper than 1 is rejected as nested regardless.
pub const MAX_NESTING_DEPTH: usize = 8;

/// Substrings associated with dynamic execution primitives. Input containing
/// any of these is rejected outright, including inside quoted strings.
const EXECUTION_MARKERS: &[&str] = &["__", "eval", "exec", "import", "lambda"];

/// Parse a string as a flat sequence literal.
///
/// Fails with a distinct error for the empty string (as opposed to input
/// that parses but isn't a sequence), and rejects nested sequences, dict
/// syntax, and elements outside {bool, int, float, str}.
pub fn parse_sequence(input: &str) -> Result<Vec<Value>, FlagError> {
    if input.is_empty() {
        return Err(FlagError::EmptySequenceString);
    }
    if input.len() > MAX_INPUT_LEN {
        return Err(FlagError::BoundExceeded {
            what: "sequence literal length",
            max: MAX_INPUT_LEN,
        });
    }
    for marker in EXECUTION_MARKERS {
        if input.contains(marker) {
            return Err(FlagError::SuspiciousContent(marker));
        }
    }

    let trimmed = input.trim();
    let (open, close) = match trimmed.chars().next() {
        Some('[') => ('[', ']'),
        Some('(') => ('(', ')'),
        Some('{') => return Err(FlagError::NotASequence("dict".to_string())),
        _ => {
            // Not bracketed at all. If it parses as a scalar, report what it
            // evaluated to; otherwise it's not a literal we understand.
            return match parse_scalar(trimmed) {
                Ok(value) => Err(FlagError::NotASequence(value.type_name().to_string())),
                Err(_) => Err(FlagError::ParseValue {
                    kind: "sequence literal",
                    raw: input.to_string(),
                }),
            };
        }
    };

    check_nesting(trimmed)?;

    if !trimmed.ends_with(close) {
        return Err(FlagError::ParseValue {
            kind: "sequence literal",
            raw: input.to_string(),
        });
    }
    let inner = &trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()];

    let mut elements = Vec::new();
    for token in split_elements(inner)? {
        if elements.len() >= MAX_ELEMENTS {
            return Err(FlagError::BoundExceeded {
                what: "sequence element count",
                max: MAX_ELEMENTS,
            });
        }
        elements.push(parse_scalar(&token)?);
    }
    Ok(elements)
}

/// Pre-scan bracket depth, ignoring brackets inside quoted strings.
/// Depth beyond the cap or below zero is malformed; depth 2..=cap means a
/// nested sequence.
fn check_nesting(input: &str) -> Result<(), FlagError> {
    let mut depth: usize = 0;
    let mut max_depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in input.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' | '(' => {
                depth += 1;
                max_depth = max_depth.max(depth);
                if max_depth > MAX_NESTING_DEPTH {
                    return Err(FlagError::BoundExceeded {
                        what: "sequence nesting depth",
                        max: MAX_NESTING_DEPTH,
                    });
                }
            }
            ']' | ')' => {
                depth = depth.checked_sub(1).ok_or(FlagError::ParseValue {
                    kind: "sequence literal",
                    raw: input.to_string(),
                })?;
            }
            _ => {}
        }
    }
    if max_depth > 1 {
        return Err(FlagError::NestedSequence);
    }
    Ok(())
}

/// Split the bracket interior on commas, respecting quoted strings.
/// A single trailing comma is allowed, matching literal syntax.
fn split_elements(inner: &str) -> Result<Vec<String>, FlagError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in inner.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            ',' => {
                tokens.push(std::mem::take(&mut current));
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if quote.is_some() {
        return Err(FlagError::ParseValue {
            kind: "sequence literal",
            raw: inner.to_string(),
        });
    }
    tokens.push(current);

    let mut out = Vec::new();
    let count = tokens.len();
    for (i, token) in tokens.into_iter().enumerate() {
        let trimmed = token.trim().to_string();
        if trimmed.is_empty() {
            // Trailing comma produces one empty final token; anything else
            // (e.g. "[1,,2]") is malformed. An entirely empty interior is
            // the empty sequence.
            if i + 1 == count {
                continue;
            }
            return Err(FlagError::ParseValue {
                kind: "sequence literal",
                raw: token,
            });
        }
        out.push(trimmed);
    }
    Ok(out)
}

/// Parse a single scalar literal token: bool, int, float, or quoted string.
fn parse_scalar(token: &str) -> Result<Value, FlagError> {
    match token {
        "True" | "true" => return Ok(Value::Bool(true)),
        "False" | "false" => return Ok(Value::Bool(false)),
        "None" => return Err(FlagError::BadElementType {
            found: "NoneType".to_string(),
        }),
        _ => {}
    }
    if token.starts_with('{') {
        return Err(FlagError::BadElementType {
            found: "dict".to_string(),
        });
    }
    if let Some(first) = token.chars().next()
        && (first == '\'' || first == '"')
    {
        return unquote(token, first);
    }
    if let Ok(i) = token.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    if let Ok(f) = token.parse::<f64>() {
        // Reject alphabetic float spellings ("inf", "nan") that a literal
        // parser would not accept as bare identifiers.
        if token
            .chars()
            .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
        {
            return Err(FlagError::ParseValue {
                kind: "scalar literal",
                raw: token.to_string(),
            });
        }
        return Ok(Value::Float(f));
    }
    Err(FlagError::ParseValue {
        kind: "scalar literal",
        raw: token.to_string(),
    })
}

fn unquote(token: &str, quote: char) -> Result<Value, FlagError> {
    let malformed = || FlagError::ParseValue {
        kind: "string literal",
        raw: token.to_string(),
    };
    let inner = token
        .strip_prefix(quote)
        .and_then(|rest| rest.strip_suffix(quote))
        .ok_or_else(malformed)?;
    let mut out = String::new();
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            match c {
                '\\' | '\'' | '"' => out.push(c),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                _ => return Err(malformed()),
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            // An unescaped closing quote mid-token means trailing garbage.
            return Err(malformed());
        } else {
            out.push(c);
        }
    }
    if escaped {
        return Err(malformed());
    }
    Ok(Value::Str(out))
}
