//! Placeholder substitution for free-form queries.
//!
//! A template is scanned once, left to right. Recognised tokens are `%s`,
//! `%d`, their positional forms `%N$s` / `%N$d`, and `%%`. Every other `%`
//! is copied as-is. Substituted text is appended to the output and never
//! scanned again, so a `%` inside an argument stays a literal `%`.
//!
//! Quotes are not added: the template author writes `'%s'`.

use crate::error::{Error, Result};
use crate::escape::Escape;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    Integer,
}

/// A parsed query template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template<'a> {
    source: &'a str,
}

impl<'a> Template<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Fill the placeholders with escaped arguments.
    pub fn render<E: Escape + ?Sized>(&self, escaper: &E, args: &[Value]) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        let mut next_arg = 0usize;
        let mut rest = self.source;

        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(tail) = after.strip_prefix('%') {
                out.push('%');
                rest = tail;
                continue;
            }

            match parse_placeholder(after) {
                Some((index, kind, consumed)) => {
                    let index = match index {
                        Some(explicit) => explicit,
                        None => {
                            next_arg += 1;
                            next_arg - 1
                        }
                    };
                    let arg = args.get(index).ok_or_else(|| {
                        Error::Template(format!(
                            "placeholder {} needs argument {} but only {} given",
                            &rest[pos..pos + 1 + consumed],
                            index + 1,
                            args.len()
                        ))
                    })?;
                    out.push_str(&substitute(escaper, arg, kind, index)?);
                    rest = &after[consumed..];
                }
                None => {
                    out.push('%');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Parses the text after a `%`. Returns the explicit zero-based argument
/// index if any, the kind, and how many bytes were consumed.
fn parse_placeholder(after: &str) -> Option<(Option<usize>, Kind, usize)> {
    let bytes = after.as_bytes();
    let kind_of = |b: u8| match b {
        b's' => Some(Kind::Text),
        b'd' => Some(Kind::Integer),
        _ => None,
    };

    if let Some(kind) = bytes.first().copied().and_then(kind_of) {
        return Some((None, kind, 1));
    }

    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 || bytes.get(digits) != Some(&b'$') {
        return None;
    }
    let kind = bytes.get(digits + 1).copied().and_then(kind_of)?;
    let position: usize = after[..digits].parse().ok()?;
    if position == 0 {
        return None;
    }
    Some((Some(position - 1), kind, digits + 2))
}

fn substitute<E: Escape + ?Sized>(escaper: &E, arg: &Value, kind: Kind, index: usize) -> Result<String> {
    match kind {
        Kind::Text => match arg {
            Value::Real(f) if !f.is_finite() => Err(Error::Template(format!(
                "argument {} is not a finite number: {}",
                index + 1,
                f
            ))),
            _ => Ok(escaper.escape(&arg.to_text().unwrap_or_default())),
        },
        Kind::Integer => {
            let n = match arg {
                Value::Real(f) if f.is_finite() => Some(f.trunc() as i64),
                other => other.as_i64(),
            };
            n.map(|n| escaper.escape(&n.to_string())).ok_or_else(|| {
                Error::Template(format!("argument {} is not an integer: {:?}", index + 1, arg))
            })
        }
    }
}
