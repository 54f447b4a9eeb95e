//! Escaping of values embedded as SQL literals.
//!
//! Escaping belongs to the session because it depends on the dialect and the
//! character set of the live connection. Statement builders only ever see an
//! [`Escape`] implementation, never a global escaper.

use crate::value::Value;

/// Dialect- and charset-aware escaping owned by a session.
pub trait Escape {
    /// Escape `value` so it can be placed between single quotes.
    fn escape(&self, value: &str) -> String;

    /// Render a value as a complete literal: `NULL`, a hex blob, or a
    /// quoted escaped string.
    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Blob(bytes) => hex_literal(bytes),
            other => {
                let text = other.to_text().unwrap_or_default();
                format!("'{}'", self.escape(&text))
            }
        }
    }
}

/// Backslash escaping as done by `mysql_real_escape_string` on a UTF-8
/// connection.
#[cfg(any(feature = "mysql", test))]
pub(crate) fn escape_mysql(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out
}

/// Quote doubling as done by `mysql_real_escape_string` when the session runs
/// with `NO_BACKSLASH_ESCAPES`; a backslash is then an ordinary character.
#[cfg(any(feature = "mysql", test))]
pub(crate) fn escape_mysql_quotes(value: &str) -> String {
    value.replace('\'', "''")
}

/// SQLite string literals only need the quote doubled; backslash is not special.
///
/// SQLite stops reading statement text at a NUL byte, so NUL leaves the
/// literal and is concatenated back in: `'a'||char(0)||'b'`. `||` binds
/// tighter than any comparison, so the result stays one text operand.
pub(crate) fn escape_sqlite(value: &str) -> String {
    value.replace('\'', "''").replace('\0', "'||char(0)||'")
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 3);
    out.push_str("X'");
    for b in bytes {
        out.push_str(&format!("{:02X}", b));
    }
    out.push('\'');
    out
}
