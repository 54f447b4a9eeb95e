//! SQLite session over `rusqlite`.
//!
//! Used for embedded databases and as the local test backend. SQLite string
//! literals escape a quote by doubling it; backslash has no special meaning.

use crate::error::{Error, Result};
use crate::escape::{escape_sqlite, Escape};
use crate::session::{Outcome, Session};
use crate::value::{Row, Value};
use log::info;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;

/// SQLite session owning one connection
#[derive(Debug)]
pub struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    /// Open or create a SQLite database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| Error::Connection(e.to_string()))?;
        info!("opened sqlite database at {}", path.display());
        Ok(Self { conn })
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Connection(e.to_string()))?;
        info!("opened in-memory sqlite database");
        Ok(Self { conn })
    }

    /// Run several trusted statements at once, e.g. schema setup.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

impl Escape for SqliteSession {
    fn escape(&self, value: &str) -> String {
        escape_sqlite(value)
    }
}

impl Session for SqliteSession {
    fn execute(&mut self, sql: &str) -> Result<Outcome> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        if columns.is_empty() {
            let affected = stmt.execute([])?;
            return Ok(Outcome::Affected(affected as u64));
        }

        let mut result = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(to_value(row.get_ref(i)?));
            }
            result.push(Row::new(columns.clone(), values));
        }
        Ok(Outcome::Rows(result))
    }

    fn last_insert_id(&self) -> u64 {
        self.conn.last_insert_rowid().max(0) as u64
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn in_transaction(&self) -> Option<bool> {
        Some(!self.conn.is_autocommit())
    }

    fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::from(e))?;
        info!("closed sqlite database");
        Ok(())
    }
}
