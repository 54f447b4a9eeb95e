//! The connection seam between the engine and a database driver.

use crate::error::Result;
use crate::escape::Escape;
use crate::value::Row;

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Materialized rows of a row-producing statement (possibly none)
    Rows(Vec<Row>),
    /// Affected-row count of any other statement
    Affected(u64),
}

impl Outcome {
    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            Outcome::Rows(rows) => Some(rows),
            Outcome::Affected(_) => None,
        }
    }

    /// Rows returned or rows affected
    pub fn count(&self) -> u64 {
        match self {
            Outcome::Rows(rows) => rows.len() as u64,
            Outcome::Affected(n) => *n,
        }
    }
}

/// One live, authenticated database session.
///
/// Dropping a session releases its connection. Calls are blocking and a
/// session runs one statement at a time.
pub trait Session: Escape {
    /// Run one statement and materialize its result.
    fn execute(&mut self, sql: &str) -> Result<Outcome>;

    /// Id generated by the most recent successful insert, 0 if none.
    fn last_insert_id(&self) -> u64;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;

    fn begin(&mut self) -> Result<()> {
        self.execute("BEGIN").map(|_| ())
    }

    fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT").map(|_| ())
    }

    fn rollback(&mut self) -> Result<()> {
        self.execute("ROLLBACK").map(|_| ())
    }

    /// Whether the connection itself reports an open transaction, when the
    /// driver can tell. The engine trusts this over its own bookkeeping
    /// after a COMMIT or ROLLBACK.
    fn in_transaction(&self) -> Option<bool> {
        None
    }

    /// Release the connection and report any error the driver raises on close.
    fn close(self) -> Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}
