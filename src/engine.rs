//! The query engine: one session, escaped statement builders, transaction
//! state and the status accessors.

use crate::error::{Error, Result};
use crate::operation::{
    BulkCreateOperation, CreateOperation, CrudOperation, DeleteOperation, ReadOperation,
    UpdateOperation,
};
use crate::session::{Outcome, Session};
use crate::sqlite::SqliteSession;
use crate::template::Template;
use crate::value::{Conditions, Row, Value};
use log::{debug, info, trace, warn};
use std::path::Path;

#[cfg(feature = "mysql")]
use crate::{config::ConnectionConfig, mysql::MysqlSession};

/// Transaction state of the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionState {
    #[default]
    Idle,
    InTransaction,
}

/// Owns one session and turns calls into escaped SQL statements.
///
/// Methods that reach the server take `&mut self`; share an engine across
/// threads behind a lock. The session is released when the engine is
/// dropped, or explicitly through [`QueryEngine::close`].
#[derive(Debug)]
pub struct QueryEngine<S: Session> {
    session: S,
    state: TransactionState,
    last_error: String,
}

#[cfg(feature = "mysql")]
impl QueryEngine<MysqlSession> {
    /// Connect to a MySQL server. Fails with [`Error::Connection`].
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        Ok(Self::new(MysqlSession::connect(config)?))
    }
}

impl QueryEngine<SqliteSession> {
    /// Open or create a SQLite database file
    pub fn open_sqlite<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(SqliteSession::open(path)?))
    }

    /// Open a private in-memory SQLite database
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(SqliteSession::open_in_memory()?))
    }
}

impl<S: Session> QueryEngine<S> {
    /// Wrap an already connected session
    pub fn new(session: S) -> Self {
        debug!("query engine on {} session", session.backend_name());
        Self {
            session,
            state: TransactionState::Idle,
            last_error: String::new(),
        }
    }

    /// Release the connection now, reporting any close error.
    pub fn close(self) -> Result<()> {
        if self.state == TransactionState::InTransaction {
            debug!("closing with an open transaction; the server discards it");
        }
        let backend = self.session.backend_name();
        self.session.close()?;
        info!("closed {} session", backend);
        Ok(())
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Escape a value for embedding between single quotes
    pub fn escape(&self, value: &str) -> String {
        self.session.escape(value)
    }

    /// Records the outcome of a call for [`QueryEngine::last_error`].
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.last_error.clear(),
            Err(e) => {
                debug!("{}", e);
                self.last_error = match e {
                    Error::Execution { message } => message.clone(),
                    other => other.to_string(),
                };
            }
        }
        result
    }

    fn run(&mut self, sql: &str) -> Result<Outcome> {
        trace!("executing: {}", sql);
        self.session.execute(sql)
    }

    fn render_and_run(&mut self, op: &CrudOperation) -> Result<Outcome> {
        let sql = op.to_sql(&self.session)?;
        self.run(&sql)
    }

    /// Run one raw, trusted statement
    pub fn execute(&mut self, sql: &str) -> Result<Outcome> {
        let result = if sql.trim().is_empty() {
            Err(Error::EmptyStatement)
        } else {
            self.run(sql)
        };
        self.track(result)
    }

    /// Fill `template` with escaped `args` and run it.
    ///
    /// Placeholders are `%s`, `%d`, `%N$s`, `%N$d` and `%%`; see
    /// [`Template`]. Quotes around text placeholders belong in the template.
    pub fn query(&mut self, template: &str, args: &[Value]) -> Result<Outcome> {
        let result = Template::new(template)
            .render(&self.session, args)
            .and_then(|sql| {
                if sql.trim().is_empty() {
                    Err(Error::EmptyStatement)
                } else {
                    self.run(&sql)
                }
            });
        self.track(result)
    }

    /// Perform a CRUD operation
    pub fn execute_crud(&mut self, op: CrudOperation) -> Result<Outcome> {
        let result = self.render_and_run(&op);
        self.track(result)
    }

    fn rows(&mut self, op: CrudOperation) -> Result<Vec<Row>> {
        let result = self.render_and_run(&op).and_then(|outcome| match outcome {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Affected(_) => Err(Error::execution("statement returned no result set")),
        });
        self.track(result)
    }

    fn affected(&mut self, op: CrudOperation) -> Result<u64> {
        let result = self.render_and_run(&op).map(|outcome| outcome.count());
        self.track(result)
    }

    /// Run a select. Zero matches is `Ok` with no rows.
    pub fn select(&mut self, op: &ReadOperation) -> Result<Vec<Row>> {
        self.rows(CrudOperation::Read(op.clone()))
    }

    /// All rows of `table` matching `conditions`; an empty mapping matches every row
    pub fn filter(&mut self, table: &str, conditions: &Conditions) -> Result<Vec<Row>> {
        self.rows(CrudOperation::Read(
            ReadOperation::new(table).with_conditions(conditions.clone()),
        ))
    }

    /// First row matching `conditions`, in whatever order the server returns.
    /// Use [`QueryEngine::select`] with an order for a deterministic pick.
    pub fn find(&mut self, table: &str, conditions: &Conditions) -> Result<Option<Row>> {
        let rows = self.rows(CrudOperation::Read(
            ReadOperation::new(table)
                .with_conditions(conditions.clone())
                .with_limit(1),
        ))?;
        Ok(rows.into_iter().next())
    }

    /// Insert one row; columns follow the mapping's order. Returns rows affected.
    pub fn insert(&mut self, table: &str, data: &Conditions) -> Result<u64> {
        self.affected(CrudOperation::Create(CreateOperation::new(table, data.clone())))
    }

    /// Insert many rows in one statement; values match `fields` by position.
    pub fn bulk_insert(&mut self, table: &str, fields: &[&str], rows: &[Vec<Value>]) -> Result<u64> {
        self.affected(CrudOperation::BulkCreate(BulkCreateOperation::new(
            table,
            fields,
            rows.to_vec(),
        )))
    }

    /// Update rows matching `conditions`, which must not be empty.
    ///
    /// A `Null` condition matches with `IS NULL`.
    pub fn update(&mut self, table: &str, data: &Conditions, conditions: &Conditions) -> Result<u64> {
        self.affected(CrudOperation::Update(UpdateOperation::new(
            table,
            data.clone(),
            conditions.clone(),
        )))
    }

    /// Update every row of `table`
    pub fn update_all(&mut self, table: &str, data: &Conditions) -> Result<u64> {
        self.affected(CrudOperation::Update(UpdateOperation::all(table, data.clone())))
    }

    /// Delete rows matching `conditions`, which must not be empty.
    ///
    /// A `Null` condition matches with `IS NULL`.
    pub fn delete(&mut self, table: &str, conditions: &Conditions) -> Result<u64> {
        self.affected(CrudOperation::Delete(DeleteOperation::new(
            table,
            conditions.clone(),
        )))
    }

    /// Delete every row of `table`
    pub fn delete_all(&mut self, table: &str) -> Result<u64> {
        self.affected(CrudOperation::Delete(DeleteOperation::all(table)))
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.state
    }

    pub fn in_transaction(&self) -> bool {
        self.state == TransactionState::InTransaction
    }

    /// Idle -> InTransaction
    pub fn begin(&mut self) -> Result<()> {
        let result = match self.state {
            TransactionState::InTransaction => Err(Error::TransactionActive),
            TransactionState::Idle => self.session.begin(),
        };
        if result.is_ok() {
            self.state = TransactionState::InTransaction;
            debug!("transaction started");
        }
        self.track(result)
    }

    /// InTransaction -> Idle, keeping the statements issued since `begin`.
    ///
    /// A COMMIT the server refuses (SQLite `SQLITE_BUSY`, for one) leaves the
    /// transaction open; the engine stays `InTransaction` so the caller can
    /// retry or roll back.
    pub fn commit(&mut self) -> Result<()> {
        let result = match self.state {
            TransactionState::Idle => Err(Error::NoTransaction),
            TransactionState::InTransaction => {
                let result = self.session.commit();
                self.settle_after_end(result.is_ok());
                result
            }
        };
        if result.is_ok() {
            debug!("transaction committed");
        }
        self.track(result)
    }

    /// InTransaction -> Idle, discarding the statements issued since `begin`
    pub fn rollback(&mut self) -> Result<()> {
        let result = match self.state {
            TransactionState::Idle => Err(Error::NoTransaction),
            TransactionState::InTransaction => {
                let result = self.session.rollback();
                self.settle_after_end(result.is_ok());
                result
            }
        };
        if result.is_ok() {
            debug!("transaction rolled back");
        }
        self.track(result)
    }

    // The connection's own view wins; without one, only success ends it.
    fn settle_after_end(&mut self, succeeded: bool) {
        let open = self.session.in_transaction().unwrap_or(!succeeded);
        self.state = if open {
            TransactionState::InTransaction
        } else {
            TransactionState::Idle
        };
        if open {
            debug!("transaction still open after failed end");
        }
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.begin()?;
        let result = f(self).and_then(|value| self.commit().map(|_| value));
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if self.in_transaction() {
                    // The closure's (or COMMIT's) error is the one returned.
                    if let Err(rollback_err) = self.rollback() {
                        warn!("rollback after failed transaction also failed: {}", rollback_err);
                    }
                }
                self.last_error = match &e {
                    Error::Execution { message } => message.clone(),
                    other => other.to_string(),
                };
                Err(e)
            }
        }
    }

    /// Id generated by the most recent successful insert, 0 if none
    pub fn last_insert_id(&self) -> u64 {
        self.session.last_insert_id()
    }

    /// Message of the most recent failed call; empty after a success
    pub fn last_error(&self) -> &str {
        &self.last_error
    }
}
