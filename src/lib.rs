//! Single-connection SQL query engine for MySQL and SQLite.
//!
//! # Intention
//!
//! - Own exactly one database session and release it deterministically.
//! - Compose SQL text in which every caller-supplied value has been escaped
//!   by the session it is sent to.
//! - Keep "no rows" and "statement failed" apart in the return types.
//!
//! # Architectural Boundaries
//!
//! - Only statement building, execution and transaction control belong here.
//! - No pooling, retries, schema management or object mapping.
//! - Table and column names are trusted input; values never are.
//!
//! # Example
//!
//! ```
//! use rust_sql::{Conditions, QueryEngine};
//!
//! let mut db = QueryEngine::open_in_memory()?;
//! db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")?;
//! db.insert("users", &Conditions::new().with_value("name", "O'Brien").with_null("age"))?;
//! let user = db.find("users", &Conditions::new().with_value("name", "O'Brien"))?;
//! assert!(user.is_some());
//! # Ok::<(), rust_sql::Error>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod escape;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod operation;
pub mod session;
pub mod sqlite;
pub mod template;
pub mod value;

pub use config::ConnectionConfig;
pub use engine::{QueryEngine, TransactionState};
pub use error::{Error, Result};
pub use escape::Escape;
#[cfg(feature = "mysql")]
pub use crate::mysql::MysqlSession;
pub use operation::{
    BulkCreateOperation, CreateOperation, CrudOperation, DeleteOperation, Order, ReadOperation,
    UpdateOperation,
};
pub use session::{Outcome, Session};
pub use sqlite::SqliteSession;
pub use template::Template;
pub use value::{Conditions, Row, Value};
