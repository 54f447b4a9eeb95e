//! MySQL session over the synchronous `mysql` driver.
//!
//! The connection character set is pinned to `utf8mb4` at connect time and
//! verified, so the backslash escaper and the server agree on how bytes
//! form characters. Multi-byte legacy charsets (gbk, sjis, big5) are never
//! in effect on a session this module hands out.
//!
//! A session running with `NO_BACKSLASH_ESCAPES` in its `sql_mode` reads a
//! backslash as an ordinary character, so it escapes by doubling quotes
//! instead. The mode is read at connect time and again after any statement
//! that mentions `sql_mode`.

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::escape::{escape_mysql, escape_mysql_quotes, Escape};
use crate::session::{Outcome, Session};
use crate::value::{Row, Value};
use log::{debug, info, warn};
use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder};

const UTF8_CHARSETS: &[&str] = &["utf8mb4", "utf8mb3", "utf8"];

/// MySQL session owning one connection
pub struct MysqlSession {
    conn: Conn,
    charset: String,
    no_backslash_escapes: bool,
}

impl MysqlSession {
    /// Connect and authenticate. No retries.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let builder = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.as_str()))
            .tcp_port(config.port)
            .user(Some(config.user.as_str()))
            .pass(Some(config.password.as_str()))
            .db_name(Some(config.database.as_str()))
            .init(vec!["SET NAMES utf8mb4"]);

        let mut conn =
            Conn::new(Opts::from(builder)).map_err(|e| Error::Connection(e.to_string()))?;

        let charset: String = conn
            .query_first("SELECT @@character_set_connection")
            .map_err(|e| Error::Connection(e.to_string()))?
            .unwrap_or_default();
        if !UTF8_CHARSETS.contains(&charset.as_str()) {
            return Err(Error::Connection(format!(
                "connection character set {} is not utf8",
                charset
            )));
        }

        let sql_mode = read_sql_mode(&mut conn).map_err(|e| Error::Connection(e.to_string()))?;

        info!(
            "connected to mysql {}:{}/{} as {} (charset {}, sql_mode '{}')",
            config.host, config.port, config.database, config.user, charset, sql_mode
        );
        Ok(Self {
            conn,
            charset,
            no_backslash_escapes: has_no_backslash_escapes(&sql_mode),
        })
    }

    /// Character set of the connection
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Whether the session escapes by quote doubling
    pub fn no_backslash_escapes(&self) -> bool {
        self.no_backslash_escapes
    }

    fn run(&mut self, sql: &str) -> Result<Outcome> {
        let mut result = self.conn.query_iter(sql)?;
        let columns: Vec<String> = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();

        if columns.is_empty() {
            return Ok(Outcome::Affected(result.affected_rows()));
        }

        let mut rows = Vec::new();
        for row in result.by_ref() {
            let row = row?;
            let values = (0..row.len())
                .map(|i| to_value(row.as_ref(i).cloned().unwrap_or(mysql::Value::NULL)))
                .collect();
            rows.push(Row::new(columns.clone(), values));
        }
        Ok(Outcome::Rows(rows))
    }

    /// Re-read `sql_mode` after a statement that may have changed it.
    ///
    /// A failure here is returned to the caller even though the statement
    /// itself succeeded: escaping with a stale mode is not safe.
    fn refresh_sql_mode(&mut self) -> Result<()> {
        let mode = read_sql_mode(&mut self.conn).map_err(|e| {
            warn!("failed to re-read sql_mode: {}", e);
            Error::from(e)
        })?;
        let no_backslash_escapes = has_no_backslash_escapes(&mode);
        if no_backslash_escapes != self.no_backslash_escapes {
            debug!("sql_mode is now '{}'", mode);
        }
        self.no_backslash_escapes = no_backslash_escapes;
        Ok(())
    }
}

fn read_sql_mode(conn: &mut Conn) -> std::result::Result<String, mysql::Error> {
    Ok(conn
        .query_first::<String, _>("SELECT @@SESSION.sql_mode")?
        .unwrap_or_default())
}

fn has_no_backslash_escapes(sql_mode: &str) -> bool {
    sql_mode
        .split(',')
        .any(|mode| mode.trim().eq_ignore_ascii_case("NO_BACKSLASH_ESCAPES"))
}

fn touches_sql_mode(sql: &str) -> bool {
    sql.to_ascii_lowercase().contains("sql_mode")
}

fn to_value(value: mysql::Value) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Blob(e.into_bytes()),
        },
        mysql::Value::Int(i) => Value::Integer(i),
        mysql::Value::UInt(u) => i64::try_from(u)
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(u.to_string())),
        mysql::Value::Float(f) => Value::Real(f64::from(f)),
        mysql::Value::Double(f) => Value::Real(f),
        mysql::Value::Date(y, mo, d, h, mi, s, us) => Value::Text(if us == 0 {
            format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, mo, d, h, mi, s)
        } else {
            format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}", y, mo, d, h, mi, s, us)
        }),
        mysql::Value::Time(neg, days, h, mi, s, us) => {
            let hours = days * 24 + u32::from(h);
            let sign = if neg { "-" } else { "" };
            Value::Text(if us == 0 {
                format!("{}{:02}:{:02}:{:02}", sign, hours, mi, s)
            } else {
                format!("{}{:02}:{:02}:{:02}.{:06}", sign, hours, mi, s, us)
            })
        }
    }
}

impl Escape for MysqlSession {
    fn escape(&self, value: &str) -> String {
        if self.no_backslash_escapes {
            escape_mysql_quotes(value)
        } else {
            escape_mysql(value)
        }
    }
}

impl Session for MysqlSession {
    fn execute(&mut self, sql: &str) -> Result<Outcome> {
        let outcome = self.run(sql)?;
        if touches_sql_mode(sql) {
            self.refresh_sql_mode()?;
        }
        Ok(outcome)
    }

    fn last_insert_id(&self) -> u64 {
        self.conn.last_insert_id()
    }

    fn backend_name(&self) -> &'static str {
        "mysql"
    }

    fn begin(&mut self) -> Result<()> {
        self.conn.query_drop("START TRANSACTION")?;
        Ok(())
    }

    fn close(self) -> Result<()> {
        // The driver sends COM_QUIT when the connection is dropped.
        drop(self.conn);
        debug!("closed mysql connection");
        Ok(())
    }
}
