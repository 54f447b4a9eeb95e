//! CRUD operation types and their SQL rendering.
//!
//! Table and column names are trusted and emitted verbatim. Every value goes
//! through the session's [`Escape`] before it reaches the statement text.
//! Rendering refuses input that would produce malformed SQL or an
//! unfiltered UPDATE/DELETE; the unfiltered forms have their own
//! constructors.

use crate::error::{Error, Result};
use crate::escape::Escape;
use crate::value::{Conditions, Value};

/// Sort direction for ORDER BY
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl Order {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// CRUD operation types
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOperation {
    pub table: String,
    pub data: Conditions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkCreateOperation {
    pub table: String,
    pub fields: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOperation {
    pub table: String,
    pub conditions: Conditions,
    pub fields: Option<Vec<String>>,
    pub limit: Option<u64>,
    pub order_by: Option<(String, Order)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOperation {
    pub table: String,
    pub conditions: Conditions,
    pub updates: Conditions,
    /// Allow an empty `conditions` to update every row
    pub all_rows: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOperation {
    pub table: String,
    pub conditions: Conditions,
    /// Allow an empty `conditions` to delete every row
    pub all_rows: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrudOperation {
    Create(CreateOperation),
    BulkCreate(BulkCreateOperation),
    Read(ReadOperation),
    Update(UpdateOperation),
    Delete(DeleteOperation),
}

impl CrudOperation {
    pub fn to_sql<E: Escape + ?Sized>(&self, escaper: &E) -> Result<String> {
        match self {
            CrudOperation::Create(op) => op.to_sql(escaper),
            CrudOperation::BulkCreate(op) => op.to_sql(escaper),
            CrudOperation::Read(op) => op.to_sql(escaper),
            CrudOperation::Update(op) => op.to_sql(escaper),
            CrudOperation::Delete(op) => op.to_sql(escaper),
        }
    }
}

/// Neither dialect has a literal for NaN or an infinity; `'NaN'` would be
/// coerced to 0 or stored as text.
fn reject_non_finite<'v>(table: &str, values: impl IntoIterator<Item = &'v Value>) -> Result<()> {
    match values
        .into_iter()
        .find(|v| matches!(v, Value::Real(f) if !f.is_finite()))
    {
        Some(value) => Err(Error::InvalidOperation(format!(
            "non-finite number {:?} for table {}",
            value, table
        ))),
        None => Ok(()),
    }
}

/// `a='x' AND b IS NULL`
fn where_clause<E: Escape + ?Sized>(escaper: &E, conditions: &Conditions) -> String {
    conditions
        .iter()
        .map(|(column, value)| match value {
            Value::Null => format!("{} IS NULL", column),
            v => format!("{}={}", column, escaper.literal(v)),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn values_tuple<'v, E: Escape + ?Sized>(
    escaper: &E,
    values: impl Iterator<Item = &'v Value>,
) -> String {
    let rendered: Vec<String> = values.map(|v| escaper.literal(v)).collect();
    format!("({})", rendered.join(","))
}

impl CreateOperation {
    pub fn new(table: &str, data: Conditions) -> Self {
        Self {
            table: table.to_string(),
            data,
        }
    }

    pub fn to_sql<E: Escape + ?Sized>(&self, escaper: &E) -> Result<String> {
        if self.data.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "insert into {} without any column",
                self.table
            )));
        }
        reject_non_finite(&self.table, self.data.values())?;
        let columns: Vec<&str> = self.data.columns().collect();
        Ok(format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            columns.join(","),
            values_tuple(escaper, self.data.values())
        ))
    }
}

impl BulkCreateOperation {
    pub fn new(table: &str, fields: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            table: table.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            rows,
        }
    }

    pub fn to_sql<E: Escape + ?Sized>(&self, escaper: &E) -> Result<String> {
        if self.fields.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "bulk insert into {} without any field",
                self.table
            )));
        }
        if self.rows.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "bulk insert into {} without any row",
                self.table
            )));
        }
        if let Some((i, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.fields.len())
        {
            return Err(Error::InvalidOperation(format!(
                "bulk insert row {} has {} values for {} fields",
                i,
                row.len(),
                self.fields.len()
            )));
        }
        reject_non_finite(&self.table, self.rows.iter().flatten())?;
        let tuples: Vec<String> = self
            .rows
            .iter()
            .map(|row| values_tuple(escaper, row.iter()))
            .collect();
        Ok(format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            self.fields.join(","),
            tuples.join(",")
        ))
    }
}

impl ReadOperation {
    /// `SELECT * FROM table` with no filter, order or limit
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            conditions: Conditions::new(),
            fields: None,
            limit: None,
            order_by: None,
        }
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_order(mut self, column: &str, order: Order) -> Self {
        self.order_by = Some((column.to_string(), order));
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_sql<E: Escape + ?Sized>(&self, escaper: &E) -> Result<String> {
        let fields = match &self.fields {
            Some(fields) if fields.is_empty() => {
                return Err(Error::InvalidOperation(format!(
                    "select from {} with an empty field list",
                    self.table
                )))
            }
            Some(fields) => fields.join(","),
            None => "*".to_string(),
        };
        reject_non_finite(&self.table, self.conditions.values())?;
        let mut sql = format!("SELECT {} FROM {}", fields, self.table);
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause(escaper, &self.conditions));
        }
        if let Some((column, order)) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {} {}", column, order.as_sql()));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        Ok(sql)
    }
}

impl UpdateOperation {
    /// Update the rows matching `conditions`; rendering fails if it is empty
    pub fn new(table: &str, updates: Conditions, conditions: Conditions) -> Self {
        Self {
            table: table.to_string(),
            conditions,
            updates,
            all_rows: false,
        }
    }

    /// Update every row of the table
    pub fn all(table: &str, updates: Conditions) -> Self {
        Self {
            table: table.to_string(),
            conditions: Conditions::new(),
            updates,
            all_rows: true,
        }
    }

    pub fn to_sql<E: Escape + ?Sized>(&self, escaper: &E) -> Result<String> {
        if self.updates.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "update of {} without any column to set",
                self.table
            )));
        }
        if self.conditions.is_empty() && !self.all_rows {
            return Err(Error::InvalidOperation(format!(
                "update of {} without conditions; use update_all to touch every row",
                self.table
            )));
        }
        reject_non_finite(
            &self.table,
            self.updates.values().chain(self.conditions.values()),
        )?;
        let assignments: Vec<String> = self
            .updates
            .iter()
            .map(|(column, value)| format!("{}={}", column, escaper.literal(value)))
            .collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(","));
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause(escaper, &self.conditions));
        }
        Ok(sql)
    }
}

impl DeleteOperation {
    /// Delete the rows matching `conditions`; rendering fails if it is empty
    pub fn new(table: &str, conditions: Conditions) -> Self {
        Self {
            table: table.to_string(),
            conditions,
            all_rows: false,
        }
    }

    /// Delete every row of the table
    pub fn all(table: &str) -> Self {
        Self {
            table: table.to_string(),
            conditions: Conditions::new(),
            all_rows: true,
        }
    }

    pub fn to_sql<E: Escape + ?Sized>(&self, escaper: &E) -> Result<String> {
        if self.conditions.is_empty() && !self.all_rows {
            return Err(Error::InvalidOperation(format!(
                "delete from {} without conditions; use delete_all to remove every row",
                self.table
            )));
        }
        reject_non_finite(&self.table, self.conditions.values())?;
        let mut sql = format!("DELETE FROM {}", self.table);
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause(escaper, &self.conditions));
        }
        Ok(sql)
    }
}
