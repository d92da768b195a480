//! Storage backend for cadastre tables
//!
//! The import pipeline talks to storage only through the [`Backend`] trait:
//! - Generic `select` over a named table with simple filters
//! - Bulk `insert` that is atomic per call
//! - `update` and soft deletion through the `ativo` flag
//!
//! Two implementations are provided: [`SqliteBackend`] for project databases
//! and [`MemoryBackend`] for in-process use. Both enforce the same unique
//! constraints (case-insensitive, active rows only).

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use std::collections::BTreeMap;
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

/// Primary key column present on every table
pub const ID_COLUMN: &str = "id";

/// Soft-delete flag present on every table
pub const ACTIVE_COLUMN: &str = "ativo";

/// Creation timestamp present on every table
pub const CREATED_COLUMN: &str = "criado_em";

/// A scalar cell value stored in a backend table
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness as stored by SQLite (0/1 integers)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", if *b { "sim" } else { "não" }),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One table row: column name to scalar value
pub type Record = BTreeMap<String, Value>;

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Bool,
}

impl ColumnKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Integer | ColumnKind::Bool => "INTEGER",
            ColumnKind::Real => "REAL",
        }
    }
}

/// Column definition (the implicit id/ativo/criado_em columns are not listed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub not_null: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            not_null: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// Table definition shared by all backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Columns that must be unique (case-insensitive) among active rows
    pub unique: Vec<String>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            unique: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        if !self.columns.iter().any(|c| c.name == column.name) {
            self.columns.push(column);
        }
        self
    }

    pub fn unique(mut self, column: impl Into<String>) -> Self {
        self.unique.push(column.into());
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        name == ID_COLUMN
            || name == ACTIVE_COLUMN
            || name == CREATED_COLUMN
            || self.columns.iter().any(|c| c.name == name)
    }
}

/// A row filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals value
    Eq(String, Value),
    /// Column (text) matches any of the keys, ignoring case
    InIgnoreCase(String, Vec<String>),
}

/// A select over one table
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<String>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    /// Only rows not soft-deleted
    pub fn active(self) -> Self {
        self.filter_eq(ACTIVE_COLUMN, true)
    }

    pub fn filter_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn filter_in_ignore_case(mut self, column: impl Into<String>, keys: Vec<String>) -> Self {
        self.filters.push(Filter::InIgnoreCase(column.into(), keys));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }
}

/// Errors raised by a storage backend
#[derive(Debug, Error, Diagnostic)]
pub enum BackendError {
    #[error("unknown table '{0}'")]
    #[diagnostic(code(cadastro::backend::unknown_table))]
    UnknownTable(String),

    #[error("unknown column '{column}' in table '{table}'")]
    #[diagnostic(code(cadastro::backend::unknown_column))]
    UnknownColumn { table: String, column: String },

    #[error("constraint violation on '{table}': {message}")]
    #[diagnostic(
        code(cadastro::backend::constraint),
        help("another record with the same key may have been inserted concurrently")
    )]
    Constraint { table: String, message: String },

    #[error("record {id} not found in '{table}'")]
    #[diagnostic(code(cadastro::backend::not_found))]
    NotFound { table: String, id: i64 },

    #[error("database error: {0}")]
    #[diagnostic(code(cadastro::backend::database))]
    Database(String),
}

/// Generic query/insert/update interface over named tables
pub trait Backend {
    /// Read rows matching the query, including the implicit columns
    fn select(&self, query: &Query) -> Result<Vec<Record>, BackendError>;

    /// Insert all rows or none; returns the new ids in input order
    fn insert(&mut self, table: &str, rows: &[Record]) -> Result<Vec<i64>, BackendError>;

    /// Apply column changes to a single row
    fn update(&mut self, table: &str, id: i64, changes: &Record) -> Result<(), BackendError>;

    /// Soft delete: the row stays but is excluded from active queries
    fn deactivate(&mut self, table: &str, id: i64) -> Result<(), BackendError> {
        let mut changes = Record::new();
        changes.insert(ACTIVE_COLUMN.to_string(), Value::Bool(false));
        self.update(table, id, &changes)
    }
}

/// Case folding used for every natural-key comparison
pub fn fold_key(key: &str) -> String {
    key.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from("abc"), Value::Text("abc".to_string()));
        assert_eq!(Value::from(Some(3_i64)), Value::Integer(3));
        assert_eq!(Value::from(None::<f64>), Value::Null);
        assert_eq!(Value::Integer(1).as_bool(), Some(true));
        assert_eq!(Value::Integer(0).as_bool(), Some(false));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Real(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(true).to_string(), "sim");
    }

    #[test]
    fn test_table_def_implicit_columns() {
        let def = TableDef::new("linhas")
            .column(ColumnDef::new("nome", ColumnKind::Text).not_null())
            .unique("nome");
        assert!(def.has_column("id"));
        assert!(def.has_column("ativo"));
        assert!(def.has_column("nome"));
        assert!(!def.has_column("outra"));
    }

    #[test]
    fn test_fold_key() {
        assert_eq!(fold_key("  Linha A "), "linha a");
        assert_eq!(fold_key("ÁREA"), "área");
    }
}
