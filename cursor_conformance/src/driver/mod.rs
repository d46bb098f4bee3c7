//! Driver seam the conformance scenarios run against.
//!
//! A [`Session`] hands out [`Statement`]s and metadata cursors; executing a
//! statement yields a [`Cursor`] that borrows it. Backends decide how rows
//! are fetched; the scenarios only observe positions, values and the
//! open/closed flags.

pub mod catalog;
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
pub mod odbc;
pub mod param_value;
pub mod types;
pub mod value;

use crate::error::{ConformanceError, Result};
use serde::{Deserialize, Serialize};

pub use param_value::{param_values_to_strings, ParamValue};
pub use types::{ColumnInfo, ColumnType};
pub use value::Value;

/// 1-based position of TABLE_NAME in a [`Session::list_tables`] cursor.
pub const TABLES_NAME_COLUMN: usize = 3;
/// 1-based position of COLUMN_NAME in a [`Session::list_columns`] cursor.
pub const COLUMNS_NAME_COLUMN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Parsed once, executed with bound parameters.
    Prepared,
    /// Executed directly from its SQL text, no parameters.
    AdHoc,
}

/// Per-connection options of the session under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub read_only: bool,
    /// Pull rows from the driver on every advance instead of buffering the
    /// whole result when the cursor opens.
    pub stream_results: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_only: true,
            stream_results: true,
        }
    }
}

pub trait Session {
    fn backend(&self) -> &'static str;

    fn options(&self) -> SessionOptions;

    /// Runs a statement that produces no result set.
    fn execute(&self, sql: &str, params: &[ParamValue]) -> Result<()>;

    fn create_statement(&self, sql: &str) -> Result<Box<dyn Statement + '_>>;

    fn prepare(&self, sql: &str) -> Result<Box<dyn Statement + '_>>;

    /// TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE
    fn list_tables(&self) -> Result<Box<dyn Cursor + '_>>;

    /// TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME, COLUMN_NAME,
    /// ORDINAL_POSITION, DATA_TYPE, IS_NULLABLE
    fn list_columns(&self, table: &str) -> Result<Box<dyn Cursor + '_>>;
}

pub trait Statement {
    fn kind(&self) -> StatementKind;

    fn sql(&self) -> &str;

    fn execute(&mut self, params: &[ParamValue]) -> Result<Box<dyn Cursor + '_>>;

    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

pub trait Cursor {
    fn columns(&self) -> &[ColumnInfo];

    /// Moves to the next row. `Ok(false)` is the end-of-data signal.
    fn advance(&mut self) -> Result<bool>;

    /// Number of rows yielded so far.
    fn position(&self) -> usize;

    /// Value of the current row, 1-based column like JDBC/ODBC.
    fn value(&self, column: usize) -> Result<&Value>;

    fn close(&mut self) -> Result<()>;

    /// Closed explicitly, or reported closed by the driver.
    fn is_closed(&self) -> bool;

    /// Whether the statement that produced this cursor is closed.
    fn statement_is_closed(&mut self) -> bool;

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns()
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .map(|i| i + 1)
            .ok_or_else(|| ConformanceError::ColumnNotFound(name.to_string()))
    }

    fn text(&self, column: usize) -> Result<&str> {
        match self.value(column)? {
            Value::Text(s) => Ok(s),
            other => Err(ConformanceError::TypeMismatch {
                column,
                expected: "text",
                found: other.type_name(),
            }),
        }
    }

    fn integer(&self, column: usize) -> Result<i64> {
        match self.value(column)? {
            Value::Integer(n) => Ok(*n),
            other => Err(ConformanceError::TypeMismatch {
                column,
                expected: "integer",
                found: other.type_name(),
            }),
        }
    }

    fn text_by_name(&self, name: &str) -> Result<&str> {
        let column = self.column_index(name)?;
        self.text(column)
    }

    fn value_by_name(&self, name: &str) -> Result<&Value> {
        let column = self.column_index(name)?;
        self.value(column)
    }
}

/// Checks a 1-based column number against a row and returns its value.
pub(crate) fn row_value(row: Option<&[Value]>, column: usize) -> Result<&Value> {
    let row = row.ok_or(ConformanceError::NoCurrentRow)?;
    if column == 0 || column > row.len() {
        return Err(ConformanceError::ColumnNotFound(format!(
            "#{} (row has {} columns)",
            column,
            row.len()
        )));
    }
    Ok(&row[column - 1])
}
