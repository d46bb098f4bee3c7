//! ODBC backend, used against the DuckDB ODBC driver.

mod cell_reader;
mod cursor;
mod statement;

pub use cursor::OdbcCursor;
pub use statement::{OdbcAdHocStatement, OdbcPreparedStatement};

use crate::driver::catalog::{list_columns_query, LIST_TABLES_SQL};
use crate::driver::{param_values_to_strings, Cursor, ParamValue, Session, SessionOptions, Statement};
use crate::error::{ConformanceError, Result};
use crate::harness::Backend;
use crate::migration::{Migration, Migrator, SqlHistoryStore};
use odbc_api::{Connection, ConnectionOptions, Environment};
use statement::with_text_params;
use std::path::Path;

lazy_static::lazy_static! {
    static ref ENVIRONMENT: std::result::Result<Environment, String> =
        Environment::new().map_err(|e| format!("Failed to create ODBC environment: {}", e));
}

fn environment() -> Result<&'static Environment> {
    match &*ENVIRONMENT {
        Ok(env) => Ok(env),
        Err(msg) => Err(ConformanceError::Setup(msg.clone())),
    }
}

/// Connection string for a DuckDB database file.
pub fn build_duckdb_conn_str(driver: &str, path: &Path, read_only: bool) -> String {
    let access_mode = if read_only { "READ_ONLY" } else { "READ_WRITE" };
    format!(
        "Driver={{{}}};Database={};access_mode={};",
        driver,
        path.display(),
        access_mode
    )
}

pub struct OdbcSession {
    conn: Connection<'static>,
    options: SessionOptions,
}

impl OdbcSession {
    pub fn connect(conn_str: &str, options: SessionOptions, login_timeout_sec: Option<u32>) -> Result<Self> {
        let env = environment()?;
        let opts = ConnectionOptions {
            login_timeout_sec,
            ..ConnectionOptions::default()
        };
        let conn = env
            .connect_with_connection_string(conn_str, opts)
            .map_err(ConformanceError::from)?;
        log::debug!(
            "ODBC session opened (read_only={}, stream_results={})",
            options.read_only,
            options.stream_results
        );
        Ok(Self { conn, options })
    }
}

impl Session for OdbcSession {
    fn backend(&self) -> &'static str {
        "odbc"
    }

    fn options(&self) -> SessionOptions {
        self.options
    }

    fn execute(&self, sql: &str, params: &[ParamValue]) -> Result<()> {
        let strings = param_values_to_strings(params)?;
        let conn = &self.conn;
        with_text_params!(&strings, |p| {
            conn.execute(sql, p, None).map_err(ConformanceError::from)?;
        });
        Ok(())
    }

    fn create_statement(&self, sql: &str) -> Result<Box<dyn Statement + '_>> {
        Ok(Box::new(OdbcAdHocStatement::new(
            &self.conn,
            sql,
            self.options.stream_results,
        )))
    }

    fn prepare(&self, sql: &str) -> Result<Box<dyn Statement + '_>> {
        Ok(Box::new(OdbcPreparedStatement::prepare(
            &self.conn,
            sql,
            self.options.stream_results,
        )?))
    }

    fn list_tables(&self) -> Result<Box<dyn Cursor + '_>> {
        let cursor = self
            .conn
            .execute(LIST_TABLES_SQL, (), None)
            .map_err(ConformanceError::from)?
            .ok_or_else(|| ConformanceError::Validation("Table listing returned no result set".to_string()))?;
        Ok(Box::new(OdbcCursor::open(cursor, self.options.stream_results)?))
    }

    fn list_columns(&self, table: &str) -> Result<Box<dyn Cursor + '_>> {
        let (sql, params) = list_columns_query(table)?;
        let strings = param_values_to_strings(&params)?;
        let conn = &self.conn;
        let cursor = with_text_params!(&strings, |p| conn
            .execute(&sql, p, None)
            .map_err(ConformanceError::from)?)
        .ok_or_else(|| ConformanceError::Validation("Column listing returned no result set".to_string()))?;
        Ok(Box::new(OdbcCursor::open(cursor, self.options.stream_results)?))
    }
}

/// Creates DuckDB database files through an installed ODBC driver.
#[derive(Debug, Clone)]
pub struct OdbcBackend {
    driver: String,
    login_timeout_sec: Option<u32>,
}

impl OdbcBackend {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            login_timeout_sec: None,
        }
    }

    pub fn with_login_timeout(mut self, secs: Option<u32>) -> Self {
        self.login_timeout_sec = secs;
        self
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }
}

impl Backend for OdbcBackend {
    fn name(&self) -> &'static str {
        "odbc"
    }

    fn migrate(&self, location: &Path, migrations: &[Migration]) -> Result<usize> {
        let writable = SessionOptions {
            read_only: false,
            stream_results: true,
        };
        let conn_str = build_duckdb_conn_str(&self.driver, location, false);
        let session = OdbcSession::connect(&conn_str, writable, self.login_timeout_sec)?;
        let mut store = SqlHistoryStore::new(&session);
        Migrator::new(migrations.to_vec()).migrate(&mut store)
    }

    fn connect(&self, location: &Path, options: SessionOptions) -> Result<Box<dyn Session>> {
        let conn_str = build_duckdb_conn_str(&self.driver, location, options.read_only);
        Ok(Box::new(OdbcSession::connect(
            &conn_str,
            options,
            self.login_timeout_sec,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_duckdb_conn_str_read_only() {
        let path = PathBuf::from("/tmp/x/fixture.duckdb");
        assert_eq!(
            build_duckdb_conn_str("DuckDB Driver", &path, true),
            "Driver={DuckDB Driver};Database=/tmp/x/fixture.duckdb;access_mode=READ_ONLY;"
        );
    }

    #[test]
    fn test_build_duckdb_conn_str_read_write() {
        let path = PathBuf::from("db.duckdb");
        assert!(build_duckdb_conn_str("DuckDB", &path, false).ends_with("access_mode=READ_WRITE;"));
    }

    #[test]
    fn test_backend_keeps_driver_and_timeout() {
        let backend = OdbcBackend::new("DuckDB Driver").with_login_timeout(Some(5));
        assert_eq!(backend.driver(), "DuckDB Driver");
        assert_eq!(backend.login_timeout_sec, Some(5));
        assert_eq!(backend.name(), "odbc");
    }
}
