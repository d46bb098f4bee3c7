//! Helper functions for E2E tests.
//! Decides whether the DuckDB ODBC driver is configured and reachable.
use super::env::e2e_config;
use cursor_conformance::driver::odbc::{build_duckdb_conn_str, OdbcSession};
use cursor_conformance::test_helpers::e2e_enabled;
use cursor_conformance::{OdbcBackend, SessionOptions};
use std::path::Path;

/// Backend for the configured driver.
#[allow(dead_code)]
pub fn e2e_backend() -> Option<OdbcBackend> {
    let config = e2e_config()?;
    Some(OdbcBackend::new(config.odbc_driver).with_login_timeout(config.login_timeout_secs))
}

/// Opens an in-memory DuckDB database through the configured driver.
/// Returns `true` when the driver is installed and answers.
#[allow(dead_code)]
pub fn can_connect_to_duckdb() -> bool {
    let Some(config) = e2e_config() else {
        return false;
    };

    let conn_str = build_duckdb_conn_str(&config.odbc_driver, Path::new(":memory:"), false);
    let options = SessionOptions {
        read_only: false,
        stream_results: true,
    };
    match OdbcSession::connect(&conn_str, options, config.login_timeout_secs) {
        Ok(_) => {
            eprintln!("[OK] Connection successful with driver {}", config.odbc_driver);
            true
        }
        Err(e) => {
            eprintln!("[ERROR] Connection failed: {:?}", e);
            eprintln!("  Connection string: {}", conn_str);
            false
        }
    }
}

/// Checks whether E2E tests should run.
/// Runs only when ENABLE_E2E_TESTS is explicitly enabled and the driver
/// can be reached.
#[allow(dead_code)]
pub fn should_run_e2e_tests() -> bool {
    if !e2e_enabled() {
        return false;
    }
    can_connect_to_duckdb()
}
