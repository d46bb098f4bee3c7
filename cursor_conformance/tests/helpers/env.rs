//! Environment lookups for e2e tests.

use cursor_conformance::test_helpers::load_dotenv;
use cursor_conformance::HarnessConfig;

/// Harness configuration from `CONFORMANCE_*` variables (and `.env`).
/// Returns None when the variables are malformed; tests should skip.
pub fn e2e_config() -> Option<HarnessConfig> {
    load_dotenv();
    match HarnessConfig::from_env() {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("[ERROR] Invalid CONFORMANCE_* settings: {}", e);
            None
        }
    }
}

/// Same as [`e2e_config`] with the spatial extension loaded on the session.
#[allow(dead_code)]
pub fn e2e_spatial_config() -> Option<HarnessConfig> {
    let mut config = e2e_config()?;
    if config.init_sql.is_empty() {
        config = config.with_init_sql(&["INSTALL spatial", "LOAD spatial"]);
    }
    Some(config)
}
