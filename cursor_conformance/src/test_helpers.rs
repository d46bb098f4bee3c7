//! Helpers shared by unit, integration and e2e tests.

use std::sync::Once;

static DOTENV: Once = Once::new();

/// Loads `.env` once per process. A missing file is not an error.
pub fn load_dotenv() {
    DOTENV.call_once(|| {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
    });
}

/// `ENABLE_E2E_TESTS` set to a true value.
pub fn e2e_enabled() -> bool {
    load_dotenv();
    std::env::var("ENABLE_E2E_TESTS")
        .ok()
        .as_deref()
        .and_then(crate::config::parse_env_bool)
        == Some(true)
}
