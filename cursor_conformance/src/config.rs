use crate::driver::SessionOptions;
use crate::error::{ConformanceError, Result};
use crate::migration::{self, Migration};
use std::path::PathBuf;

pub const DEFAULT_ODBC_DRIVER: &str = "DuckDB Driver";

const ENV_ODBC_DRIVER: &str = "CONFORMANCE_ODBC_DRIVER";
const ENV_READ_ONLY: &str = "CONFORMANCE_READ_ONLY";
const ENV_STREAM_RESULTS: &str = "CONFORMANCE_STREAM_RESULTS";
const ENV_INIT_SQL: &str = "CONFORMANCE_INIT_SQL";
const ENV_MIGRATIONS_DIR: &str = "CONFORMANCE_MIGRATIONS_DIR";
const ENV_LOGIN_TIMEOUT_SECS: &str = "CONFORMANCE_LOGIN_TIMEOUT_SECS";

/// Accepts `1/true/yes/y` and `0/false/no/n`, case-insensitive.
pub fn parse_env_bool(raw: &str) -> Option<bool> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    match normalized.as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub odbc_driver: String,
    pub session: SessionOptions,
    /// Run on the session under test before the action, e.g. `LOAD spatial`.
    pub init_sql: Vec<String>,
    /// Migrations are read from here instead of the embedded fixture.
    pub migrations_dir: Option<PathBuf>,
    pub login_timeout_secs: Option<u32>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            odbc_driver: DEFAULT_ODBC_DRIVER.to_string(),
            session: SessionOptions::default(),
            init_sql: Vec::new(),
            migrations_dir: None,
            login_timeout_secs: None,
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(driver) = lookup(ENV_ODBC_DRIVER) {
            config.odbc_driver = driver.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_READ_ONLY) {
            config.session.read_only = bool_setting(ENV_READ_ONLY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STREAM_RESULTS) {
            config.session.stream_results = bool_setting(ENV_STREAM_RESULTS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_INIT_SQL) {
            config.init_sql = raw
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(dir) = lookup(ENV_MIGRATIONS_DIR) {
            config.migrations_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(raw) = lookup(ENV_LOGIN_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u32>().map_err(|_| {
                ConformanceError::Validation(format!(
                    "{} must be a number of seconds, got '{}'",
                    ENV_LOGIN_TIMEOUT_SECS, raw
                ))
            })?;
            config.login_timeout_secs = Some(secs);
        }
        Ok(config)
    }

    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    pub fn with_init_sql(mut self, statements: &[&str]) -> Self {
        self.init_sql = statements.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Migrations from `migrations_dir`, or the embedded fixture.
    pub fn migrations(&self) -> Result<Vec<Migration>> {
        match &self.migrations_dir {
            Some(dir) => migration::load_dir(dir),
            None => migration::embedded(),
        }
    }
}

fn bool_setting(key: &str, raw: &str) -> Result<bool> {
    parse_env_bool(raw).ok_or_else(|| {
        ConformanceError::Validation(format!("{} must be a boolean, got '{}'", key, raw))
    })
}
