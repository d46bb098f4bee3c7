//! Runs an action against a freshly migrated, ephemeral database.

use crate::config::HarnessConfig;
use crate::driver::{Session, SessionOptions};
use crate::error::{ConformanceError, Result};
use crate::migration::Migration;
use crate::observability::SuiteLogger;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the database inside the per-run temporary directory.
pub const DATABASE_FILE: &str = "fixture.duckdb";

/// Creates, migrates and opens databases of one driver.
pub trait Backend {
    fn name(&self) -> &'static str;

    /// Brings the database at `location` up to date, creating it when it
    /// does not exist. Returns the number of migrations applied.
    fn migrate(&self, location: &Path, migrations: &[Migration]) -> Result<usize>;

    fn connect(&self, location: &Path, options: SessionOptions) -> Result<Box<dyn Session>>;
}

/// The session handed to an action, with the file it is connected to.
pub struct FreshDatabase {
    session: Box<dyn Session>,
    location: PathBuf,
}

impl FreshDatabase {
    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    pub fn location(&self) -> &Path {
        &self.location
    }
}

/// Creates a temporary directory, migrates a database inside it, connects
/// with `options`, runs the configured init SQL and calls `action` once.
///
/// Failures before `action` runs are returned as setup failures. The
/// session is closed and the directory removed on every path.
pub fn with_fresh_database<T, F>(
    backend: &dyn Backend,
    config: &HarnessConfig,
    options: SessionOptions,
    action: F,
) -> Result<T>
where
    F: FnOnce(&FreshDatabase) -> Result<T>,
{
    let logger = SuiteLogger::default();
    let dir = tempfile::Builder::new()
        .prefix("cursor-conformance-")
        .tempdir()
        .map_err(|e| ConformanceError::from(e).into_setup())?;

    let result = run_in(dir.path(), backend, config, options, action, &logger);

    let dir_path = dir.path().to_path_buf();
    match dir.close() {
        Ok(()) => log::debug!("Removed {}", dir_path.display()),
        Err(e) if result.is_ok() => {
            return Err(ConformanceError::from(e).into_setup());
        }
        Err(e) => log::warn!("Failed to remove {}: {}", dir_path.display(), e),
    }
    result
}

fn run_in<T, F>(
    dir: &Path,
    backend: &dyn Backend,
    config: &HarnessConfig,
    options: SessionOptions,
    action: F,
    logger: &SuiteLogger,
) -> Result<T>
where
    F: FnOnce(&FreshDatabase) -> Result<T>,
{
    let location = dir.join(DATABASE_FILE);
    let database = open_fresh(&location, backend, config, options, logger)
        .map_err(|e| e.into_setup())?;

    let result = action(&database);
    drop(database);

    logger.log_session(backend.name(), "closed", &BTreeMap::new());
    result
}

fn open_fresh(
    location: &Path,
    backend: &dyn Backend,
    config: &HarnessConfig,
    options: SessionOptions,
    logger: &SuiteLogger,
) -> Result<FreshDatabase> {
    let migrations = config.migrations()?;
    let applied = backend.migrate(location, &migrations)?;
    logger.log_migration(backend.name(), applied);

    let session = backend.connect(location, options)?;
    let mut metadata = BTreeMap::new();
    metadata.insert("read_only", options.read_only.to_string());
    metadata.insert("stream_results", options.stream_results.to_string());
    logger.log_session(backend.name(), "opened", &metadata);

    for statement in &config.init_sql {
        session.execute(statement, &[])?;
    }

    Ok(FreshDatabase {
        session,
        location: location.to_path_buf(),
    })
}
