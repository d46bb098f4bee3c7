//! Versioned fixture migrations with validate-on-migrate.
//!
//! Scripts are named `V<version>__<description>.sql`. Every applied script
//! is recorded in a history table together with its CRC32 checksum; a run
//! refuses to continue when the recorded history and the local scripts
//! disagree.

mod history;
mod splitter;

pub use history::{AppliedMigration, HistoryStore, SqlHistoryStore, HISTORY_TABLE};
pub use splitter::split_statements;

use crate::error::{ConformanceError, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const EMBEDDED: &[(&str, &str)] = &[
    (
        "V1__create_author.sql",
        include_str!("../../migrations/V1__create_author.sql"),
    ),
    (
        "V2__create_book.sql",
        include_str!("../../migrations/V2__create_book.sql"),
    ),
    (
        "V3__insert_fixture_data.sql",
        include_str!("../../migrations/V3__insert_fixture_data.sql"),
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub description: String,
    pub script: String,
    pub checksum: u32,
}

impl Migration {
    pub fn new(version: u32, description: impl Into<String>, script: impl Into<String>) -> Self {
        let script = script.into();
        let checksum = checksum(&script);
        Self {
            version,
            description: description.into(),
            script,
            checksum,
        }
    }

    /// Parses `V<version>__<description>.sql`.
    pub fn from_file_name(file_name: &str, script: impl Into<String>) -> Result<Self> {
        let (version, description) = parse_file_name(file_name)?;
        Ok(Self::new(version, description, script))
    }

    pub fn script_name(&self) -> String {
        format!("V{}__{}.sql", self.version, self.description.replace(' ', "_"))
    }
}

fn parse_file_name(file_name: &str) -> Result<(u32, String)> {
    let invalid = || ConformanceError::MigrationName(file_name.to_string());

    let stem = file_name.strip_suffix(".sql").ok_or_else(invalid)?;
    let rest = stem.strip_prefix('V').ok_or_else(invalid)?;
    let (version, description) = rest.split_once("__").ok_or_else(invalid)?;
    let version = version.parse::<u32>().map_err(|_| invalid())?;
    if description.is_empty() {
        return Err(invalid());
    }
    Ok((version, description.replace('_', " ")))
}

/// CRC32 of the script with line endings normalized to LF.
pub fn checksum(script: &str) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for line in script.lines() {
        hasher.update(line.trim_end_matches('\r').as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize()
}

/// The fixture schema compiled into the crate.
pub fn embedded() -> Result<Vec<Migration>> {
    EMBEDDED
        .iter()
        .map(|(name, script)| Migration::from_file_name(name, *script))
        .collect()
}

/// Reads every `V*.sql` file of `dir`. Other files are ignored.
pub fn load_dir(dir: &Path) -> Result<Vec<Migration>> {
    let mut migrations = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with('V') || !name.ends_with(".sql") {
            continue;
        }
        let script = std::fs::read_to_string(&path)?;
        migrations.push(Migration::from_file_name(name, script)?);
    }
    migrations.sort_by_key(|m| m.version);
    log::debug!("Loaded {} migrations from {}", migrations.len(), dir.display());
    Ok(migrations)
}

pub struct Migrator {
    migrations: Vec<Migration>,
}

impl Migrator {
    pub fn new(migrations: Vec<Migration>) -> Self {
        Self { migrations }
    }

    /// Validates the recorded history against the local scripts, then
    /// applies pending scripts in version order. Returns how many ran.
    pub fn migrate(&self, store: &mut dyn HistoryStore) -> Result<usize> {
        let local = self.resolve()?;
        store.ensure_table()?;
        let applied = store.applied()?;
        validate(&local, &applied)?;

        let applied_versions: HashSet<u32> = applied.iter().map(|a| a.version).collect();
        let mut next_rank = applied.iter().map(|a| a.installed_rank).max().unwrap_or(0) + 1;
        let mut count = 0;

        for migration in local.values() {
            if applied_versions.contains(&migration.version) {
                continue;
            }
            log::info!("Applying migration {}", migration.script_name());
            store.apply(migration, next_rank)?;
            next_rank += 1;
            count += 1;
        }

        if count == 0 {
            log::debug!("Schema is up to date");
        }
        Ok(count)
    }

    fn resolve(&self) -> Result<BTreeMap<u32, &Migration>> {
        let mut local = BTreeMap::new();
        for migration in &self.migrations {
            if local.insert(migration.version, migration).is_some() {
                return Err(ConformanceError::DuplicateMigration(migration.version));
            }
        }
        Ok(local)
    }
}

fn validate(local: &BTreeMap<u32, &Migration>, applied: &[AppliedMigration]) -> Result<()> {
    for entry in applied {
        if !entry.success {
            return Err(ConformanceError::FailedMigration(entry.version));
        }
        let migration = local
            .get(&entry.version)
            .ok_or(ConformanceError::MissingMigration(entry.version))?;
        if migration.checksum != entry.checksum {
            return Err(ConformanceError::ChecksumMismatch {
                version: entry.version,
                applied: entry.checksum,
                local: migration.checksum,
            });
        }
        if migration.description != entry.description {
            return Err(ConformanceError::DescriptionMismatch {
                version: entry.version,
                applied: entry.description.clone(),
                local: migration.description.clone(),
            });
        }
    }

    if let Some(current) = applied.iter().map(|a| a.version).max() {
        let applied_versions: HashSet<u32> = applied.iter().map(|a| a.version).collect();
        if let Some(&version) = local
            .keys()
            .find(|v| **v < current && !applied_versions.contains(v))
        {
            return Err(ConformanceError::OutOfOrderMigration { version, current });
        }
    }
    Ok(())
}
