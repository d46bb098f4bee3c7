use super::{split_statements, Migration};
use crate::driver::{ParamValue, Session, Value};
use crate::error::{ConformanceError, Result};
use serde::{Deserialize, Serialize};

pub const HISTORY_TABLE: &str = "conformance_schema_history";

/// One row of the schema history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    pub installed_rank: u32,
    pub version: u32,
    pub description: String,
    pub script: String,
    pub checksum: u32,
    pub success: bool,
}

impl AppliedMigration {
    pub fn succeeded(migration: &Migration, installed_rank: u32) -> Self {
        Self {
            installed_rank,
            version: migration.version,
            description: migration.description.clone(),
            script: migration.script_name(),
            checksum: migration.checksum,
            success: true,
        }
    }
}

/// Where applied migrations are recorded and how scripts are run.
pub trait HistoryStore {
    fn ensure_table(&mut self) -> Result<()>;

    /// Applied entries ordered by installed rank.
    fn applied(&mut self) -> Result<Vec<AppliedMigration>>;

    /// Runs the script and records it, atomically.
    fn apply(&mut self, migration: &Migration, installed_rank: u32) -> Result<()>;
}

/// History kept in a table of the database under migration.
pub struct SqlHistoryStore<'s> {
    session: &'s dyn Session,
}

impl<'s> SqlHistoryStore<'s> {
    pub fn new(session: &'s dyn Session) -> Self {
        Self { session }
    }

    fn run_script(&self, migration: &Migration, installed_rank: u32) -> Result<()> {
        for statement in split_statements(&migration.script)? {
            self.session.execute(&statement, &[])?;
        }
        self.session.execute(
            &format!(
                "INSERT INTO {} (installed_rank, version, description, script, checksum, success) \
                 VALUES (?, ?, ?, ?, ?, TRUE)",
                HISTORY_TABLE
            ),
            &[
                ParamValue::BigInt(installed_rank.into()),
                ParamValue::BigInt(migration.version.into()),
                ParamValue::String(migration.description.clone()),
                ParamValue::String(migration.script_name()),
                ParamValue::BigInt(migration.checksum.into()),
            ],
        )
    }
}

impl HistoryStore for SqlHistoryStore<'_> {
    fn ensure_table(&mut self) -> Result<()> {
        self.session.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                 installed_rank INTEGER PRIMARY KEY, \
                 version INTEGER NOT NULL, \
                 description VARCHAR NOT NULL, \
                 script VARCHAR NOT NULL, \
                 checksum BIGINT NOT NULL, \
                 success BOOLEAN NOT NULL)",
                HISTORY_TABLE
            ),
            &[],
        )
    }

    fn applied(&mut self) -> Result<Vec<AppliedMigration>> {
        let sql = format!(
            "SELECT installed_rank, version, description, script, checksum, success \
             FROM {} ORDER BY installed_rank",
            HISTORY_TABLE
        );
        let mut statement = self.session.prepare(&sql)?;
        let mut cursor = statement.execute(&[])?;

        let mut entries = Vec::new();
        while cursor.advance()? {
            entries.push(AppliedMigration {
                installed_rank: to_u32(cursor.value(1)?, "installed_rank")?,
                version: to_u32(cursor.value(2)?, "version")?,
                description: cursor.value(3)?.to_string(),
                script: cursor.value(4)?.to_string(),
                checksum: to_u32(cursor.value(5)?, "checksum")?,
                success: to_bool(cursor.value(6)?),
            });
        }
        Ok(entries)
    }

    fn apply(&mut self, migration: &Migration, installed_rank: u32) -> Result<()> {
        self.session.execute("BEGIN TRANSACTION", &[])?;
        match self.run_script(migration, installed_rank) {
            Ok(()) => self.session.execute("COMMIT", &[]),
            Err(e) => {
                if let Err(rollback) = self.session.execute("ROLLBACK", &[]) {
                    log::warn!("Rollback of {} failed: {}", migration.script_name(), rollback);
                }
                Err(ConformanceError::Setup(format!(
                    "Migration {} failed: {}",
                    migration.script_name(),
                    e
                )))
            }
        }
    }
}

fn to_u32(value: &Value, column: &str) -> Result<u32> {
    let parsed = match value {
        Value::Integer(n) => u32::try_from(*n).ok(),
        other => other.to_string().trim().parse::<u32>().ok(),
    };
    parsed.ok_or_else(|| {
        ConformanceError::Setup(format!(
            "Unreadable {} in {}: {}",
            column, HISTORY_TABLE, value
        ))
    })
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Integer(n) => *n != 0,
        other => matches!(other.to_string().to_ascii_lowercase().as_str(), "true" | "1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeded_entry_mirrors_migration() {
        let migration = Migration::new(3, "insert fixture data", "INSERT ...");
        let entry = AppliedMigration::succeeded(&migration, 7);
        assert_eq!(entry.installed_rank, 7);
        assert_eq!(entry.version, 3);
        assert_eq!(entry.script, "V3__insert_fixture_data.sql");
        assert_eq!(entry.checksum, migration.checksum);
        assert!(entry.success);
    }

    #[test]
    fn test_to_u32_accepts_integer_and_text() {
        assert_eq!(to_u32(&Value::Integer(42), "v").unwrap(), 42);
        assert_eq!(to_u32(&Value::from("4294967295"), "v").unwrap(), u32::MAX);
        assert!(to_u32(&Value::Integer(-1), "v").is_err());
        assert!(to_u32(&Value::Null, "v").is_err());
    }

    #[test]
    fn test_to_bool_variants() {
        assert!(to_bool(&Value::Boolean(true)));
        assert!(to_bool(&Value::Integer(1)));
        assert!(to_bool(&Value::from("TRUE")));
        assert!(!to_bool(&Value::from("false")));
        assert!(!to_bool(&Value::Null));
    }
}
