//! Single-query checks run on a fresh database.

use crate::driver::{Session, StatementKind, Value};
use crate::error::{ConformanceError, Result};
use crate::fixture::{select_all, Fixture};

pub const GEOMETRY_LITERAL_SQL: &str = "SELECT ST_GeomFromText('POLYGON ((-180 -90, -180 90, 180 90, 180 -90, -180 -90))') AS geom";

const MIGRATION_PROBE: &str = "migration_validation";
const GEOMETRY_PROBE: &str = "geometry_literal";

/// The parent fixture table must hold at least one row once migrations
/// ran. Returns the number of rows seen.
pub fn validate_migrations(session: &dyn Session, fixture: &Fixture) -> Result<usize> {
    let mut statement = session.create_statement(&select_all(&fixture.parent_table))?;
    let mut cursor = statement.execute(&[])?;
    let mut rows = 0;
    while cursor.advance()? {
        rows += 1;
    }
    if rows == 0 {
        return Err(ConformanceError::violation(
            MIGRATION_PROBE,
            format!("{} is empty after migration", fixture.parent_table),
        ));
    }
    Ok(rows)
}

/// Runs [`GEOMETRY_LITERAL_SQL`] as one kind of statement and returns the
/// `geom` value, which must be present and non-null.
pub fn geometry_literal(session: &dyn Session, kind: StatementKind) -> Result<Value> {
    let mut statement = match kind {
        StatementKind::Prepared => session.prepare(GEOMETRY_LITERAL_SQL)?,
        StatementKind::AdHoc => session.create_statement(GEOMETRY_LITERAL_SQL)?,
    };
    let mut cursor = statement.execute(&[])?;
    if !cursor.advance()? {
        return Err(ConformanceError::violation(
            GEOMETRY_PROBE,
            format!("{:?} statement returned no geometry", kind),
        ));
    }
    let geom = cursor.value_by_name("geom")?.clone();
    if geom.is_null() {
        return Err(ConformanceError::violation(
            GEOMETRY_PROBE,
            format!("{:?} statement returned a null geometry", kind),
        ));
    }
    Ok(geom)
}

/// [`geometry_literal`] through a prepared and an ad-hoc statement.
pub fn geometry_literal_both(session: &dyn Session) -> Result<Vec<(StatementKind, Value)>> {
    [StatementKind::Prepared, StatementKind::AdHoc]
        .into_iter()
        .map(|kind| geometry_literal(session, kind).map(|geom| (kind, geom)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::memory::{HandleRegistry, MemoryDatabase, MemorySession};
    use crate::driver::SessionOptions;

    fn session(db: MemoryDatabase) -> MemorySession {
        MemorySession::in_memory(db, SessionOptions::default(), HandleRegistry::shared(Vec::new()))
    }

    #[test]
    fn test_validate_migrations_counts_parent_rows() {
        let s = session(MemoryDatabase::library());
        assert_eq!(validate_migrations(&s, &Fixture::default()).unwrap(), 1);
    }

    #[test]
    fn test_validate_migrations_flags_empty_table() {
        let mut db = MemoryDatabase::library();
        db.tables.get_mut("author").unwrap().rows.clear();
        let s = session(db);

        let err = validate_migrations(&s, &Fixture::default()).unwrap_err();
        assert!(matches!(
            err,
            ConformanceError::Violation { ref scenario, .. } if scenario == MIGRATION_PROBE
        ));
    }

    #[test]
    fn test_validate_migrations_missing_table_is_driver_error() {
        let s = session(MemoryDatabase::default());
        let err = validate_migrations(&s, &Fixture::default()).unwrap_err();
        assert_eq!(&err.sqlstate(), b"42S02");
    }

    #[test]
    fn test_geometry_literal_through_both_statement_kinds() {
        let s = session(MemoryDatabase::with_spatial());
        let results = geometry_literal_both(&s).unwrap();

        let kinds: Vec<StatementKind> = results.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![StatementKind::Prepared, StatementKind::AdHoc]);
        for (_, geom) in &results {
            assert!(matches!(geom, Value::Bytes(b) if !b.is_empty()));
        }
    }

    #[test]
    fn test_geometry_literal_null_is_violation() {
        let db = MemoryDatabase::default().with_canned_query(
            GEOMETRY_LITERAL_SQL,
            vec![crate::driver::ColumnInfo::new("geom", crate::driver::ColumnType::Binary)],
            vec![vec![Value::Null]],
        );
        let s = session(db);

        let err = geometry_literal(&s, StatementKind::AdHoc).unwrap_err();
        assert!(err.to_string().contains("null geometry"), "{}", err);
    }
}
