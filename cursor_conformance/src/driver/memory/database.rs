use super::sql::{normalize, ColumnDef, Command, Literal, Projection};
use crate::driver::{ColumnInfo, ColumnType, ParamValue, Value};
use crate::error::{ConformanceError, Result};
use crate::scenarios::probes::GEOMETRY_LITERAL_SQL;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

pub const CATALOG_NAME: &str = "memory";
pub const SCHEMA_NAME: &str = "main";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryTable {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Value>>,
}

/// A fixed result returned for one exact SQL text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CannedResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Value>>,
}

/// Contents of a reference-driver database file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDatabase {
    pub tables: BTreeMap<String, MemoryTable>,
    #[serde(default)]
    pub canned: BTreeMap<String, CannedResult>,
}

/// Rows produced by a query, before a cursor is opened over them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRows {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Value>>,
}

impl MemoryDatabase {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// The author/book fixture, already populated.
    pub fn library() -> Self {
        let mut db = Self::with_spatial();
        db.tables.insert(
            "author".to_string(),
            MemoryTable {
                columns: vec![ColumnInfo::varchar("name")],
                rows: vec![vec![Value::from("Alice")]],
            },
        );
        db.tables.insert(
            "book".to_string(),
            MemoryTable {
                columns: vec![ColumnInfo::varchar("title"), ColumnInfo::varchar("author")],
                rows: vec![
                    vec![Value::from("Book1"), Value::from("Alice")],
                    vec![Value::from("Book2"), Value::from("Alice")],
                ],
            },
        );
        db
    }

    /// Empty database that answers the geometry literal query with a
    /// WKB-encoded polygon, as if the spatial extension were loaded.
    pub fn with_spatial() -> Self {
        Self::default().with_canned_query(
            GEOMETRY_LITERAL_SQL,
            vec![ColumnInfo::new("geom", ColumnType::Binary)],
            vec![vec![Value::Bytes(world_polygon_wkb())]],
        )
    }

    pub fn with_canned_query(
        mut self,
        sql: &str,
        columns: Vec<ColumnInfo>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        self.canned
            .insert(normalize(sql), CannedResult { columns, rows });
        self
    }

    fn table(&self, name: &str) -> Result<(&String, &MemoryTable)> {
        self.tables
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                ConformanceError::driver("42S02", format!("Table with name {} does not exist", name))
            })
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable> {
        self.tables
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, t)| t)
            .ok_or_else(|| {
                ConformanceError::driver("42S02", format!("Table with name {} does not exist", name))
            })
    }

    pub fn canned(&self, sql: &str) -> Option<ResultRows> {
        self.canned.get(&normalize(sql)).map(|c| ResultRows {
            columns: c.columns.clone(),
            rows: c.rows.clone(),
        })
    }

    pub fn select(
        &self,
        projection: &Projection,
        table: &str,
        filter: Option<&(String, Literal)>,
        order_by: Option<&str>,
        params: &[ParamValue],
    ) -> Result<ResultRows> {
        let (_, source) = self.table(table)?;

        let mut rows: Vec<&Vec<Value>> = source.rows.iter().collect();
        if let Some((column, literal)) = filter {
            let index = column_position(&source.columns, column)?;
            let expected = literal_to_value(literal, params, source.columns[index].column_type)?;
            rows.retain(|row| values_equal(&row[index], &expected));
        }
        if let Some(column) = order_by {
            let index = column_position(&source.columns, column)?;
            rows.sort_by(|a, b| compare_values(&a[index], &b[index]));
        }

        Ok(match projection {
            Projection::All => ResultRows {
                columns: source.columns.clone(),
                rows: rows.into_iter().cloned().collect(),
            },
            Projection::CountStar => ResultRows {
                columns: vec![ColumnInfo::new("count_star()", ColumnType::BigInt)],
                rows: vec![vec![Value::Integer(rows.len() as i64)]],
            },
            Projection::Columns(names) => {
                let indexes = names
                    .iter()
                    .map(|n| column_position(&source.columns, n))
                    .collect::<Result<Vec<_>>>()?;
                ResultRows {
                    columns: indexes.iter().map(|i| source.columns[*i].clone()).collect(),
                    rows: rows
                        .into_iter()
                        .map(|row| indexes.iter().map(|i| row[*i].clone()).collect())
                        .collect(),
                }
            }
        })
    }

    /// Applies a data-changing command. Transaction control and extension
    /// loading are handled by the session.
    pub fn apply(&mut self, command: &Command, params: &[ParamValue]) -> Result<()> {
        match command {
            Command::CreateTable {
                table,
                if_not_exists,
                columns,
            } => {
                if self.table(table).is_ok() {
                    if *if_not_exists {
                        return Ok(());
                    }
                    return Err(ConformanceError::driver(
                        "42S01",
                        format!("Table with name {} already exists", table),
                    ));
                }
                self.tables.insert(
                    table.clone(),
                    MemoryTable {
                        columns: columns.iter().map(column_info).collect(),
                        rows: Vec::new(),
                    },
                );
                Ok(())
            }
            Command::Insert {
                table,
                columns,
                rows,
            } => {
                let target = self.table_mut(table)?;
                let positions: Vec<usize> = match columns {
                    Some(names) => names
                        .iter()
                        .map(|n| column_position(&target.columns, n))
                        .collect::<Result<_>>()?,
                    None => (0..target.columns.len()).collect(),
                };

                let mut new_rows = Vec::with_capacity(rows.len());
                for literals in rows {
                    if literals.len() != positions.len() {
                        return Err(ConformanceError::driver(
                            "21S01",
                            format!(
                                "Table {} expects {} values, got {}",
                                table,
                                positions.len(),
                                literals.len()
                            ),
                        ));
                    }
                    let mut row = vec![Value::Null; target.columns.len()];
                    for (literal, &position) in literals.iter().zip(&positions) {
                        row[position] =
                            literal_to_value(literal, params, target.columns[position].column_type)?;
                    }
                    new_rows.push(row);
                }
                target.rows.extend(new_rows);
                Ok(())
            }
            other => Err(ConformanceError::UnsupportedQuery(format!("{:?}", other))),
        }
    }
}

fn column_info(def: &ColumnDef) -> ColumnInfo {
    let column_type = match def.type_name.as_str() {
        "INTEGER" | "INT" | "SMALLINT" | "TINYINT" => ColumnType::Integer,
        "BIGINT" => ColumnType::BigInt,
        "BOOLEAN" | "BOOL" => ColumnType::Boolean,
        "DOUBLE" | "REAL" | "FLOAT" => ColumnType::Double,
        "DECIMAL" | "NUMERIC" => ColumnType::Decimal,
        "DATE" => ColumnType::Date,
        "TIMESTAMP" => ColumnType::Timestamp,
        "BLOB" | "BYTEA" | "GEOMETRY" => ColumnType::Binary,
        _ => ColumnType::Varchar,
    };
    ColumnInfo::new(def.name.clone(), column_type)
}

fn column_position(columns: &[ColumnInfo], name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            ConformanceError::driver("42S22", format!("Referenced column {} not found", name))
        })
}

fn literal_to_value(literal: &Literal, params: &[ParamValue], column_type: ColumnType) -> Result<Value> {
    let value = match literal {
        Literal::Null => Value::Null,
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Number(n) => Value::Text(n.clone()),
        Literal::Text(s) => Value::Text(s.clone()),
        Literal::Param(index) => match params.get(*index) {
            Some(ParamValue::Null) => Value::Null,
            Some(ParamValue::String(s)) => Value::Text(s.clone()),
            Some(ParamValue::Integer(n)) => Value::Integer((*n).into()),
            Some(ParamValue::BigInt(n)) => Value::Integer(*n),
            Some(ParamValue::Decimal(s)) => Value::Decimal(s.clone()),
            Some(ParamValue::Binary(b)) => Value::Bytes(b.clone()),
            None => {
                return Err(ConformanceError::driver(
                    "07002",
                    format!("No value bound for parameter {}", index + 1),
                ))
            }
        },
    };
    Ok(coerce(value, column_type))
}

/// Converts text into the column's type where it parses; anything else
/// is stored as given.
fn coerce(value: Value, column_type: ColumnType) -> Value {
    let Value::Text(text) = &value else {
        return value;
    };
    match column_type {
        ColumnType::Integer | ColumnType::BigInt => {
            text.trim().parse::<i64>().map(Value::Integer).unwrap_or(value)
        }
        ColumnType::Double => text.trim().parse::<f64>().map(Value::Double).unwrap_or(value),
        ColumnType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Value::Boolean(true),
            "false" | "0" => Value::Boolean(false),
            _ => value,
        },
        ColumnType::Decimal => Value::Decimal(text.trim().to_string()),
        _ => value,
    }
}

fn values_equal(stored: &Value, expected: &Value) -> bool {
    !stored.is_null() && !expected.is_null() && stored.to_string() == expected.to_string()
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Little-endian WKB of the polygon covering the whole lon/lat range.
fn world_polygon_wkb() -> Vec<u8> {
    let ring: [(f64, f64); 5] = [
        (-180.0, -90.0),
        (-180.0, 90.0),
        (180.0, 90.0),
        (180.0, -90.0),
        (-180.0, -90.0),
    ];
    let mut wkb = vec![1u8];
    wkb.extend_from_slice(&3u32.to_le_bytes());
    wkb.extend_from_slice(&1u32.to_le_bytes());
    wkb.extend_from_slice(&(ring.len() as u32).to_le_bytes());
    for (x, y) in ring {
        wkb.extend_from_slice(&x.to_le_bytes());
        wkb.extend_from_slice(&y.to_le_bytes());
    }
    wkb
}

#[cfg(test)]
mod tests {
    use super::super::sql::parse;
    use super::*;

    fn run(db: &mut MemoryDatabase, sql: &str, params: &[ParamValue]) {
        db.apply(&parse(sql).unwrap(), params).unwrap();
    }

    fn query(db: &MemoryDatabase, sql: &str, params: &[ParamValue]) -> ResultRows {
        match parse(sql).unwrap() {
            Command::Select {
                projection,
                table,
                filter,
                order_by,
            } => db
                .select(&projection, &table, filter.as_ref(), order_by.as_deref(), params)
                .unwrap(),
            other => panic!("not a select: {:?}", other),
        }
    }

    #[test]
    fn test_create_insert_select_roundtrip_via_sql() {
        let mut db = MemoryDatabase::default();
        run(&mut db, "CREATE TABLE \"t\" (\"id\" INTEGER, \"name\" VARCHAR)", &[]);
        run(
            &mut db,
            "INSERT INTO \"t\" VALUES (2, 'b'), (1, 'a')",
            &[],
        );
        run(
            &mut db,
            "INSERT INTO \"t\" (\"name\", \"id\") VALUES (?, ?)",
            &[ParamValue::from("c"), ParamValue::String("3".to_string())],
        );

        let all = query(&db, "SELECT \"name\" FROM \"t\" ORDER BY \"id\"", &[]);
        let names: Vec<String> = all.rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let count = query(&db, "SELECT COUNT(*) FROM \"t\"", &[]);
        assert_eq!(count.rows, vec![vec![Value::Integer(3)]]);
    }

    #[test]
    fn test_filter_by_bound_value() {
        let db = MemoryDatabase::library();
        let books = query(
            &db,
            "SELECT * FROM \"book\" WHERE \"author\" = ?",
            &[ParamValue::from("Alice")],
        );
        assert_eq!(books.rows.len(), 2);

        let none = query(
            &db,
            "SELECT * FROM \"book\" WHERE \"author\" = ?",
            &[ParamValue::from("Bob")],
        );
        assert!(none.rows.is_empty());
    }

    #[test]
    fn test_missing_parameter_is_driver_error() {
        let db = MemoryDatabase::library();
        match parse("SELECT * FROM \"book\" WHERE \"author\" = ?").unwrap() {
            Command::Select {
                projection,
                table,
                filter,
                order_by,
            } => {
                let err = db
                    .select(&projection, &table, filter.as_ref(), order_by.as_deref(), &[])
                    .unwrap_err();
                assert_eq!(&err.sqlstate(), b"07002");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_create_existing_table() {
        let mut db = MemoryDatabase::library();
        let err = db
            .apply(&parse("CREATE TABLE author (name VARCHAR)").unwrap(), &[])
            .unwrap_err();
        assert_eq!(&err.sqlstate(), b"42S01");
        run(&mut db, "CREATE TABLE IF NOT EXISTS author (name VARCHAR)", &[]);
        assert_eq!(db.tables["author"].rows.len(), 1);
    }

    #[test]
    fn test_unknown_table_and_column() {
        let db = MemoryDatabase::library();
        match parse("SELECT * FROM \"nope\"").unwrap() {
            Command::Select { projection, table, .. } => {
                let err = db.select(&projection, &table, None, None, &[]).unwrap_err();
                assert_eq!(&err.sqlstate(), b"42S02");
            }
            _ => unreachable!(),
        }
        match parse("SELECT \"isbn\" FROM \"book\"").unwrap() {
            Command::Select { projection, table, .. } => {
                let err = db.select(&projection, &table, None, None, &[]).unwrap_err();
                assert_eq!(&err.sqlstate(), b"42S22");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_canned_query_ignores_whitespace() {
        let db = MemoryDatabase::with_spatial();
        let result = db
            .canned("SELECT ST_GeomFromText('POLYGON ((-180 -90, -180 90, 180 90, 180 -90, -180 -90))')\n  AS geom")
            .unwrap();
        assert_eq!(result.columns[0].name, "geom");
        match &result.rows[0][0] {
            Value::Bytes(wkb) => {
                assert_eq!(wkb[0], 1);
                assert_eq!(wkb.len(), 1 + 4 + 4 + 4 + 5 * 16);
            }
            other => panic!("expected WKB, got {:?}", other),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let db = MemoryDatabase::library();
        db.save(&path).unwrap();
        assert_eq!(MemoryDatabase::load(&path).unwrap(), db);
    }
}
