use crate::driver::ParamValue;
use crate::error::{ConformanceError, Result};

pub const LIST_TABLES_SQL: &str = "SELECT TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE \
     FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_TYPE IN ('BASE TABLE','VIEW') \
     ORDER BY TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME";

const COLUMNS_SELECT: &str = "SELECT TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME, COLUMN_NAME, \
     ORDINAL_POSITION, DATA_TYPE, IS_NULLABLE \
     FROM INFORMATION_SCHEMA.COLUMNS";

/// A table as handed to a metadata call: `table` or `schema.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn parse(table: &str) -> Result<Self> {
        let table = table.trim();
        if table.is_empty() {
            return Err(ConformanceError::Validation(
                "Table name cannot be empty".to_string(),
            ));
        }
        match table.rsplit_once('.') {
            Some((schema, name)) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(ConformanceError::Validation(format!(
                        "Invalid table name '{}' (empty after schema)",
                        table
                    )));
                }
                Ok(Self {
                    schema: Some(schema.trim().to_string()),
                    name: name.to_string(),
                })
            }
            None => Ok(Self {
                schema: None,
                name: table.to_string(),
            }),
        }
    }
}

/// Column listing query for `table`, with its bound parameters.
pub fn list_columns_query(table: &str) -> Result<(String, Vec<ParamValue>)> {
    let TableRef { schema, name } = TableRef::parse(table)?;
    Ok(match schema {
        Some(schema) => (
            format!(
                "{} WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
                COLUMNS_SELECT
            ),
            vec![ParamValue::String(schema), ParamValue::String(name)],
        ),
        None => (
            format!(
                "{} WHERE TABLE_NAME = ? ORDER BY TABLE_SCHEMA, ORDINAL_POSITION",
                COLUMNS_SELECT
            ),
            vec![ParamValue::String(name)],
        ),
    })
}
