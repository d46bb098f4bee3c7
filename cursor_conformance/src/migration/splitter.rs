use crate::error::Result;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

/// Parses a migration script and returns its statements, one per entry,
/// rendered back to SQL. Comments and empty statements are dropped.
pub fn split_statements(script: &str) -> Result<Vec<String>> {
    let statements = Parser::parse_sql(&DuckDbDialect {}, script)?;
    Ok(statements.iter().map(|s| s.to_string()).collect())
}
