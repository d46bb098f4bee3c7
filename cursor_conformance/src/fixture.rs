//! Names of the fixture tables and the SQL the scenarios build from them.

use serde::{Deserialize, Serialize};

/// Two related tables: `parent` rows are referenced by `child.foreign_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub parent_table: String,
    pub parent_key: String,
    pub child_table: String,
    pub child_label: String,
    pub foreign_key: String,
}

impl Default for Fixture {
    /// `author("name")` and `book("title", "author")`.
    fn default() -> Self {
        Self {
            parent_table: "author".to_string(),
            parent_key: "name".to_string(),
            child_table: "book".to_string(),
            child_label: "title".to_string(),
            foreign_key: "author".to_string(),
        }
    }
}

impl Fixture {
    /// `SELECT * FROM "<child>" WHERE "<fk>" = ?`
    pub fn children_of_parent_sql(&self) -> String {
        select_where_eq(&self.child_table, &self.foreign_key)
    }

    pub fn all_parents_sql(&self) -> String {
        select_all(&self.parent_table)
    }

    pub fn all_children_sql(&self) -> String {
        select_all(&self.child_table)
    }

    /// `SELECT COUNT(*) FROM "<child>" WHERE "<fk>" = ?`
    pub fn count_children_of_parent_sql(&self) -> String {
        count_where_eq(&self.child_table, &self.foreign_key)
    }
}

/// Double-quoted identifier with embedded quotes doubled.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn select_all(table: &str) -> String {
    format!("SELECT * FROM {}", quote_ident(table))
}

pub fn select_columns(table: &str, columns: &[&str]) -> String {
    let columns: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!("SELECT {} FROM {}", columns.join(", "), quote_ident(table))
}

pub fn select_where_eq(table: &str, column: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = ?",
        quote_ident(table),
        quote_ident(column)
    )
}

pub fn count_rows(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", quote_ident(table))
}

pub fn count_where_eq(table: &str, column: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?",
        quote_ident(table),
        quote_ident(column)
    )
}
