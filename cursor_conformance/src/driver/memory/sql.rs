//! The SQL subset the reference driver understands, read from the
//! `sqlparser` AST.

use crate::error::{ConformanceError, Result};
use sqlparser::ast::{
    self, BinaryOperator, Expr, ObjectName, ObjectNamePart, SelectItem, SetExpr, Statement,
    TableFactor, TableObject, UnaryOperator,
};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(String),
    Text(String),
    /// `?` placeholder, by position.
    Param(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    CountStar,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select {
        projection: Projection,
        table: String,
        filter: Option<(String, Literal)>,
        order_by: Option<String>,
    },
    CreateTable {
        table: String,
        if_not_exists: bool,
        columns: Vec<ColumnDef>,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        rows: Vec<Vec<Literal>>,
    },
    Begin,
    Commit,
    Rollback,
    /// `INSTALL x` / `LOAD x`; extensions are built in.
    Extension(String),
}

fn unsupported(sql: &str) -> ConformanceError {
    ConformanceError::UnsupportedQuery(sql.trim().to_string())
}

pub fn parse(sql: &str) -> Result<Command> {
    if let Some(name) = extension_name(sql) {
        return Ok(Command::Extension(name));
    }

    let mut statements = Parser::parse_sql(&DuckDbDialect {}, sql).map_err(|e| {
        ConformanceError::UnsupportedQuery(format!("{} ({})", sql.trim(), e))
    })?;
    if statements.len() != 1 {
        return Err(unsupported(sql));
    }
    let statement = statements.remove(0);

    let mut reader = Reader { sql, params: 0 };
    match &statement {
        Statement::Query(query) => reader.select(query),
        Statement::CreateTable(create) => reader.create_table(create),
        Statement::Insert(insert) => reader.insert(insert),
        Statement::StartTransaction { .. } => Ok(Command::Begin),
        Statement::Commit { .. } => Ok(Command::Commit),
        Statement::Rollback { .. } => Ok(Command::Rollback),
        _ => Err(unsupported(sql)),
    }
}

/// `INSTALL <name>` or `LOAD <name>`, matched before parsing.
fn extension_name(sql: &str) -> Option<String> {
    let trimmed = sql.trim().trim_end_matches(';');
    let mut words = trimmed.split_whitespace();
    let keyword = words.next()?;
    if !keyword.eq_ignore_ascii_case("install") && !keyword.eq_ignore_ascii_case("load") {
        return None;
    }
    match (words.next(), words.next()) {
        (Some(name), None) => Some(name.trim_matches('"').to_string()),
        _ => None,
    }
}

/// Walks one statement's AST; numbers placeholders in the order they are
/// met.
struct Reader<'a> {
    sql: &'a str,
    params: usize,
}

impl Reader<'_> {
    fn select(&mut self, query: &ast::Query) -> Result<Command> {
        let SetExpr::Select(select) = query.body.as_ref() else {
            return Err(unsupported(self.sql));
        };
        if select.from.len() != 1 || !select.from[0].joins.is_empty() {
            return Err(unsupported(self.sql));
        }
        let table = match &select.from[0].relation {
            TableFactor::Table { name, .. } => self.table_name(name)?,
            _ => return Err(unsupported(self.sql)),
        };

        let projection = self.projection(&select.projection)?;

        let filter = match &select.selection {
            None => None,
            Some(Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq,
                right,
            }) => {
                let column = self.column(left)?;
                Some((column, self.literal(right)?))
            }
            Some(_) => return Err(unsupported(self.sql)),
        };

        let order_by = match &query.order_by {
            None => None,
            Some(order_by) => match &order_by.kind {
                ast::OrderByKind::Expressions(exprs) if exprs.len() == 1 => {
                    Some(self.column(&exprs[0].expr)?)
                }
                _ => return Err(unsupported(self.sql)),
            },
        };

        Ok(Command::Select {
            projection,
            table,
            filter,
            order_by,
        })
    }

    fn projection(&self, items: &[SelectItem]) -> Result<Projection> {
        match items {
            [SelectItem::Wildcard(_)] => Ok(Projection::All),
            [SelectItem::UnnamedExpr(expr @ Expr::Function(_))]
                if expr.to_string().eq_ignore_ascii_case("count(*)") =>
            {
                Ok(Projection::CountStar)
            }
            _ => items
                .iter()
                .map(|item| match item {
                    SelectItem::UnnamedExpr(expr) => self.column(expr),
                    _ => Err(unsupported(self.sql)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Projection::Columns),
        }
    }

    fn create_table(&self, create: &ast::CreateTable) -> Result<Command> {
        let columns = create
            .columns
            .iter()
            .map(|column| ColumnDef {
                name: column.name.value.clone(),
                type_name: type_name(&column.data_type),
            })
            .collect();
        // Constraints are accepted and ignored.
        Ok(Command::CreateTable {
            table: self.table_name(&create.name)?,
            if_not_exists: create.if_not_exists,
            columns,
        })
    }

    fn insert(&mut self, insert: &ast::Insert) -> Result<Command> {
        let table = match &insert.table {
            TableObject::TableName(name) => self.table_name(name)?,
            _ => return Err(unsupported(self.sql)),
        };
        let columns = if insert.columns.is_empty() {
            None
        } else {
            Some(insert.columns.iter().map(|c| c.value.clone()).collect())
        };

        let values = match insert.source.as_ref().map(|q| q.body.as_ref()) {
            Some(SetExpr::Values(values)) => values,
            _ => return Err(unsupported(self.sql)),
        };
        let mut rows = Vec::with_capacity(values.rows.len());
        for row in &values.rows {
            rows.push(
                row.iter()
                    .map(|expr| self.literal(expr))
                    .collect::<Result<Vec<_>>>()?,
            );
        }

        Ok(Command::Insert {
            table,
            columns,
            rows,
        })
    }

    /// Last part of a possibly qualified name; the schema is ignored.
    fn table_name(&self, name: &ObjectName) -> Result<String> {
        match name.0.last() {
            Some(ObjectNamePart::Identifier(ident)) => Ok(ident.value.clone()),
            _ => Err(unsupported(self.sql)),
        }
    }

    fn column(&self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Identifier(ident) => Ok(ident.value.clone()),
            Expr::CompoundIdentifier(parts) => parts
                .last()
                .map(|ident| ident.value.clone())
                .ok_or_else(|| unsupported(self.sql)),
            _ => Err(unsupported(self.sql)),
        }
    }

    fn literal(&mut self, expr: &Expr) -> Result<Literal> {
        match expr {
            Expr::Value(value) => match &value.value {
                ast::Value::Null => Ok(Literal::Null),
                ast::Value::Boolean(b) => Ok(Literal::Boolean(*b)),
                ast::Value::Number(n, _) => Ok(Literal::Number(n.to_string())),
                ast::Value::SingleQuotedString(s) => Ok(Literal::Text(s.clone())),
                ast::Value::Placeholder(_) => {
                    let index = self.params;
                    self.params += 1;
                    Ok(Literal::Param(index))
                }
                _ => Err(unsupported(self.sql)),
            },
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr,
            } => match self.literal(expr)? {
                Literal::Number(n) => Ok(Literal::Number(format!("-{}", n))),
                _ => Err(unsupported(self.sql)),
            },
            _ => Err(unsupported(self.sql)),
        }
    }
}

/// `VARCHAR(10)` reads as `VARCHAR`.
fn type_name(data_type: &ast::DataType) -> String {
    let rendered = data_type.to_string().to_ascii_uppercase();
    match rendered.split_once('(') {
        Some((base, _)) => base.trim().to_string(),
        None => rendered,
    }
}

/// Collapses runs of whitespace, for matching registered queries.
pub fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
