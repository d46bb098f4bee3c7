use super::{Check, Scenario};
use crate::driver::{ParamValue, Session, COLUMNS_NAME_COLUMN, TABLES_NAME_COLUMN};
use crate::error::Result;
use crate::fixture::{select_columns, Fixture};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
}

/// Walks every table through the metadata cursor and, for each one, fully
/// consumes a nested column cursor before advancing the outer cursor.
///
/// Returns `"<table>: <column>"` for every column seen. The list must be
/// non-empty and as long as the one produced by
/// [`sequential_column_count`].
pub fn nested_metadata_enumeration(session: &dyn Session) -> Result<Vec<String>> {
    let check = Check::new(Scenario::NestedMetadataEnumeration.name());
    let mut names = Vec::new();

    {
        let mut tables = check.step("listing tables", session.list_tables())?;
        while check.step("advancing tables", tables.advance())? {
            let table = check
                .step("reading TABLE_NAME", tables.text(TABLES_NAME_COLUMN))?
                .to_string();

            let mut columns = check.step(
                &format!("listing columns of {}", table),
                session.list_columns(&table),
            )?;
            while check.step("advancing columns", columns.advance())? {
                let column = check.step("reading COLUMN_NAME", columns.text(COLUMNS_NAME_COLUMN))?;
                names.push(format!("{}: {}", table, column));
            }
            check.step("closing columns", columns.close())?;
            check.expect_open(tables.as_ref(), "the tables cursor", "after a column cursor was closed")?;
        }
    }

    check.require(!names.is_empty(), || "Column list is empty".to_string())?;

    let reference = sequential_column_count(session)?;
    check.require(names.len() == reference, || {
        format!(
            "Nested enumeration saw {} columns, sequential enumeration saw {}",
            names.len(),
            reference
        )
    })?;
    Ok(names)
}

/// Total column count gathered without nesting: all table names are
/// collected and the tables cursor closed before any column cursor opens.
pub fn sequential_column_count(session: &dyn Session) -> Result<usize> {
    let mut tables = Vec::new();
    {
        let mut cursor = session.list_tables()?;
        while cursor.advance()? {
            tables.push(cursor.text(TABLES_NAME_COLUMN)?.to_string());
        }
        cursor.close()?;
    }

    let mut total = 0;
    for table in &tables {
        let mut cursor = session.list_columns(table)?;
        while cursor.advance()? {
            total += 1;
        }
        cursor.close()?;
    }
    Ok(total)
}

/// For every parent row, binds its key into the child query and fully
/// consumes the child cursor before advancing the parent cursor.
///
/// Every returned book carries the author it was queried with; the list
/// must be non-empty.
pub fn join_books_by_author(session: &dyn Session, fixture: &Fixture) -> Result<Vec<Book>> {
    let check = Check::new(Scenario::CrossTableJoin.name());
    let mut books = Vec::new();

    let mut author_statement = check.step(
        "preparing authors",
        session.prepare(&select_columns(&fixture.parent_table, &[fixture.parent_key.as_str()])),
    )?;
    let mut book_statement = check.step(
        "preparing books",
        session.prepare(&fixture.children_of_parent_sql()),
    )?;

    {
        let mut authors = check.step("executing authors", author_statement.execute(&[]))?;
        while check.step("advancing authors", authors.advance())? {
            let author = check.step("reading author", authors.text(1))?.to_string();

            let mut rows = check.step(
                &format!("executing books of {}", author),
                book_statement.execute(&[ParamValue::String(author.clone())]),
            )?;
            while check.step("advancing books", rows.advance())? {
                let book = Book {
                    title: check
                        .step("reading title", rows.text_by_name(&fixture.child_label))?
                        .to_string(),
                    author: check
                        .step("reading book author", rows.text_by_name(&fixture.foreign_key))?
                        .to_string(),
                };
                check.require(book.author == author, || {
                    format!(
                        "Book {} has author {} but was bound to {}",
                        book.title, book.author, author
                    )
                })?;
                books.push(book);
            }
            check.step("closing books", rows.close())?;
            check.expect_open(authors.as_ref(), "the authors cursor", "after a books cursor was closed")?;
        }
    }

    check.require(!books.is_empty(), || "Book list is empty".to_string())?;
    Ok(books)
}
