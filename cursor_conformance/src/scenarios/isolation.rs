use super::Check;
use crate::driver::{ParamValue, Session, Statement, StatementKind};
use crate::error::{ConformanceError, Result};
use crate::fixture::{count_rows, select_columns, select_where_eq, Fixture};

/// Runs a `SELECT COUNT(*)` on its own statement, closed before returning.
fn count_of(session: &dyn Session, sql: &str, params: &[ParamValue]) -> Result<usize> {
    let mut statement = session.prepare(sql)?;
    let count = {
        let mut cursor = statement.execute(params)?;
        if !cursor.advance()? {
            return Err(ConformanceError::Validation(format!(
                "Count query returned no row: {}",
                sql
            )));
        }
        cursor.integer(1)?
    };
    statement.close()?;
    usize::try_from(count)
        .map_err(|_| ConformanceError::Validation(format!("Negative row count from {}", sql)))
}

/// First value of the parent key column, used as the bound parameter.
fn first_parent_key(session: &dyn Session, fixture: &Fixture) -> Result<String> {
    let mut statement =
        session.prepare(&select_columns(&fixture.parent_table, &[fixture.parent_key.as_str()]))?;
    let mut cursor = statement.execute(&[])?;
    if !cursor.advance()? {
        return Err(ConformanceError::Validation(format!(
            "Fixture table {} is empty",
            fixture.parent_table
        )));
    }
    let key = cursor.value(1)?.to_string();
    Ok(key)
}

fn open_statement<'s>(
    session: &'s dyn Session,
    kind: StatementKind,
    sql: &str,
) -> Result<Box<dyn Statement + 's>> {
    match kind {
        StatementKind::Prepared => session.prepare(sql),
        StatementKind::AdHoc => session.create_statement(sql),
    }
}

/// A on the child table, B on the parent table: A advances once, B is
/// consumed and closed, then A must finish with exactly `COUNT(*)` rows.
pub(crate) fn interleaved_consumption(
    check: &Check,
    session: &dyn Session,
    fixture: &Fixture,
) -> Result<usize> {
    let expected = count_of(session, &count_rows(&fixture.child_table), &[])?;
    if expected == 0 {
        return Err(ConformanceError::Validation(format!(
            "Fixture table {} is empty",
            fixture.child_table
        )));
    }

    let mut a_statement = check.step("preparing A", session.prepare(&fixture.all_children_sql()))?;
    let mut b_statement = check.step("preparing B", session.prepare(&fixture.all_parents_sql()))?;

    let mut a = check.step("executing A", a_statement.execute(&[]))?;
    check.expect_row(a.as_mut(), "A")?;

    let b_rows = {
        let mut b = check.step("executing B", b_statement.execute(&[]))?;
        let rows = check.drain(b.as_mut(), "B")?;
        check.step("closing B", b.close())?;
        rows
    };

    check.expect_open(a.as_ref(), "A", "after B was consumed and closed")?;
    let a_rows = check.drain(a.as_mut(), "A")?;
    check.require(a_rows == expected, || {
        format!(
            "A reported end-of-data after {} rows, {} holds {}",
            a_rows, fixture.child_table, expected
        )
    })?;

    // A second end-of-data must not turn into an error or more rows.
    let again = check.step("advancing A past its end", a.advance())?;
    check.require(!again, || "A produced a row after end-of-data".to_string())?;

    Ok(a_rows + b_rows)
}

struct Plan<'a> {
    kind: StatementKind,
    a_sql: String,
    /// Counts the rows `a_sql` returns for `a_params`.
    a_count_sql: String,
    a_params: &'a [ParamValue],
    b_sql: String,
    b_params: &'a [ParamValue],
    statement_flags: bool,
}

/// A advances, B advances, A must stay open and produce its second row, B
/// is closed, A must still be open and finish with exactly its count.
fn independence(check: &Check, session: &dyn Session, plan: &Plan<'_>) -> Result<usize> {
    let expected = count_of(session, &plan.a_count_sql, plan.a_params)?;
    if expected < 2 {
        return Err(ConformanceError::Validation(format!(
            "A needs at least 2 rows to interleave, {} returns {}",
            plan.a_sql, expected
        )));
    }

    let mut a_statement = check.step("creating A", open_statement(session, plan.kind, &plan.a_sql))?;
    let mut b_statement = check.step("creating B", open_statement(session, plan.kind, &plan.b_sql))?;

    let mut a = check.step("executing A", a_statement.execute(plan.a_params))?;
    check.expect_row(a.as_mut(), "A")?;

    let b_rows = {
        let mut b = check.step("executing B", b_statement.execute(plan.b_params))?;
        check.expect_row(b.as_mut(), "B")?;
        check.expect_open(a.as_ref(), "A", "after B was opened")?;

        let position = a.position();
        check.expect_row(a.as_mut(), "A")?;
        check.require(a.position() == position + 1, || {
            format!("A skipped from row {} to {}", position, a.position())
        })?;

        if plan.statement_flags {
            check.require(!b.statement_is_closed(), || {
                "B's statement reports closed before it was closed".to_string()
            })?;
        }

        let rows = b.position();
        check.step("closing B", b.close())?;
        rows
    };

    check.expect_open(a.as_ref(), "A", "after B was closed")?;

    if plan.statement_flags {
        check.require(!b_statement.is_closed(), || {
            "B's statement reports closed after only its cursor was closed".to_string()
        })?;
        check.step("closing B's statement", b_statement.close())?;
        check.require(b_statement.is_closed(), || {
            "B's statement does not report closed after close".to_string()
        })?;
        check.require(!a.statement_is_closed(), || {
            "A's statement reports closed after B's statement was closed".to_string()
        })?;
    }

    let a_rows = check.drain(a.as_mut(), "A")?;
    check.require(a_rows == expected, || {
        format!(
            "A reported end-of-data after {} rows, its query returns {}",
            a_rows, expected
        )
    })?;
    Ok(a_rows + b_rows)
}

pub(crate) fn open_close_non_interference(
    check: &Check,
    session: &dyn Session,
    fixture: &Fixture,
) -> Result<usize> {
    independence(
        check,
        session,
        &Plan {
            kind: StatementKind::Prepared,
            a_sql: fixture.all_children_sql(),
            a_count_sql: count_rows(&fixture.child_table),
            a_params: &[],
            b_sql: fixture.all_parents_sql(),
            b_params: &[],
            statement_flags: false,
        },
    )
}

pub(crate) fn statement_independence(
    check: &Check,
    session: &dyn Session,
    fixture: &Fixture,
) -> Result<usize> {
    independence(
        check,
        session,
        &Plan {
            kind: StatementKind::AdHoc,
            a_sql: fixture.all_children_sql(),
            a_count_sql: count_rows(&fixture.child_table),
            a_params: &[],
            b_sql: fixture.all_parents_sql(),
            b_params: &[],
            statement_flags: true,
        },
    )
}

pub(crate) fn parameterized_statement_independence(
    check: &Check,
    session: &dyn Session,
    fixture: &Fixture,
) -> Result<usize> {
    let key = ParamValue::String(first_parent_key(session, fixture)?);
    let params = [key];
    independence(
        check,
        session,
        &Plan {
            kind: StatementKind::Prepared,
            a_sql: fixture.children_of_parent_sql(),
            a_count_sql: fixture.count_children_of_parent_sql(),
            a_params: &params,
            b_sql: select_where_eq(&fixture.parent_table, &fixture.parent_key),
            b_params: &params,
            statement_flags: true,
        },
    )
}
