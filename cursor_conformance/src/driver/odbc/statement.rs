use super::cursor::OdbcCursor;
use crate::driver::{param_values_to_strings, Cursor, ParamValue, Statement, StatementKind};
use crate::error::{ConformanceError, Result};
use odbc_api::handles::StatementImpl;
use odbc_api::{Connection, Prepared};

/// Binds up to five text parameters and evaluates `$call` with them.
macro_rules! with_text_params {
    ($strings:expr, |$params:ident| $call:expr) => {{
        let strings: &[String] = $strings;
        match strings.len() {
            0 => {
                let $params = ();
                $call
            }
            1 => {
                let p0 = odbc_api::IntoParameter::into_parameter(strings[0].as_str());
                let $params = (&p0,);
                $call
            }
            2 => {
                let p0 = odbc_api::IntoParameter::into_parameter(strings[0].as_str());
                let p1 = odbc_api::IntoParameter::into_parameter(strings[1].as_str());
                let $params = (&p0, &p1);
                $call
            }
            3 => {
                let p0 = odbc_api::IntoParameter::into_parameter(strings[0].as_str());
                let p1 = odbc_api::IntoParameter::into_parameter(strings[1].as_str());
                let p2 = odbc_api::IntoParameter::into_parameter(strings[2].as_str());
                let $params = (&p0, &p1, &p2);
                $call
            }
            4 => {
                let p0 = odbc_api::IntoParameter::into_parameter(strings[0].as_str());
                let p1 = odbc_api::IntoParameter::into_parameter(strings[1].as_str());
                let p2 = odbc_api::IntoParameter::into_parameter(strings[2].as_str());
                let p3 = odbc_api::IntoParameter::into_parameter(strings[3].as_str());
                let $params = (&p0, &p1, &p2, &p3);
                $call
            }
            5 => {
                let p0 = odbc_api::IntoParameter::into_parameter(strings[0].as_str());
                let p1 = odbc_api::IntoParameter::into_parameter(strings[1].as_str());
                let p2 = odbc_api::IntoParameter::into_parameter(strings[2].as_str());
                let p3 = odbc_api::IntoParameter::into_parameter(strings[3].as_str());
                let p4 = odbc_api::IntoParameter::into_parameter(strings[4].as_str());
                let $params = (&p0, &p1, &p2, &p3, &p4);
                $call
            }
            n => {
                return Err($crate::error::ConformanceError::Validation(format!(
                    "At most 5 parameters supported, got {}",
                    n
                )))
            }
        }
    }};
}

pub(crate) use with_text_params;

/// `SELECT` executed through SQLPrepare/SQLExecute.
pub struct OdbcPreparedStatement<'c> {
    sql: String,
    prepared: Option<Prepared<StatementImpl<'c>>>,
    stream_results: bool,
}

impl<'c> OdbcPreparedStatement<'c> {
    pub fn prepare(conn: &'c Connection<'static>, sql: &str, stream_results: bool) -> Result<Self> {
        let prepared = conn.prepare(sql).map_err(ConformanceError::from)?;
        Ok(Self {
            sql: sql.to_string(),
            prepared: Some(prepared),
            stream_results,
        })
    }
}

impl Statement for OdbcPreparedStatement<'_> {
    fn kind(&self) -> StatementKind {
        StatementKind::Prepared
    }

    fn sql(&self) -> &str {
        &self.sql
    }

    fn execute(&mut self, params: &[ParamValue]) -> Result<Box<dyn Cursor + '_>> {
        let strings = param_values_to_strings(params)?;
        let stream_results = self.stream_results;
        let prepared = self
            .prepared
            .as_mut()
            .ok_or(ConformanceError::StatementClosed)?;

        let cursor = with_text_params!(&strings, |p| prepared
            .execute(p)
            .map_err(ConformanceError::from)?);

        match cursor {
            Some(cursor) => Ok(Box::new(OdbcCursor::open(cursor, stream_results)?)),
            None => Err(ConformanceError::Validation(format!(
                "Statement produced no result set: {}",
                self.sql
            ))),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.prepared = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.prepared.is_none()
    }
}

/// `SELECT` executed directly (SQLExecDirect); every execution allocates
/// its own statement handle owned by the returned cursor.
pub struct OdbcAdHocStatement<'c> {
    conn: &'c Connection<'static>,
    sql: String,
    closed: bool,
    stream_results: bool,
}

impl<'c> OdbcAdHocStatement<'c> {
    pub fn new(conn: &'c Connection<'static>, sql: &str, stream_results: bool) -> Self {
        Self {
            conn,
            sql: sql.to_string(),
            closed: false,
            stream_results,
        }
    }
}

impl Statement for OdbcAdHocStatement<'_> {
    fn kind(&self) -> StatementKind {
        StatementKind::AdHoc
    }

    fn sql(&self) -> &str {
        &self.sql
    }

    fn execute(&mut self, params: &[ParamValue]) -> Result<Box<dyn Cursor + '_>> {
        if self.closed {
            return Err(ConformanceError::StatementClosed);
        }
        if !params.is_empty() {
            return Err(ConformanceError::Validation(
                "Ad-hoc statements take no parameters".to_string(),
            ));
        }

        let cursor = self
            .conn
            .execute(&self.sql, (), None)
            .map_err(ConformanceError::from)?;

        match cursor {
            Some(cursor) => Ok(Box::new(OdbcCursor::open(cursor, self.stream_results)?)),
            None => Err(ConformanceError::Validation(format!(
                "Statement produced no result set: {}",
                self.sql
            ))),
        }
    }

    /// Local bookkeeping only: there is no statement handle to free here,
    /// each cursor owns its own. Use [`Cursor::statement_is_closed`] to ask
    /// the driver whether an ad-hoc cursor's statement is still alive.
    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    /// Reports the local flag set by [`Statement::close`], never driver state.
    fn is_closed(&self) -> bool {
        self.closed
    }
}
