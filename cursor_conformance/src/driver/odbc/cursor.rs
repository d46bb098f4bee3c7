use super::cell_reader::read_cell_value;
use crate::driver::{row_value, ColumnInfo, ColumnType, Cursor, Value};
use crate::error::{ConformanceError, Result};
use std::collections::VecDeque;

/// Adapts an `odbc_api` cursor to [`Cursor`].
///
/// In streaming mode every `advance` fetches one row from the driver. In
/// buffered mode the whole result is fetched on open and the driver cursor
/// is released right away, so later driver activity cannot affect it.
pub struct OdbcCursor<C: odbc_api::Cursor> {
    inner: Option<C>,
    columns: Vec<ColumnInfo>,
    buffered: Option<VecDeque<Vec<Value>>>,
    current: Option<Vec<Value>>,
    position: usize,
    exhausted: bool,
    closed: bool,
    closed_by_driver: bool,
}

impl<C: odbc_api::Cursor> OdbcCursor<C> {
    pub fn open(mut cursor: C, stream_results: bool) -> Result<Self> {
        let columns = describe_columns(&mut cursor)?;
        let mut this = Self {
            inner: Some(cursor),
            columns,
            buffered: None,
            current: None,
            position: 0,
            exhausted: false,
            closed: false,
            closed_by_driver: false,
        };

        if !stream_results {
            let mut rows = VecDeque::new();
            while let Some(row) = this.fetch_from_driver()? {
                rows.push_back(row);
            }
            this.inner = None;
            log::debug!("Buffered {} rows, driver cursor released", rows.len());
            this.buffered = Some(rows);
        }

        Ok(this)
    }

    fn fetch_from_driver(&mut self) -> Result<Option<Vec<Value>>> {
        let Some(cursor) = self.inner.as_mut() else {
            return Ok(None);
        };
        let Some(mut row) = cursor.next_row().map_err(ConformanceError::from)? else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(self.columns.len());
        for (col_idx, column) in self.columns.iter().enumerate() {
            let col_number: u16 = (col_idx + 1).try_into().map_err(|_| {
                ConformanceError::Validation("Invalid column number".to_string())
            })?;
            values.push(read_cell_value(&mut row, col_number, column.column_type)?);
        }
        Ok(Some(values))
    }

    fn fetch_next(&mut self) -> Result<Option<Vec<Value>>> {
        match self.buffered.as_mut() {
            Some(rows) => Ok(rows.pop_front()),
            None => self.fetch_from_driver(),
        }
    }
}

fn describe_columns<C: odbc_api::Cursor>(cursor: &mut C) -> Result<Vec<ColumnInfo>> {
    let cols_i16 = cursor.num_result_cols().map_err(ConformanceError::from)?;
    let cols_u16: u16 = cols_i16
        .try_into()
        .map_err(|_| ConformanceError::Validation("Invalid column count".to_string()))?;

    let mut columns = Vec::with_capacity(cols_u16.into());
    for col_idx in 1..=cols_u16 {
        let col_name = cursor.col_name(col_idx).map_err(ConformanceError::from)?;
        let col_type = cursor
            .col_data_type(col_idx)
            .map_err(ConformanceError::from)?;
        let sql_type_code = ColumnType::sql_type_code_from_data_type(&col_type);
        columns.push(ColumnInfo::new(
            col_name.to_string(),
            ColumnType::from_odbc_sql_type(sql_type_code),
        ));
    }
    Ok(columns)
}

impl<C: odbc_api::Cursor> Cursor for OdbcCursor<C> {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn advance(&mut self) -> Result<bool> {
        if self.closed || self.closed_by_driver {
            return Err(ConformanceError::CursorClosed);
        }
        if self.exhausted {
            return Ok(false);
        }

        match self.fetch_next() {
            Ok(Some(row)) => {
                self.current = Some(row);
                self.position += 1;
                Ok(true)
            }
            Ok(None) => {
                self.current = None;
                self.exhausted = true;
                Ok(false)
            }
            Err(e) => {
                if e.is_invalid_cursor_state() {
                    log::warn!(
                        "Driver invalidated cursor after {} rows: {}",
                        self.position,
                        e
                    );
                    self.closed_by_driver = true;
                }
                Err(e)
            }
        }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn value(&self, column: usize) -> Result<&Value> {
        if self.closed {
            return Err(ConformanceError::CursorClosed);
        }
        row_value(self.current.as_deref(), column)
    }

    fn close(&mut self) -> Result<()> {
        self.inner = None;
        self.buffered = None;
        self.current = None;
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed || self.closed_by_driver
    }

    fn statement_is_closed(&mut self) -> bool {
        match self.inner.as_mut() {
            // SQLNumResultCols fails once the driver has dropped the statement.
            Some(cursor) => cursor.num_result_cols().is_err(),
            None => false,
        }
    }
}
