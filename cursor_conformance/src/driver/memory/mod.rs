//! In-process reference driver.
//!
//! Databases are JSON files of tables plus canned query results. The
//! driver understands only the SQL the suite and the migrations emit, and
//! can be told to reproduce known driver defects through [`Fault`]s. Every
//! statement and cursor registers itself in a [`HandleRegistry`] whose
//! event log records when handles are opened and released.

mod database;
mod handles;
mod sql;

pub use database::{CannedResult, MemoryDatabase, MemoryTable, ResultRows};
pub use handles::{Fault, HandleEvent, HandleId, HandleKind, HandleRegistry, SharedRegistry};

use crate::driver::catalog::TableRef;
use crate::driver::{
    row_value, ColumnInfo, ColumnType, Cursor, ParamValue, Session, SessionOptions, Statement,
    StatementKind, Value,
};
use crate::error::{ConformanceError, Result};
use crate::harness::Backend;
use crate::migration::{Migration, Migrator, SqlHistoryStore};
use database::{CATALOG_NAME, SCHEMA_NAME};
use sql::Command;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

pub struct MemorySession {
    path: Option<PathBuf>,
    db: RefCell<MemoryDatabase>,
    snapshot: RefCell<Option<MemoryDatabase>>,
    options: SessionOptions,
    registry: SharedRegistry,
}

impl MemorySession {
    /// Session over a database that lives only as long as the session.
    pub fn in_memory(db: MemoryDatabase, options: SessionOptions, registry: SharedRegistry) -> Self {
        Self {
            path: None,
            db: RefCell::new(db),
            snapshot: RefCell::new(None),
            options,
            registry,
        }
    }

    /// Session over a database file; committed writes are saved back to it.
    pub fn open(path: &Path, options: SessionOptions, registry: SharedRegistry) -> Result<Self> {
        let db = MemoryDatabase::load(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            db: RefCell::new(db),
            snapshot: RefCell::new(None),
            options,
            registry,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    fn persist(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.db.borrow().save(path),
            None => Ok(()),
        }
    }

    fn query(&self, sql: &str, params: &[ParamValue]) -> Result<ResultRows> {
        let db = self.db.borrow();
        if let Some(result) = db.canned(sql) {
            return Ok(result);
        }
        match sql::parse(sql)? {
            Command::Select {
                projection,
                table,
                filter,
                order_by,
            } => db.select(&projection, &table, filter.as_ref(), order_by.as_deref(), params),
            _ => Err(ConformanceError::driver(
                "HY000",
                format!("Statement does not return a result set: {}", sql),
            )),
        }
    }

    fn open_cursor(&self, parent: Option<HandleId>, result: ResultRows) -> MemoryCursor {
        let id = self
            .registry
            .borrow_mut()
            .open_cursor(parent, self.options.stream_results);
        MemoryCursor::new(self.registry.clone(), id, result)
    }
}

impl Session for MemorySession {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn options(&self) -> SessionOptions {
        self.options
    }

    fn execute(&self, sql: &str, params: &[ParamValue]) -> Result<()> {
        let command = sql::parse(sql)?;
        match command {
            Command::Begin => {
                *self.snapshot.borrow_mut() = Some(self.db.borrow().clone());
                Ok(())
            }
            Command::Commit => {
                self.snapshot.borrow_mut().take();
                self.persist()
            }
            Command::Rollback => {
                if let Some(snapshot) = self.snapshot.borrow_mut().take() {
                    *self.db.borrow_mut() = snapshot;
                }
                Ok(())
            }
            Command::Extension(name) => {
                log::debug!("Extension {} is built into the reference driver", name);
                Ok(())
            }
            Command::Select { .. } => Err(ConformanceError::driver(
                "HY000",
                "Use a statement to run queries",
            )),
            write => {
                if self.options.read_only {
                    return Err(ConformanceError::driver(
                        "25006",
                        "Cannot execute statement in read-only mode",
                    ));
                }
                self.db.borrow_mut().apply(&write, params)?;
                if self.snapshot.borrow().is_none() {
                    self.persist()?;
                }
                Ok(())
            }
        }
    }

    fn create_statement(&self, sql: &str) -> Result<Box<dyn Statement + '_>> {
        Ok(Box::new(MemoryStatement::new(self, sql, StatementKind::AdHoc)))
    }

    fn prepare(&self, sql: &str) -> Result<Box<dyn Statement + '_>> {
        if self.db.borrow().canned(sql).is_none() {
            sql::parse(sql)?;
        }
        Ok(Box::new(MemoryStatement::new(self, sql, StatementKind::Prepared)))
    }

    fn list_tables(&self) -> Result<Box<dyn Cursor + '_>> {
        let rows = self
            .db
            .borrow()
            .tables
            .keys()
            .map(|name| {
                vec![
                    Value::from(CATALOG_NAME),
                    Value::from(SCHEMA_NAME),
                    Value::from(name.as_str()),
                    Value::from("BASE TABLE"),
                ]
            })
            .collect();
        let result = ResultRows {
            columns: vec![
                ColumnInfo::varchar("TABLE_CATALOG"),
                ColumnInfo::varchar("TABLE_SCHEMA"),
                ColumnInfo::varchar("TABLE_NAME"),
                ColumnInfo::varchar("TABLE_TYPE"),
            ],
            rows,
        };
        Ok(Box::new(self.open_cursor(None, result)))
    }

    fn list_columns(&self, table: &str) -> Result<Box<dyn Cursor + '_>> {
        let table_name = TableRef::parse(table)?.name;
        let rows = {
            let db = self.db.borrow();
            db.tables
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case(&table_name))
                .flat_map(|(name, t)| {
                    t.columns.iter().enumerate().map(move |(i, c)| {
                        vec![
                            Value::from(CATALOG_NAME),
                            Value::from(SCHEMA_NAME),
                            Value::from(name.as_str()),
                            Value::from(c.name.as_str()),
                            Value::Integer(i as i64 + 1),
                            Value::from(format!("{:?}", c.column_type).to_ascii_uppercase()),
                            Value::from("YES"),
                        ]
                    })
                })
                .collect()
        };
        let result = ResultRows {
            columns: vec![
                ColumnInfo::varchar("TABLE_CATALOG"),
                ColumnInfo::varchar("TABLE_SCHEMA"),
                ColumnInfo::varchar("TABLE_NAME"),
                ColumnInfo::varchar("COLUMN_NAME"),
                ColumnInfo::new("ORDINAL_POSITION", ColumnType::Integer),
                ColumnInfo::varchar("DATA_TYPE"),
                ColumnInfo::varchar("IS_NULLABLE"),
            ],
            rows,
        };
        Ok(Box::new(self.open_cursor(None, result)))
    }
}

pub struct MemoryStatement<'s> {
    session: &'s MemorySession,
    sql: String,
    kind: StatementKind,
    id: HandleId,
}

impl<'s> MemoryStatement<'s> {
    fn new(session: &'s MemorySession, sql: &str, kind: StatementKind) -> Self {
        let id = session.registry.borrow_mut().open_statement();
        Self {
            session,
            sql: sql.to_string(),
            kind,
            id,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }
}

impl Statement for MemoryStatement<'_> {
    fn kind(&self) -> StatementKind {
        self.kind
    }

    fn sql(&self) -> &str {
        &self.sql
    }

    fn execute(&mut self, params: &[ParamValue]) -> Result<Box<dyn Cursor + '_>> {
        if self.is_closed() {
            return Err(ConformanceError::StatementClosed);
        }
        if self.kind == StatementKind::AdHoc && !params.is_empty() {
            return Err(ConformanceError::Validation(
                "Ad-hoc statements take no parameters".to_string(),
            ));
        }
        let result = self.session.query(&self.sql, params)?;
        Ok(Box::new(self.session.open_cursor(Some(self.id), result)))
    }

    fn close(&mut self) -> Result<()> {
        self.session.registry.borrow_mut().close(self.id);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.session.registry.borrow().is_closed(self.id)
    }
}

impl Drop for MemoryStatement<'_> {
    fn drop(&mut self) {
        self.session.registry.borrow_mut().release(self.id);
    }
}

pub struct MemoryCursor {
    registry: SharedRegistry,
    id: HandleId,
    columns: Vec<ColumnInfo>,
    rows: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    position: usize,
    exhausted: bool,
    error_at_end: bool,
}

impl MemoryCursor {
    fn new(registry: SharedRegistry, id: HandleId, result: ResultRows) -> Self {
        let (truncate, error_at_end) = {
            let r = registry.borrow();
            (r.truncate_after(), r.has_fault(Fault::ErrorAtEndOfData))
        };
        let mut rows: VecDeque<Vec<Value>> = result.rows.into();
        if let Some(n) = truncate {
            rows.truncate(n);
        }
        Self {
            registry,
            id,
            columns: result.columns,
            rows,
            current: None,
            position: 0,
            exhausted: false,
            error_at_end,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }
}

impl Cursor for MemoryCursor {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn advance(&mut self) -> Result<bool> {
        {
            let registry = self.registry.borrow();
            if registry.is_explicitly_closed(self.id) {
                return Err(ConformanceError::CursorClosed);
            }
            if registry.is_closed_by_driver(self.id) {
                self.current = None;
                return Err(ConformanceError::driver(
                    "24000",
                    "Invalid cursor state: result set was closed",
                ));
            }
            if registry.is_ended_by_driver(self.id) {
                self.rows.clear();
            }
        }
        if self.exhausted {
            return Ok(false);
        }

        match self.rows.pop_front() {
            Some(row) => {
                self.current = Some(row);
                self.position += 1;
                Ok(true)
            }
            None => {
                self.current = None;
                self.exhausted = true;
                if self.error_at_end {
                    return Err(ConformanceError::driver(
                        "HY000",
                        format!("Fetch failed after row {}", self.position),
                    ));
                }
                Ok(false)
            }
        }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn value(&self, column: usize) -> Result<&Value> {
        if self.is_closed() {
            return Err(ConformanceError::CursorClosed);
        }
        row_value(self.current.as_deref(), column)
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        self.rows.clear();
        self.registry.borrow_mut().close(self.id);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.registry.borrow().is_closed(self.id)
    }

    fn statement_is_closed(&mut self) -> bool {
        self.registry.borrow().parent_is_closed(self.id)
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.registry.borrow_mut().release(self.id);
    }
}

/// Creates reference-driver database files from a template.
pub struct MemoryBackend {
    template: MemoryDatabase,
    registry: SharedRegistry,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(MemoryDatabase::with_spatial())
    }
}

impl MemoryBackend {
    pub fn new(template: MemoryDatabase) -> Self {
        Self {
            template,
            registry: HandleRegistry::shared(Vec::new()),
        }
    }

    pub fn with_faults(mut self, faults: Vec<Fault>) -> Self {
        self.registry = HandleRegistry::shared(faults);
        self
    }

    /// Registry shared by every session this backend opens.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn events(&self) -> Vec<HandleEvent> {
        self.registry.borrow().events().to_vec()
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn migrate(&self, location: &Path, migrations: &[Migration]) -> Result<usize> {
        if !location.exists() {
            self.template.save(location)?;
        }
        let writable = SessionOptions {
            read_only: false,
            stream_results: true,
        };
        let session = MemorySession::open(location, writable, HandleRegistry::shared(Vec::new()))?;
        let mut store = SqlHistoryStore::new(&session);
        Migrator::new(migrations.to_vec()).migrate(&mut store)
    }

    fn connect(&self, location: &Path, options: SessionOptions) -> Result<Box<dyn Session>> {
        Ok(Box::new(MemorySession::open(
            location,
            options,
            self.registry.clone(),
        )?))
    }
}
