use odbc_api::handles::Record as OdbcRecord;
use thiserror::Error;

/// Error category for deciding how far an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fixture creation, migration or connection failed: abort the run.
    Setup,
    /// An isolation invariant was observed to be broken.
    Violation,
    /// The driver raised an error the caller did not anticipate.
    Driver,
    /// Invalid input or misuse of a handle.
    Validation,
}

#[derive(Error, Debug, Clone)]
pub enum ConformanceError {
    #[error("Driver error: {message}")]
    Driver {
        sqlstate: [u8; 5],
        native_code: i32,
        message: String,
    },

    #[error("Setup failure: {0}")]
    Setup(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid migration name: {0}")]
    MigrationName(String),

    #[error("Duplicate migration version: {0}")]
    DuplicateMigration(u32),

    #[error("Migration V{version} checksum mismatch: applied {applied}, resolved locally {local}")]
    ChecksumMismatch { version: u32, applied: u32, local: u32 },

    #[error("Migration V{version} description mismatch: applied '{applied}', resolved locally '{local}'")]
    DescriptionMismatch {
        version: u32,
        applied: String,
        local: String,
    },

    #[error("Migration V{0} was applied but is not resolved locally")]
    MissingMigration(u32),

    #[error("Migration V{0} is recorded as failed")]
    FailedMigration(u32),

    #[error("Migration V{version} is not applied but is older than current version V{current}")]
    OutOfOrderMigration { version: u32, current: u32 },

    #[error("Conformance violation in {scenario}: {message}")]
    Violation { scenario: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Type mismatch in column {column}: expected {expected}, found {found}")]
    TypeMismatch {
        column: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Cursor has no current row")]
    NoCurrentRow,

    #[error("Cursor is closed")]
    CursorClosed,

    #[error("Statement is closed")]
    StatementClosed,

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("SQL syntax error: {0}")]
    SqlSyntax(String),
}

impl From<odbc_api::Error> for ConformanceError {
    fn from(err: odbc_api::Error) -> Self {
        if let Some(structured) = try_extract_structured(&err) {
            return structured;
        }
        ConformanceError::Driver {
            sqlstate: [0u8; 5],
            native_code: 0,
            message: err.to_string(),
        }
    }
}

fn try_extract_structured(err: &odbc_api::Error) -> Option<ConformanceError> {
    use odbc_api::Error as OdbcErr;
    let record = match err {
        OdbcErr::Diagnostics { record, .. } => record,
        OdbcErr::UnsupportedOdbcApiVersion(record) => record,
        OdbcErr::InvalidRowArraySize { record, .. } => record,
        OdbcErr::UnableToRepresentNull(record) => record,
        _ => return None,
    };
    Some(driver_error_from_record(record))
}

fn driver_error_from_record(record: &OdbcRecord) -> ConformanceError {
    ConformanceError::Driver {
        sqlstate: record.state.0,
        native_code: record.native_error,
        message: record.to_string(),
    }
}

impl From<std::io::Error> for ConformanceError {
    fn from(err: std::io::Error) -> Self {
        ConformanceError::Io(err.to_string())
    }
}

impl From<sqlparser::parser::ParserError> for ConformanceError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        ConformanceError::SqlSyntax(err.to_string())
    }
}

impl From<serde_json::Error> for ConformanceError {
    fn from(err: serde_json::Error) -> Self {
        ConformanceError::Io(format!("JSON: {}", err))
    }
}

impl ConformanceError {
    /// Builds a driver error with an explicit SQLSTATE, as drivers without
    /// diagnostics records (the reference driver) report them.
    pub fn driver(sqlstate: &str, message: impl Into<String>) -> Self {
        let mut state = [b'0'; 5];
        for (slot, byte) in state.iter_mut().zip(sqlstate.bytes()) {
            *slot = byte;
        }
        ConformanceError::Driver {
            sqlstate: state,
            native_code: 0,
            message: message.into(),
        }
    }

    pub fn violation(scenario: impl Into<String>, message: impl Into<String>) -> Self {
        ConformanceError::Violation {
            scenario: scenario.into(),
            message: message.into(),
        }
    }

    pub fn sqlstate(&self) -> [u8; 5] {
        match self {
            ConformanceError::Driver { sqlstate, .. } => *sqlstate,
            _ => [0u8; 5],
        }
    }

    pub fn native_code(&self) -> i32 {
        match self {
            ConformanceError::Driver { native_code, .. } => *native_code,
            _ => 0,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ConformanceError::Driver { message, .. } => message.clone(),
            ConformanceError::Violation { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }

    /// True when the driver reports that the cursor it was asked to use no
    /// longer exists: invalid cursor state (24000) or function sequence
    /// error (HY010).
    pub fn is_invalid_cursor_state(&self) -> bool {
        match self {
            ConformanceError::Driver { sqlstate, .. } => {
                sqlstate == b"24000" || sqlstate == b"HY010"
            }
            ConformanceError::CursorClosed => true,
            _ => false,
        }
    }

    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            ConformanceError::Setup(_)
                | ConformanceError::Io(_)
                | ConformanceError::MigrationName(_)
                | ConformanceError::DuplicateMigration(_)
                | ConformanceError::ChecksumMismatch { .. }
                | ConformanceError::DescriptionMismatch { .. }
                | ConformanceError::MissingMigration(_)
                | ConformanceError::FailedMigration(_)
                | ConformanceError::OutOfOrderMigration { .. }
        )
    }

    /// Returns the error category for deciding whether the run continues
    pub fn error_category(&self) -> ErrorCategory {
        if self.is_setup_failure() {
            return ErrorCategory::Setup;
        }
        match self {
            ConformanceError::Violation { .. } => ErrorCategory::Violation,
            ConformanceError::Driver { .. } => ErrorCategory::Driver,
            _ => ErrorCategory::Validation,
        }
    }

    /// Wraps any non-setup error as a setup failure, keeping its message.
    pub fn into_setup(self) -> Self {
        if self.is_setup_failure() {
            self
        } else {
            ConformanceError::Setup(self.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ConformanceError>;
