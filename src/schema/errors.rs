use std::error::Error as StdError;
use std::fmt;

/// Error types for schema description and SQL generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A column declaration could not be parsed or violates a column rule
    InvalidColumn(String),
    /// A table violates a table-level rule (key, version column, duplicates)
    InvalidTable(String),
    /// A schema violates a schema-level rule (duplicate tables)
    InvalidSchema(String),
    /// Error generating SQL
    SqlGeneration(String),
    /// A schema document could not be read or decoded
    Load(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidColumn(msg) => write!(f, "Invalid column: {}", msg),
            Error::InvalidTable(msg) => write!(f, "Invalid table: {}", msg),
            Error::InvalidSchema(msg) => write!(f, "Invalid schema: {}", msg),
            Error::SqlGeneration(msg) => write!(f, "SQL generation error: {}", msg),
            Error::Load(msg) => write!(f, "Schema load error: {}", msg),
        }
    }
}

impl StdError for Error {}

/// Convenience Result type for schema operations
pub type Result<T> = std::result::Result<T, Error>;

/// Helper to create an InvalidColumn error
pub fn invalid_column_error<S: Into<String>>(msg: S) -> Error {
    Error::InvalidColumn(msg.into())
}

/// Helper to create an InvalidTable error
pub fn invalid_table_error<S: Into<String>>(msg: S) -> Error {
    Error::InvalidTable(msg.into())
}

/// Helper to create an InvalidSchema error
pub fn invalid_schema_error<S: Into<String>>(msg: S) -> Error {
    Error::InvalidSchema(msg.into())
}

/// Helper to create a SqlGeneration error
pub fn sql_generation_error<S: Into<String>>(msg: S) -> Error {
    Error::SqlGeneration(msg.into())
}

/// Helper to create a Load error
pub fn load_error<S: Into<String>>(msg: S) -> Error {
    Error::Load(msg.into())
}

/// Non-fatal problem found while parsing a column declaration.
///
/// Parsing continues past a diagnostic; the offending token is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDiagnostic {
    pub table: String,
    pub column: String,
    pub message: String,
}

impl fmt::Display for SchemaDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.table, self.column, self.message)
    }
}
