use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Error type for database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("query error: {0}")]
    Query(String),

    /// Transaction error
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A statement exceeded the configured statement timeout
    #[error("statement timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// SQLite database
    #[default]
    Sqlite,
}

impl Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Database configuration for establishing connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Type of database to connect to
    #[serde(default)]
    pub db_type: DatabaseType,

    /// File path of the database, or `:memory:`
    pub database: String,

    /// Connection pool settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Additional connection parameters as key-value pairs
    #[serde(default)]
    pub extra_params: std::collections::HashMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: DatabaseType::Sqlite,
            database: ":memory:".to_string(),
            pool: PoolConfig::default(),
            extra_params: std::collections::HashMap::new(),
        }
    }
}

impl DatabaseConfig {
    /// Whether this configuration points at a private in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database == ":memory:"
    }
}

/// Configuration for connection pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection idle timeout
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,

    /// Connection max lifetime
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_seconds: u64,

    /// Connection acquisition timeout
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,

    /// Upper bound for every statement executed through a connection
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_seconds: u64,
}

fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    2
}
fn default_idle_timeout() -> u64 {
    300
} // 5 minutes
fn default_max_lifetime() -> u64 {
    1800
} // 30 minutes
fn default_acquire_timeout() -> u64 {
    30
}
fn default_statement_timeout() -> u64 {
    30
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            idle_timeout_seconds: default_idle_timeout(),
            max_lifetime_seconds: default_max_lifetime(),
            acquire_timeout_seconds: default_acquire_timeout(),
            statement_timeout_seconds: default_statement_timeout(),
        }
    }
}

impl PoolConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_seconds)
    }
}

/// Represents a row from a database query
pub trait DatabaseRow: Send + Sync {
    /// Get a column value by name
    fn get_string(&self, column: &str) -> DatabaseResult<String>;
    fn get_i64(&self, column: &str) -> DatabaseResult<i64>;
    fn get_f64(&self, column: &str) -> DatabaseResult<f64>;
    fn get_bytes(&self, column: &str) -> DatabaseResult<Vec<u8>>;

    /// Try to get a column value by name, returning None if the column doesn't exist or is NULL
    fn try_get_string(&self, column: &str) -> DatabaseResult<Option<String>>;

    /// Decode a column using the storage class of the stored value.
    fn get_value(&self, column: &str) -> DatabaseResult<DatabaseValue>;
}

/// Core database connection interface
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Execute a query that returns no rows
    async fn execute(&self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<u64>;

    /// Execute a query that returns rows
    async fn query(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>>;

    /// Execute a query that returns a single row
    async fn query_one(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Option<Box<dyn DatabaseRow>>>;

    /// Begin a transaction
    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>>;

    /// Get the underlying database type
    fn get_database_type(&self) -> DatabaseType;

    /// Check if the connection is alive
    async fn ping(&self) -> DatabaseResult<()>;

    /// Close the connection
    async fn close(&self) -> DatabaseResult<()>;
}

/// Database transaction interface.
///
/// Statements run with autocommit suspended until [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) consumes the transaction.
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a query within the transaction that returns no rows
    async fn execute(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<u64>;

    /// Execute a query within the transaction that returns rows
    async fn query(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>>;

    /// Execute a query within the transaction that returns a single row
    async fn query_one(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Option<Box<dyn DatabaseRow>>>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> DatabaseResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> DatabaseResult<()>;
}

/// Represents a parameter value for database queries
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    /// Binary data
    Blob(Vec<u8>),
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Integer(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Integer(i64::from(value))
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float(value)
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Boolean(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::Text(value.to_string())
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::Text(value)
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Blob(value)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DatabaseValue::Null)
    }
}

/// Open a connection for the given configuration.
pub async fn create_database_connection(
    config: &DatabaseConfig,
) -> DatabaseResult<Box<dyn DatabaseConnection>> {
    let connection = match config.db_type {
        DatabaseType::Sqlite => {
            let conn = sqlite::SqliteConnection::connect(config).await?;
            Box::new(conn) as Box<dyn DatabaseConnection>
        }
    };

    tracing::debug!(
        db_type = %connection.get_database_type(),
        database = %config.database,
        "database connection established"
    );

    Ok(connection)
}

mod literal;
mod sqlite;
pub use literal::SqlLiteral;
pub use sqlite::{SqliteConnection, SqliteTransaction};

#[cfg(test)]
mod tests;

/// Convenience constructors for database configurations.
pub mod extensions {
    use super::DatabaseConfig;

    /// Create a SQLite connection configuration
    pub fn sqlite_config(database_path: impl Into<String>) -> DatabaseConfig {
        DatabaseConfig {
            db_type: crate::database::DatabaseType::Sqlite,
            database: database_path.into(),
            ..Default::default()
        }
    }

    /// Create a configuration for a private in-memory database
    pub fn in_memory_config() -> DatabaseConfig {
        DatabaseConfig::default()
    }
}
