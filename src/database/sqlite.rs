use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, TypeInfo, ValueRef};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::database::{
    DatabaseConfig, DatabaseConnection, DatabaseError, DatabaseResult, DatabaseRow,
    DatabaseTransaction, DatabaseType, DatabaseValue,
};

/// SQLite implementation of the database connection interface
pub struct SqliteConnection {
    pool: SqlitePool,
    statement_timeout: Duration,
}

impl SqliteConnection {
    /// Create a new SQLite connection from a configuration
    pub async fn connect(config: &DatabaseConfig) -> DatabaseResult<Self> {
        let database_url = build_sqlite_connection_string(config);
        let statement_timeout = config.pool.statement_timeout();

        // Ensure the directory exists if file-based
        if !config.is_in_memory() && !config.database.starts_with("file:") {
            if let Some(parent) = Path::new(&config.database).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        DatabaseError::Connection(format!(
                            "Failed to create directory for SQLite database: {}",
                            e
                        ))
                    })?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| DatabaseError::Configuration(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(statement_timeout);

        let pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.pool.acquire_timeout_seconds));

        // Every connection to `:memory:` opens its own database, so all
        // sessions have to share one long-lived connection.
        let pool_options = if config.is_in_memory() {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            pool_options
                .max_connections(config.pool.max_connections)
                .min_connections(config.pool.min_connections.min(config.pool.max_connections))
                .idle_timeout(Duration::from_secs(config.pool.idle_timeout_seconds))
                .max_lifetime(Duration::from_secs(config.pool.max_lifetime_seconds))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            statement_timeout,
        })
    }

    /// The bound applied to every statement run through this connection.
    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }
}

/// Convert a DatabaseConfig to a SQLite connection string
fn build_sqlite_connection_string(config: &DatabaseConfig) -> String {
    let mut connection_string = if config.is_in_memory() {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite:{}", config.database)
    };

    let mut params: Vec<_> = config.extra_params.iter().collect();
    params.sort();
    for (i, (key, value)) in params.into_iter().enumerate() {
        connection_string.push(if i == 0 { '?' } else { '&' });
        connection_string.push_str(&format!("{}={}", key, value));
    }

    connection_string
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [DatabaseValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            DatabaseValue::Null => query.bind(None::<String>),
            DatabaseValue::Boolean(b) => query.bind(*b),
            DatabaseValue::Integer(i) => query.bind(*i),
            DatabaseValue::Float(f) => query.bind(*f),
            DatabaseValue::Text(s) => query.bind(s.as_str()),
            DatabaseValue::Blob(b) => query.bind(b.as_slice()),
        };
    }
    query
}

fn map_sqlx_error(error: sqlx::Error) -> DatabaseError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DatabaseError::Connection(error.to_string()),
        other => DatabaseError::Query(other.to_string()),
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> DatabaseResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(map_sqlx_error),
        Err(_) => Err(DatabaseError::Timeout(limit)),
    }
}

/// SQLite implementation of the database row interface
pub struct SqliteRow {
    row: sqlx::sqlite::SqliteRow,
}

impl SqliteRow {
    fn column_error(kind: &str, column: &str, e: sqlx::Error) -> DatabaseError {
        DatabaseError::Query(format!("Failed to get {} column {}: {}", kind, column, e))
    }
}

impl DatabaseRow for SqliteRow {
    fn get_string(&self, column: &str) -> DatabaseResult<String> {
        self.row
            .try_get(column)
            .map_err(|e| Self::column_error("string", column, e))
    }

    fn get_i64(&self, column: &str) -> DatabaseResult<i64> {
        self.row
            .try_get(column)
            .map_err(|e| Self::column_error("i64", column, e))
    }

    fn get_f64(&self, column: &str) -> DatabaseResult<f64> {
        self.row
            .try_get(column)
            .map_err(|e| Self::column_error("f64", column, e))
    }

    fn get_bytes(&self, column: &str) -> DatabaseResult<Vec<u8>> {
        self.row
            .try_get(column)
            .map_err(|e| Self::column_error("bytes", column, e))
    }

    fn try_get_string(&self, column: &str) -> DatabaseResult<Option<String>> {
        match self.row.try_get::<Option<String>, _>(column) {
            Ok(value) => Ok(value),
            Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
            Err(e) => Err(Self::column_error("string", column, e)),
        }
    }

    fn get_value(&self, column: &str) -> DatabaseResult<DatabaseValue> {
        let storage_class = {
            let raw = self
                .row
                .try_get_raw(column)
                .map_err(|e| Self::column_error("raw", column, e))?;
            if raw.is_null() {
                return Ok(DatabaseValue::Null);
            }
            raw.type_info().name().to_ascii_uppercase()
        };

        match storage_class.as_str() {
            "INTEGER" | "BIGINT" | "BOOLEAN" => self.get_i64(column).map(DatabaseValue::Integer),
            "REAL" | "NUMERIC" => self.get_f64(column).map(DatabaseValue::Float),
            "BLOB" => self.get_bytes(column).map(DatabaseValue::Blob),
            _ => self.get_string(column).map(DatabaseValue::Text),
        }
    }
}

fn boxed_rows(rows: Vec<sqlx::sqlite::SqliteRow>) -> Vec<Box<dyn DatabaseRow>> {
    rows.into_iter()
        .map(|row| Box::new(SqliteRow { row }) as Box<dyn DatabaseRow>)
        .collect()
}

/// SQLite implementation of the database transaction interface
pub struct SqliteTransaction {
    transaction: sqlx::Transaction<'static, Sqlite>,
    statement_timeout: Duration,
}

#[async_trait]
impl DatabaseTransaction for SqliteTransaction {
    async fn execute(&mut self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        tracing::debug!(sql = query, "execute (transaction)");
        let result = bounded(
            self.statement_timeout,
            bind_params(sqlx::query(query), params).execute(&mut *self.transaction),
        )
        .await?;
        Ok(result.rows_affected())
    }

    async fn query(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>> {
        tracing::debug!(sql = query, "query (transaction)");
        let rows = bounded(
            self.statement_timeout,
            bind_params(sqlx::query(query), params).fetch_all(&mut *self.transaction),
        )
        .await?;
        Ok(boxed_rows(rows))
    }

    async fn query_one(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Option<Box<dyn DatabaseRow>>> {
        tracing::debug!(sql = query, "query_one (transaction)");
        let row = bounded(
            self.statement_timeout,
            bind_params(sqlx::query(query), params).fetch_optional(&mut *self.transaction),
        )
        .await?;
        Ok(row.map(|row| Box::new(SqliteRow { row }) as Box<dyn DatabaseRow>))
    }

    async fn commit(self: Box<Self>) -> DatabaseResult<()> {
        let SqliteTransaction {
            transaction,
            statement_timeout,
        } = *self;
        bounded(statement_timeout, transaction.commit())
            .await
            .map_err(|e| DatabaseError::Transaction(format!("Failed to commit transaction: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> DatabaseResult<()> {
        let SqliteTransaction {
            transaction,
            statement_timeout,
        } = *self;
        bounded(statement_timeout, transaction.rollback())
            .await
            .map_err(|e| {
                DatabaseError::Transaction(format!("Failed to rollback transaction: {}", e))
            })
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    async fn execute(&self, query: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        tracing::debug!(sql = query, "execute");
        let result = bounded(
            self.statement_timeout,
            bind_params(sqlx::query(query), params).execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected())
    }

    async fn query(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>> {
        tracing::debug!(sql = query, "query");
        let rows = bounded(
            self.statement_timeout,
            bind_params(sqlx::query(query), params).fetch_all(&self.pool),
        )
        .await?;
        Ok(boxed_rows(rows))
    }

    async fn query_one(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Option<Box<dyn DatabaseRow>>> {
        tracing::debug!(sql = query, "query_one");
        let row = bounded(
            self.statement_timeout,
            bind_params(sqlx::query(query), params).fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.map(|row| Box::new(SqliteRow { row }) as Box<dyn DatabaseRow>))
    }

    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>> {
        let transaction = bounded(self.statement_timeout, self.pool.begin())
            .await
            .map_err(|e| {
                DatabaseError::Transaction(format!("Failed to begin transaction: {}", e))
            })?;

        Ok(Box::new(SqliteTransaction {
            transaction,
            statement_timeout: self.statement_timeout,
        }) as Box<dyn DatabaseTransaction>)
    }

    fn get_database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    async fn ping(&self) -> DatabaseResult<()> {
        bounded(self.statement_timeout, sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to ping database: {}", e)))?;

        Ok(())
    }

    async fn close(&self) -> DatabaseResult<()> {
        self.pool.close().await;
        Ok(())
    }
}
