// Extends DatabaseConnection with schema installation

use async_trait::async_trait;

use crate::database::{DatabaseConnection, DatabaseError, DatabaseResult, DatabaseTransaction};
use crate::schema::{
    Error as SchemaError, definitions::is_valid_identifier, definitions::Schema,
    generator::SchemaGenerator,
};

/// Column as reported by the storage catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledColumn {
    pub name: String,
    pub declared_type: String,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// Extension trait to add schema management functionality to DatabaseConnection
#[async_trait]
pub trait SchemaManager {
    /// Drop and recreate every table of `schema`, then install the version
    /// triggers unless `with_triggers` is false. Runs as one transaction.
    async fn install_schema(&self, schema: &Schema, with_triggers: bool) -> DatabaseResult<()>;

    /// Drop every table of `schema` together with its trigger
    async fn drop_schema(&self, schema: &Schema) -> DatabaseResult<()>;

    /// Columns of an installed table in declaration order
    async fn installed_columns(&self, table: &str) -> DatabaseResult<Vec<InstalledColumn>>;

    /// Names of the triggers currently installed
    async fn installed_triggers(&self) -> DatabaseResult<Vec<String>>;
}

/// Convert a schema error to DatabaseError
fn convert_error(err: SchemaError) -> DatabaseError {
    DatabaseError::Query(format!("Schema error: {}", err))
}

async fn run_in_transaction(
    tx: &mut Box<dyn DatabaseTransaction>,
    statements: &[String],
) -> DatabaseResult<()> {
    // Tables are dropped while others still reference them; check foreign
    // keys only at commit.
    tx.execute("PRAGMA defer_foreign_keys = ON", &[]).await?;
    for statement in statements {
        tx.execute(statement, &[]).await?;
    }
    Ok(())
}

async fn apply_statements<T>(conn: &T, statements: &[String]) -> DatabaseResult<()>
where
    T: ?Sized + DatabaseConnection,
{
    let mut tx = conn.begin_transaction().await?;
    match run_in_transaction(&mut tx, statements).await {
        Ok(()) => tx.commit().await,
        Err(e) => {
            tracing::error!(error = %e, "schema statement failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback after failed schema statement");
            }
            Err(e)
        }
    }
}

#[async_trait]
impl<T> SchemaManager for T
where
    T: ?Sized + DatabaseConnection,
{
    async fn install_schema(&self, schema: &Schema, with_triggers: bool) -> DatabaseResult<()> {
        let generator = SchemaGenerator::for_schema(schema);
        let statements = generator
            .install_statements(schema, with_triggers)
            .map_err(convert_error)?;

        apply_statements(self, &statements).await?;

        tracing::info!(
            tables = schema.tables().len(),
            triggers = with_triggers,
            "schema installed"
        );
        Ok(())
    }

    async fn drop_schema(&self, schema: &Schema) -> DatabaseResult<()> {
        let generator = SchemaGenerator::for_schema(schema);
        let statements = generator.drop_statements(schema).map_err(convert_error)?;

        apply_statements(self, &statements).await?;

        tracing::info!(tables = schema.tables().len(), "schema dropped");
        Ok(())
    }

    async fn installed_columns(&self, table: &str) -> DatabaseResult<Vec<InstalledColumn>> {
        if !is_valid_identifier(table) {
            return Err(DatabaseError::Configuration(format!(
                "{:?} is not a valid table name",
                table
            )));
        }

        let rows = self
            .query(&format!("PRAGMA table_info({})", table), &[])
            .await?;

        rows.iter()
            .map(|row| {
                Ok(InstalledColumn {
                    name: row.get_string("name")?,
                    declared_type: row.get_string("type")?,
                    default_value: row.try_get_string("dflt_value")?,
                    primary_key: row.get_i64("pk")? > 0,
                })
            })
            .collect()
    }

    async fn installed_triggers(&self) -> DatabaseResult<Vec<String>> {
        let rows = self
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'trigger' ORDER BY name",
                &[],
            )
            .await?;
        rows.iter().map(|row| row.get_string("name")).collect()
    }
}
