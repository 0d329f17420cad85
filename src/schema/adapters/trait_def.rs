use crate::database::{DatabaseValue, SqlLiteral};
use crate::schema::{
    Result,
    config::NamingConfig,
    definitions::{ColumnSpec, TableSpec},
};

/// Trait defining dialect-specific SQL rendering for the logbook schema
pub trait DialectAdapter: Send + Sync {
    /// Generate SQL for a column definition
    fn generate_column_definition_sql(
        &self,
        column: &ColumnSpec,
        naming: &NamingConfig,
    ) -> Result<String>;

    /// Generate CREATE TABLE SQL for a table
    fn generate_create_table_sql(&self, table: &TableSpec, naming: &NamingConfig)
        -> Result<String>;

    /// Generate DROP TABLE SQL
    fn generate_drop_table_sql(&self, table: &TableSpec, naming: &NamingConfig) -> Result<String>;

    /// Generate the trigger that bumps the version column after every update
    fn generate_version_trigger_sql(
        &self,
        table: &TableSpec,
        naming: &NamingConfig,
    ) -> Result<String>;

    /// Generate SQL removing the version trigger
    fn generate_drop_trigger_sql(&self, table: &TableSpec, naming: &NamingConfig)
        -> Result<String>;

    /// Name of the version trigger for a table
    fn trigger_name(&self, table: &TableSpec, naming: &NamingConfig) -> String {
        format!("trigger_version_{}", table.storage_name(naming))
    }

    /// Render a value as a literal for inlining into a statement
    fn render_literal(&self, value: &DatabaseValue) -> SqlLiteral {
        SqlLiteral::from_value(value)
    }
}
