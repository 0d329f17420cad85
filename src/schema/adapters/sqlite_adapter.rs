use crate::schema::{
    Result,
    adapters::DialectAdapter,
    config::NamingConfig,
    definitions::{ColumnSpec, TableSpec},
};

/// SQLite dialect adapter
#[derive(Debug, Default)]
pub struct SqliteAdapter;

impl SqliteAdapter {
    /// Create a new SQLite adapter
    pub fn new() -> Self {
        Self
    }
}

impl DialectAdapter for SqliteAdapter {
    fn generate_column_definition_sql(
        &self,
        column: &ColumnSpec,
        naming: &NamingConfig,
    ) -> Result<String> {
        let mut parts = vec![column.storage_name(naming), column.column_type().sql_name()];
        parts.extend(column.constraints().iter().cloned());
        Ok(parts.join(" "))
    }

    fn generate_create_table_sql(
        &self,
        table: &TableSpec,
        naming: &NamingConfig,
    ) -> Result<String> {
        let columns = table
            .columns()
            .iter()
            .map(|column| self.generate_column_definition_sql(column, naming))
            .collect::<Result<Vec<_>>>()?;

        Ok(format!(
            "CREATE TABLE {} ({})",
            table.storage_name(naming),
            columns.join(", ")
        ))
    }

    fn generate_drop_table_sql(&self, table: &TableSpec, naming: &NamingConfig) -> Result<String> {
        Ok(format!("DROP TABLE IF EXISTS {}", table.storage_name(naming)))
    }

    fn generate_version_trigger_sql(
        &self,
        table: &TableSpec,
        naming: &NamingConfig,
    ) -> Result<String> {
        let table_name = table.storage_name(naming);
        let version = table.version_column().storage_name(naming);
        let key = table.primary_key().storage_name(naming);

        // recursive_triggers is off by default, so the inner UPDATE does not
        // fire this trigger again.
        Ok(format!(
            "CREATE TRIGGER {trigger} AFTER UPDATE ON {table} FOR EACH ROW BEGIN \
             UPDATE {table} SET {version} = {version} + 1 WHERE {key} = OLD.{key}; END",
            trigger = self.trigger_name(table, naming),
            table = table_name,
            version = version,
            key = key,
        ))
    }

    fn generate_drop_trigger_sql(
        &self,
        table: &TableSpec,
        naming: &NamingConfig,
    ) -> Result<String> {
        Ok(format!(
            "DROP TRIGGER IF EXISTS {}",
            self.trigger_name(table, naming)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DatabaseValue, SqlLiteral};

    fn accounts() -> TableSpec {
        TableSpec::from_descriptor(
            "Accounts",
            &["id INTEGER PRIMARY KEY", "balance INTEGER", "version INTEGER @VERSION"],
        )
        .unwrap()
    }

    #[test]
    fn test_generate_column_definition() {
        let adapter = SqliteAdapter::new();
        let table = accounts();
        let naming = NamingConfig::default();

        assert_eq!(
            adapter
                .generate_column_definition_sql(table.primary_key(), &naming)
                .unwrap(),
            "c_id INTEGER PRIMARY KEY"
        );
        assert_eq!(
            adapter
                .generate_column_definition_sql(&table.columns()[1], &naming)
                .unwrap(),
            "c_balance INTEGER"
        );
    }

    #[test]
    fn test_generate_create_table() {
        let adapter = SqliteAdapter::new();
        let sql = adapter
            .generate_create_table_sql(&accounts(), &NamingConfig::unprefixed())
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE Accounts (id INTEGER PRIMARY KEY, balance INTEGER, version INTEGER DEFAULT 0)"
        );
        assert!(!sql.contains("@VERSION"));
    }

    #[test]
    fn test_generate_drop_and_trigger() {
        let adapter = SqliteAdapter::new();
        let table = accounts();
        let naming = NamingConfig::new("fb_", "c_");

        assert_eq!(
            adapter.generate_drop_table_sql(&table, &naming).unwrap(),
            "DROP TABLE IF EXISTS fb_Accounts"
        );
        assert_eq!(
            adapter.generate_version_trigger_sql(&table, &naming).unwrap(),
            "CREATE TRIGGER trigger_version_fb_Accounts AFTER UPDATE ON fb_Accounts FOR EACH ROW \
             BEGIN UPDATE fb_Accounts SET c_version = c_version + 1 WHERE c_id = OLD.c_id; END"
        );
        assert_eq!(
            adapter.generate_drop_trigger_sql(&table, &naming).unwrap(),
            "DROP TRIGGER IF EXISTS trigger_version_fb_Accounts"
        );
    }

    #[test]
    fn test_render_literal() {
        let adapter = SqliteAdapter::new();
        assert_eq!(
            adapter.render_literal(&DatabaseValue::from("it's")),
            SqlLiteral::text("it's")
        );
        assert_eq!(adapter.render_literal(&DatabaseValue::Null).as_sql(), "NULL");
    }
}
