use indexmap::IndexMap;
use std::fmt::Write as _;

use crate::schema::{
    Result,
    adapters::{DialectAdapter, SqliteAdapter},
    config::NamingConfig,
    definitions::{Schema, TableSpec},
    errors::sql_generation_error,
};

/// Service for generating DDL, triggers and the constants artifact
pub struct SchemaGenerator {
    /// The dialect adapter to use for SQL generation
    adapter: Box<dyn DialectAdapter>,
    naming: NamingConfig,
}

impl SchemaGenerator {
    /// Create a new SchemaGenerator with the given adapter and naming
    pub fn new(adapter: Box<dyn DialectAdapter>, naming: NamingConfig) -> Self {
        Self { adapter, naming }
    }

    /// SQLite generator using the naming of `schema`
    pub fn for_schema(schema: &Schema) -> Self {
        Self::new(Box::new(SqliteAdapter::new()), schema.naming().clone())
    }

    pub fn naming(&self) -> &NamingConfig {
        &self.naming
    }

    /// Get the dialect adapter used by this generator
    pub fn adapter(&self) -> &dyn DialectAdapter {
        &*self.adapter
    }

    /// `DROP TABLE IF EXISTS <table>`
    pub fn drop_statement(&self, table: &TableSpec) -> Result<String> {
        self.adapter.generate_drop_table_sql(table, &self.naming)
    }

    /// `CREATE TABLE <table> (<col> <TYPE> <constraints>, ...)`
    pub fn create_statement(&self, table: &TableSpec) -> Result<String> {
        self.adapter.generate_create_table_sql(table, &self.naming)
    }

    /// The AFTER UPDATE trigger that increments the version column.
    pub fn version_trigger(&self, table: &TableSpec) -> Result<String> {
        self.adapter.generate_version_trigger_sql(table, &self.naming)
    }

    pub fn drop_trigger_statement(&self, table: &TableSpec) -> Result<String> {
        self.adapter.generate_drop_trigger_sql(table, &self.naming)
    }

    /// Statements that rebuild every table, in execution order: drop and
    /// create per table, then the version triggers.
    pub fn install_statements(&self, schema: &Schema, with_triggers: bool) -> Result<Vec<String>> {
        if schema.tables().is_empty() {
            return Err(sql_generation_error("schema has no tables"));
        }

        let mut statements = Vec::new();
        for table in schema.tables() {
            statements.push(self.drop_statement(table)?);
            statements.push(self.create_statement(table)?);
        }
        if with_triggers {
            for table in schema.tables() {
                statements.push(self.version_trigger(table)?);
            }
        }
        Ok(statements)
    }

    /// Statements that remove every table of the schema, last table first.
    pub fn drop_statements(&self, schema: &Schema) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        for table in schema.tables().iter().rev() {
            statements.push(self.drop_trigger_statement(table)?);
            statements.push(self.drop_statement(table)?);
        }
        Ok(statements)
    }

    /// Generate the complete SQL script that installs the schema
    pub fn generate_schema_script(&self, schema: &Schema) -> Result<String> {
        let mut script = String::new();
        for statement in self.install_statements(schema, true)? {
            script.push_str(&statement);
            script.push_str(";\n");
        }
        Ok(script)
    }

    /// Name/value pairs for application glue, in schema order.
    ///
    /// Tables map as `TABLE_<TABLE>`, columns as `<TABLE>_<COLUMN>`, both
    /// upper-cased and holding the prefixed storage name. Two entries mapping
    /// to the same constant name (`A_B.C` and `A.B_C`) are an error.
    pub fn generate_constants(&self, schema: &Schema) -> Result<IndexMap<String, String>> {
        let mut constants = IndexMap::new();
        let mut define = |name: String, value: String| {
            if constants.contains_key(&name) {
                return Err(sql_generation_error(format!(
                    "constant name {} is produced more than once",
                    name
                )));
            }
            constants.insert(name, value);
            Ok(())
        };

        define("TBLPREFIX".to_string(), self.naming.table_prefix.clone())?;
        define("COLPREFIX".to_string(), self.naming.column_prefix.clone())?;
        for table in schema.tables() {
            define(
                format!("TABLE_{}", table.name().to_ascii_uppercase()),
                table.storage_name(&self.naming),
            )?;
        }
        for table in schema.tables() {
            for column in table.columns() {
                define(
                    format!(
                        "{}_{}",
                        table.name().to_ascii_uppercase(),
                        column.name().to_ascii_uppercase()
                    ),
                    column.storage_name(&self.naming),
                )?;
            }
        }
        Ok(constants)
    }

    /// Render the constants as a Rust module body.
    pub fn render_constants_module(&self, schema: &Schema) -> Result<String> {
        let constants = self.generate_constants(schema)?;
        let mut out = String::new();
        out.push_str("//! Table and column names of the logbook schema.\n");
        out.push_str("//!\n");
        out.push_str("//! Generated by `flybook-db constants`.\n");

        // Blank-line separated sections: prefixes, tables, then one per table.
        let mut sections = vec![2, schema.tables().len()];
        sections.extend(schema.tables().iter().map(|t| t.columns().len()));

        let mut entries = constants.iter();
        for size in sections {
            out.push('\n');
            for (name, value) in entries.by_ref().take(size) {
                // Debug formatting of a str is a valid Rust string literal.
                let _ = writeln!(out, "pub const {}: &str = {:?};", name, value);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts_schema(naming: NamingConfig) -> Schema {
        let accounts = TableSpec::from_descriptor(
            "Accounts",
            &["id INTEGER PRIMARY KEY", "balance INTEGER", "version INTEGER @VERSION"],
        )
        .unwrap();
        let owners = TableSpec::from_descriptor(
            "Owners",
            &["name TEXT PRIMARY KEY", "optlock INTEGER @VERSION"],
        )
        .unwrap();
        Schema::new(naming, vec![accounts, owners]).unwrap()
    }

    #[test]
    fn test_generate_schema_script() {
        let schema = accounts_schema(NamingConfig::unprefixed());
        let generator = SchemaGenerator::for_schema(&schema);
        let script = generator.generate_schema_script(&schema).unwrap();

        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "DROP TABLE IF EXISTS Accounts;");
        assert_eq!(
            lines[1],
            "CREATE TABLE Accounts (id INTEGER PRIMARY KEY, balance INTEGER, version INTEGER DEFAULT 0);"
        );
        assert_eq!(lines[2], "DROP TABLE IF EXISTS Owners;");
        assert!(lines[4].starts_with("CREATE TRIGGER trigger_version_Accounts AFTER UPDATE ON Accounts"));
        assert!(lines[5].starts_with("CREATE TRIGGER trigger_version_Owners"));
    }

    #[test]
    fn test_install_statements_without_triggers() {
        let schema = accounts_schema(NamingConfig::default());
        let generator = SchemaGenerator::for_schema(&schema);
        let statements = generator.install_statements(&schema, false).unwrap();
        assert_eq!(statements.len(), 4);
        assert!(statements.iter().all(|s| !s.contains("TRIGGER")));
    }

    #[test]
    fn test_drop_statements_reverse_order() {
        let schema = accounts_schema(NamingConfig::default());
        let generator = SchemaGenerator::for_schema(&schema);
        let statements = generator.drop_statements(&schema).unwrap();
        assert_eq!(statements[0], "DROP TRIGGER IF EXISTS trigger_version_Owners");
        assert_eq!(statements[3], "DROP TABLE IF EXISTS Accounts");
    }

    #[test]
    fn test_generate_constants() {
        let schema = accounts_schema(NamingConfig::default());
        let generator = SchemaGenerator::for_schema(&schema);
        let constants = generator.generate_constants(&schema).unwrap();

        assert_eq!(constants["TBLPREFIX"], "");
        assert_eq!(constants["COLPREFIX"], "c_");
        assert_eq!(constants["TABLE_ACCOUNTS"], "Accounts");
        assert_eq!(constants["ACCOUNTS_BALANCE"], "c_balance");
        assert_eq!(constants["OWNERS_OPTLOCK"], "c_optlock");
        let keys: Vec<&str> = constants.keys().map(String::as_str).collect();
        assert_eq!(&keys[..4], ["TBLPREFIX", "COLPREFIX", "TABLE_ACCOUNTS", "TABLE_OWNERS"]);
    }

    #[test]
    fn test_render_constants_module() {
        let schema = accounts_schema(NamingConfig::default());
        let module = SchemaGenerator::for_schema(&schema)
            .render_constants_module(&schema)
            .unwrap();
        assert!(module.contains("pub const TABLE_ACCOUNTS: &str = \"Accounts\";\n"));
        assert!(module.contains("pub const ACCOUNTS_ID: &str = \"c_id\";\n"));
        assert!(module.contains("\n\npub const OWNERS_NAME"));
    }

    #[test]
    fn test_colliding_constant_names_are_an_error() {
        let joined = TableSpec::from_descriptor(
            "A_B",
            &["C TEXT PRIMARY KEY", "optlock INTEGER @VERSION"],
        )
        .unwrap();
        let split = TableSpec::from_descriptor(
            "A",
            &["B_C TEXT PRIMARY KEY", "optlock INTEGER @VERSION"],
        )
        .unwrap();
        let schema = Schema::new(NamingConfig::default(), vec![joined, split]).unwrap();
        let generator = SchemaGenerator::for_schema(&schema);

        let err = generator.generate_constants(&schema).unwrap_err();
        assert!(err.to_string().contains("A_B_C"), "{err}");
        assert!(generator.render_constants_module(&schema).is_err());
    }

    #[test]
    fn test_empty_schema_is_an_error() {
        let schema = Schema::new(NamingConfig::default(), Vec::new()).unwrap();
        let generator = SchemaGenerator::for_schema(&schema);
        assert!(generator.generate_schema_script(&schema).is_err());
    }
}
