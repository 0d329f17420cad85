use serde::{Deserialize, Serialize};

/// Prefixes applied to table and column names when they reach storage.
///
/// The logbook keeps tables unprefixed and stores every column as `c_<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default)]
    pub table_prefix: String,
    #[serde(default = "default_column_prefix")]
    pub column_prefix: String,
}

fn default_column_prefix() -> String {
    "c_".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            column_prefix: default_column_prefix(),
        }
    }
}

impl NamingConfig {
    /// Create a naming configuration with explicit prefixes.
    pub fn new(table_prefix: impl Into<String>, column_prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: table_prefix.into(),
            column_prefix: column_prefix.into(),
        }
    }

    /// Naming that stores names exactly as declared.
    pub fn unprefixed() -> Self {
        Self::new("", "")
    }

    pub fn table_name(&self, table: &str) -> String {
        format!("{}{}", self.table_prefix, table)
    }

    pub fn column_name(&self, column: &str) -> String {
        format!("{}{}", self.column_prefix, column)
    }
}
