//! Tool and application configuration loaded from TOML.
//!
//! ```toml
//! [database]
//! database = "flybook.db"
//!
//! [naming]
//! column_prefix = "c_"
//!
//! [container]
//! strategy = "trigger"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::container::VersionStrategy;
use crate::database::DatabaseConfig;
use crate::schema::NamingConfig;
use crate::seed::SeedOptions;

/// Environment variable overriding `database.database`
pub const DATABASE_ENV: &str = "FLYBOOK_DATABASE";

/// Error category for configuration issues
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Row buffer settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default)]
    pub strategy: VersionStrategy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlybookConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub seed: SeedOptions,
}

impl FlybookConfig {
    /// Parse TOML text. Environment overrides are not applied.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: FlybookConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, then apply [`DATABASE_ENV`] if it is set.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Ok(database) = std::env::var(DATABASE_ENV) {
            config.apply_database_override(database)?;
        }
        tracing::debug!(path = %path.display(), database = %config.database.database, "configuration loaded");
        Ok(config)
    }

    fn apply_database_override(&mut self, database: String) -> Result<(), ConfigError> {
        if database.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{} is empty", DATABASE_ENV)));
        }
        tracing::info!(database = %database, "database overridden from environment");
        self.database.database = database;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.database.trim().is_empty() {
            return Err(ConfigError::Invalid("database path is empty".to_string()));
        }
        let pool = &self.database.pool;
        if pool.max_connections == 0 || pool.min_connections > pool.max_connections {
            return Err(ConfigError::Invalid(format!(
                "pool bounds {}..{} are not usable",
                pool.min_connections, pool.max_connections
            )));
        }
        if pool.statement_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "statement_timeout_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FlybookConfig::from_toml_str("").unwrap();
        assert!(config.database.is_in_memory());
        assert_eq!(config.naming, NamingConfig::default());
        assert_eq!(config.container.strategy, VersionStrategy::Trigger);
        assert_eq!(config.database.pool.statement_timeout_seconds, 30);
    }

    #[test]
    fn test_full_file() {
        let config = FlybookConfig::from_toml_str(
            r#"
            [database]
            database = "/tmp/logbook.db"

            [database.pool]
            statement_timeout_seconds = 5

            [naming]
            table_prefix = "fb_"
            column_prefix = ""

            [container]
            strategy = "explicit"

            [seed]
            flights_per_user = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.database.database, "/tmp/logbook.db");
        assert_eq!(config.database.pool.statement_timeout_seconds, 5);
        assert_eq!(config.naming.table_name("Users"), "fb_Users");
        assert_eq!(config.naming.column_name("email"), "email");
        assert_eq!(config.container.strategy, VersionStrategy::Explicit);
        assert_eq!(config.seed.flights_per_user, 4);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            FlybookConfig::from_toml_str("[database]\ndatabase = \"\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FlybookConfig::from_toml_str("[database]\ndatabase = \"x.db\"\n[database.pool]\nmax_connections = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FlybookConfig::from_toml_str("[container]\nstrategy = \"sometimes\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database]\ndatabase = \"logbook.db\"").unwrap();

        let config = FlybookConfig::load(file.path()).unwrap();
        // The override may be set in the environment running the tests.
        if std::env::var(DATABASE_ENV).is_err() {
            assert_eq!(config.database.database, "logbook.db");
        }

        let missing = FlybookConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_database_override() {
        let mut config = FlybookConfig::default();
        config
            .apply_database_override("elsewhere.db".to_string())
            .unwrap();
        assert_eq!(config.database.database, "elsewhere.db");
        assert!(config.apply_database_override("  ".to_string()).is_err());
    }
}
