//! Versioned SQLite data layer for the Flybook flight logbook.
//!
//! Tables are described once in [`schema`], installed with a per-table
//! version trigger, and edited through [`container::TableContainer`] buffers
//! whose commits are guarded by optimistic locking.

pub mod build;
pub mod config;
pub mod container;
pub mod database;
pub mod error;
pub mod logging;
pub mod schema;
pub mod seed;

pub use config::{ConfigError, FlybookConfig};
pub use container::{
    CommitOutcome, ContainerError, ContainerResult, Filter, FlightsContainer, RowId,
    TableContainer, User, UsersContainer, VersionStrategy,
};
pub use database::{
    create_database_connection, DatabaseConfig, DatabaseConnection, DatabaseError, DatabaseValue,
    SqlLiteral,
};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use schema::{flybook_schema, Schema, SchemaGenerator, SchemaManager, TableSpec};

/// Common imports for code working with logbook tables.
pub mod prelude {
    pub use crate::container::{Filter, RowId, TableContainer, VersionStrategy};
    pub use crate::database::{
        create_database_connection, DatabaseConfig, DatabaseConnection, DatabaseRow,
        DatabaseValue, SqlLiteral,
    };
    pub use crate::schema::{flybook_schema, NamingConfig, Schema, SchemaManager};
    pub use crate::{Error, Result};
}
