// Logbook schema description, DDL generation and installation.

pub mod adapters;
pub mod config;
pub mod definitions;
pub mod errors;
pub mod flybook;
pub mod generator;
pub mod installer;

// Re-export core types for convenience
pub use adapters::{DialectAdapter, SqliteAdapter};
pub use config::NamingConfig;
pub use definitions::{ColumnRole, ColumnSpec, ColumnType, Schema, TableBuilder, TableSpec};
pub use errors::{Error, Result, SchemaDiagnostic};
pub use flybook::{flybook_schema, flybook_schema_with};
pub use generator::SchemaGenerator;
pub use installer::{InstalledColumn, SchemaManager};
