pub mod sqlite_adapter;
mod trait_def;

pub use sqlite_adapter::SqliteAdapter;
pub use trait_def::DialectAdapter;
