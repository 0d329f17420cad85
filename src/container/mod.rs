//! Row buffer over one table.
//!
//! A [`TableContainer`] holds the rows of a table as last read from storage
//! plus a [`PendingChangeSet`] of staged inserts, updates and deletes. Nothing
//! reaches storage until [`TableContainer::commit`], which applies the whole
//! batch in one transaction through the [`OptimisticLockEnforcer`].

use indexmap::IndexMap;
use std::sync::Arc;
use thiserror::Error;

use crate::database::{
    DatabaseConnection, DatabaseError, DatabaseRow, DatabaseTransaction, DatabaseValue,
};
use crate::schema::{ColumnType, DialectAdapter, NamingConfig, Schema, SqliteAdapter, TableSpec};

pub mod filter;
pub mod flights;
pub mod lock;
pub mod row;
pub mod users;

pub use filter::Filter;
pub use flights::FlightsContainer;
pub use lock::{OptimisticLockEnforcer, VersionStrategy};
pub use row::{PendingChangeSet, Row, RowId};
pub use users::{User, UsersContainer};
pub use crate::database::SqlLiteral;


/// Error type for row buffer operations
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("table {0} is not part of the schema")]
    UnknownTable(String),

    #[error("table {table} has no column {column}")]
    UnknownColumn { table: String, column: String },

    #[error("{0} does not exist")]
    UnknownRow(RowId),

    #[error("{0} is marked for removal")]
    RowRemoved(RowId),

    #[error("column {column} of a stored row in {table} cannot be written")]
    ReadOnlyColumn { table: String, column: String },

    #[error("new row in {table} has no value for primary key {column}")]
    MissingPrimaryKey { table: String, column: String },

    #[error("row {key} in {table} was changed by another session (expected version {expected})")]
    OptimisticLockConflict {
        table: String,
        key: SqlLiteral,
        expected: SqlLiteral,
    },

    #[error("table {table} has no version trigger {trigger}; install triggers or use the explicit strategy")]
    MissingVersionTrigger { table: String, trigger: String },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] DatabaseError),
}

/// Result type for row buffer operations
pub type ContainerResult<T> = Result<T, ContainerError>;

/// What a successful commit did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Persistent ids assigned to rows added in this batch, by temporary id
    pub inserted: IndexMap<u64, RowId>,
    pub updated: usize,
    pub deleted: usize,
}

impl CommitOutcome {
    /// Map a row id used before the commit to the id valid after it.
    pub fn resolve(&self, id: &RowId) -> Option<RowId> {
        match id {
            RowId::Temporary(temp) => self.inserted.get(temp).cloned(),
            RowId::Persistent(_) => Some(id.clone()),
        }
    }
}

/// Rows written by a batch, re-read inside its transaction
#[derive(Default)]
struct AppliedBatch {
    inserted: Vec<(u64, Row)>,
    updated: Vec<Row>,
    deleted: Vec<SqlLiteral>,
}

/// Buffered, optimistically locked view of one table
pub struct TableContainer {
    connection: Arc<dyn DatabaseConnection>,
    table: Arc<TableSpec>,
    naming: NamingConfig,
    adapter: Box<dyn DialectAdapter>,
    enforcer: OptimisticLockEnforcer,
    store: IndexMap<SqlLiteral, Row>,
    pending: PendingChangeSet,
    filters: Vec<Filter>,
    next_temporary_id: u64,
}

impl TableContainer {
    /// Open a container over `table` and read its rows.
    ///
    /// With [`VersionStrategy::Trigger`] the table's version trigger must be
    /// installed, otherwise versions would never advance.
    pub async fn load(
        connection: Arc<dyn DatabaseConnection>,
        table: Arc<TableSpec>,
        naming: NamingConfig,
        strategy: VersionStrategy,
    ) -> ContainerResult<Self> {
        let enforcer = OptimisticLockEnforcer::new(&table, &naming, strategy);
        let mut container = Self {
            connection,
            table,
            naming,
            adapter: Box::new(SqliteAdapter::new()),
            enforcer,
            store: IndexMap::new(),
            pending: PendingChangeSet::default(),
            filters: Vec::new(),
            next_temporary_id: 0,
        };
        if strategy == VersionStrategy::Trigger {
            container.ensure_version_trigger().await?;
        }
        container.refresh().await?;
        Ok(container)
    }

    async fn ensure_version_trigger(&self) -> ContainerResult<()> {
        let trigger = self.adapter.trigger_name(&self.table, &self.naming);
        let found = self
            .connection
            .query_one(
                "SELECT name FROM sqlite_master WHERE type = 'trigger' AND name = ?",
                &[DatabaseValue::Text(trigger.clone())],
            )
            .await?;
        if found.is_none() {
            tracing::error!(table = %self.table_name(), trigger = %trigger, "version trigger missing");
            return Err(ContainerError::MissingVersionTrigger {
                table: self.table_name(),
                trigger,
            });
        }
        Ok(())
    }

    /// Open a container over the table called `name` in `schema`.
    pub async fn for_table(
        connection: Arc<dyn DatabaseConnection>,
        schema: &Schema,
        name: &str,
        strategy: VersionStrategy,
    ) -> ContainerResult<Self> {
        let table = schema
            .table(name)
            .cloned()
            .ok_or_else(|| ContainerError::UnknownTable(name.to_string()))?;
        Self::load(connection, table, schema.naming().clone(), strategy).await
    }

    pub fn table(&self) -> &TableSpec {
        &self.table
    }

    pub fn naming(&self) -> &NamingConfig {
        &self.naming
    }

    pub fn strategy(&self) -> VersionStrategy {
        self.enforcer.strategy()
    }

    fn table_name(&self) -> String {
        self.table.storage_name(&self.naming)
    }

    fn key_column(&self) -> String {
        self.table.primary_key().storage_name(&self.naming)
    }

    /// Re-read every row from storage, discarding pending changes.
    pub async fn refresh(&mut self) -> ContainerResult<()> {
        let rows = self
            .connection
            .query(&format!("SELECT * FROM {}", self.table_name()), &[])
            .await?;

        let mut store = IndexMap::with_capacity(rows.len());
        for db_row in &rows {
            match self.row_from_storage(db_row.as_ref())? {
                Some(row) => {
                    if let Some(key) = row.id().key() {
                        store.insert(key.clone(), row);
                    }
                }
                None => tracing::warn!(table = %self.table_name(), "skipping row without primary key"),
            }
        }

        self.store = store;
        self.pending.clear();
        tracing::debug!(table = %self.table_name(), rows = self.store.len(), "container refreshed");
        Ok(())
    }

    fn row_from_storage(&self, db_row: &dyn DatabaseRow) -> ContainerResult<Option<Row>> {
        let mut values = Vec::with_capacity(self.table.columns().len());
        for column in self.table.columns() {
            let value = db_row.get_value(&column.storage_name(&self.naming))?;
            values.push(self.literal(&value));
        }
        let Some(key) = values[self.table.primary_key_index()].clone() else {
            return Ok(None);
        };
        Ok(Some(Row::from_values(RowId::Persistent(key), values)))
    }

    fn literal(&self, value: &DatabaseValue) -> Option<SqlLiteral> {
        let literal = self.adapter.render_literal(value);
        (!literal.is_null()).then_some(literal)
    }

    fn column_index(&self, column: &str) -> ContainerResult<usize> {
        self.table
            .storage_column_index(&self.naming, column)
            .ok_or_else(|| ContainerError::UnknownColumn {
                table: self.table_name(),
                column: column.to_string(),
            })
    }

    /// Stage a new, unbound row.
    pub fn add_row(&mut self) -> RowId {
        let temp = self.next_temporary_id;
        self.next_temporary_id += 1;
        let id = RowId::Temporary(temp);
        self.pending
            .added
            .insert(temp, Row::empty(id.clone(), self.table.columns().len()));
        id
    }

    /// Stage a column value. `column` is the storage name.
    pub fn set_column(
        &mut self,
        id: &RowId,
        column: &str,
        value: impl Into<DatabaseValue>,
    ) -> ContainerResult<()> {
        let index = self.column_index(column)?;
        let literal = self.literal(&value.into());

        match id {
            RowId::Temporary(temp) => {
                let row = self
                    .pending
                    .added
                    .get_mut(temp)
                    .ok_or_else(|| ContainerError::UnknownRow(id.clone()))?;
                row.set(index, literal);
            }
            RowId::Persistent(key) => {
                if self.pending.removed.contains(key) {
                    return Err(ContainerError::RowRemoved(id.clone()));
                }
                let stored = self
                    .store
                    .get(key)
                    .ok_or_else(|| ContainerError::UnknownRow(id.clone()))?;
                if index == self.table.primary_key_index() || index == self.table.version_index() {
                    return Err(ContainerError::ReadOnlyColumn {
                        table: self.table_name(),
                        column: column.to_string(),
                    });
                }

                let staged = self
                    .pending
                    .modified
                    .entry(key.clone())
                    .or_insert_with(|| stored.clone());
                staged.set(index, literal);
                if staged == stored {
                    self.pending.modified.shift_remove(key);
                }
            }
        }
        Ok(())
    }

    pub fn set_text(&mut self, id: &RowId, column: &str, value: &str) -> ContainerResult<()> {
        self.set_column(id, column, value)
    }

    pub fn set_integer(&mut self, id: &RowId, column: &str, value: i64) -> ContainerResult<()> {
        self.set_column(id, column, value)
    }

    pub fn set_float(&mut self, id: &RowId, column: &str, value: f64) -> ContainerResult<()> {
        self.set_column(id, column, value)
    }

    pub fn set_null(&mut self, id: &RowId, column: &str) -> ContainerResult<()> {
        self.set_column(id, column, DatabaseValue::Null)
    }

    /// Current value of a column, staged changes included. `None` is NULL.
    pub fn get_column_value(&self, id: &RowId, column: &str) -> ContainerResult<Option<&SqlLiteral>> {
        let index = self.column_index(column)?;
        let row = self
            .get_row_unfiltered(id)
            .ok_or_else(|| ContainerError::UnknownRow(id.clone()))?;
        Ok(row.get(index))
    }

    /// The staged view of a row regardless of filters. Rows marked for
    /// removal stay reachable until commit.
    pub fn get_row_unfiltered(&self, id: &RowId) -> Option<&Row> {
        match id {
            RowId::Temporary(temp) => self.pending.added.get(temp),
            RowId::Persistent(key) => self
                .pending
                .modified
                .get(key)
                .or_else(|| self.store.get(key)),
        }
    }

    pub fn contains_row_unfiltered(&self, id: &RowId) -> bool {
        self.get_row_unfiltered(id).is_some()
    }

    /// A visible row: not marked for removal and passing every filter.
    pub fn get_row(&self, id: &RowId) -> Option<&Row> {
        if id.key().is_some_and(|key| self.pending.removed.contains(key)) {
            return None;
        }
        self.get_row_unfiltered(id)
            .filter(|row| self.passes_filters(row))
    }

    pub fn contains_row(&self, id: &RowId) -> bool {
        self.get_row(id).is_some()
    }

    /// Stage removal of a row. Unbound rows are discarded at once.
    pub fn remove_row(&mut self, id: &RowId) -> bool {
        match id {
            RowId::Temporary(temp) => self.pending.added.shift_remove(temp).is_some(),
            RowId::Persistent(key) => {
                if !self.store.contains_key(key) || self.pending.removed.contains(key) {
                    return false;
                }
                self.pending.modified.shift_remove(key);
                self.pending.removed.insert(key.clone());
                true
            }
        }
    }

    /// Add a filter; visible rows must pass all filters.
    pub fn apply_filter(&mut self, filter: Filter) -> ContainerResult<()> {
        for column in filter.columns() {
            self.column_index(column)?;
        }
        self.filters.push(filter);
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    fn passes_filters(&self, row: &Row) -> bool {
        let lookup = |column: &str| {
            self.table
                .storage_column_index(&self.naming, column)
                .and_then(|index| row.get(index))
        };
        self.filters.iter().all(|filter| filter.matches(&lookup))
    }

    /// Ids of the visible rows: stored rows in read order, then added rows.
    pub fn row_ids(&self) -> Vec<RowId> {
        let stored = self
            .store
            .keys()
            .filter(|key| !self.pending.removed.contains(*key))
            .filter_map(|key| self.get_row_unfiltered(&RowId::Persistent(key.clone())));
        stored
            .chain(self.pending.added.values())
            .filter(|row| self.passes_filters(row))
            .map(|row| row.id().clone())
            .collect()
    }

    /// Number of visible rows.
    pub fn size(&self) -> usize {
        self.row_ids().len()
    }

    /// Whether any change is staged.
    pub fn is_modified(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> &PendingChangeSet {
        &self.pending
    }

    /// Discard every staged change. Storage is not touched.
    pub fn rollback(&mut self) {
        if self.is_modified() {
            tracing::debug!(
                table = %self.table_name(),
                added = self.pending.added_count(),
                modified = self.pending.modified_count(),
                removed = self.pending.removed_count(),
                "discarding pending changes"
            );
        }
        self.pending.clear();
    }

    /// Apply the pending batch in one transaction.
    ///
    /// On failure the transaction is rolled back, the pending set is left as
    /// it was and the error is returned; callers may `refresh` and retry or
    /// `rollback`.
    pub async fn commit(&mut self) -> ContainerResult<CommitOutcome> {
        if !self.is_modified() {
            return Ok(CommitOutcome::default());
        }

        let mut tx = self.connection.begin_transaction().await?;
        let applied = match self.apply_pending(tx.as_mut()).await {
            Ok(applied) => applied,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after failed commit");
                }
                tracing::warn!(table = %self.table_name(), error = %e, "commit failed");
                return Err(e);
            }
        };
        tx.commit().await?;

        let outcome = self.reconcile(applied);
        tracing::info!(
            table = %self.table_name(),
            inserted = outcome.inserted.len(),
            updated = outcome.updated,
            deleted = outcome.deleted,
            "commit applied"
        );
        Ok(outcome)
    }

    /// Deletes run first so a removed key can be reused by an added row in
    /// the same batch, then updates, then inserts.
    async fn apply_pending(&self, tx: &mut dyn DatabaseTransaction) -> ContainerResult<AppliedBatch> {
        let mut applied = AppliedBatch::default();

        for key in &self.pending.removed {
            let expected = self
                .store
                .get(key)
                .and_then(|stored| stored.get(self.table.version_index()));
            self.enforcer.delete(tx, key, expected).await?;
            applied.deleted.push(key.clone());
        }

        for (key, staged) in &self.pending.modified {
            let Some(stored) = self.store.get(key) else {
                continue;
            };
            let changed = staged.changed_columns(stored);
            if changed.is_empty() {
                continue;
            }
            let assignments: Vec<(String, Option<SqlLiteral>)> = changed
                .into_iter()
                .map(|i| {
                    (
                        self.table.columns()[i].storage_name(&self.naming),
                        staged.values()[i].clone(),
                    )
                })
                .collect();
            let expected = stored.get(self.table.version_index());
            self.enforcer.update(tx, key, expected, &assignments).await?;
            applied.updated.push(self.read_row(tx, key).await?);
        }

        for (temp, row) in &self.pending.added {
            let fresh = self.insert_row(tx, row).await?;
            applied.inserted.push((*temp, fresh));
        }

        Ok(applied)
    }

    async fn insert_row(&self, tx: &mut dyn DatabaseTransaction, row: &Row) -> ContainerResult<Row> {
        let key_index = self.table.primary_key_index();
        let key_column = self.table.primary_key();
        let rowid_key = *key_column.column_type() == ColumnType::Integer;
        if row.get(key_index).is_none() && !rowid_key {
            return Err(ContainerError::MissingPrimaryKey {
                table: self.table_name(),
                column: key_column.storage_name(&self.naming),
            });
        }

        let (columns, values): (Vec<String>, Vec<String>) = self
            .table
            .columns()
            .iter()
            .zip(row.values())
            .filter_map(|(column, value)| {
                value
                    .as_ref()
                    .map(|v| (column.storage_name(&self.naming), v.to_string()))
            })
            .unzip();

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.table_name())
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table_name(),
                columns.join(", "),
                values.join(", ")
            )
        };
        tx.execute(&sql, &[]).await?;

        let key = match row.get(key_index) {
            Some(key) => key.clone(),
            None => {
                let rowid = tx
                    .query_one("SELECT last_insert_rowid() AS rowid", &[])
                    .await?
                    .ok_or_else(|| DatabaseError::Query("last_insert_rowid returned no row".into()))?
                    .get_i64("rowid")?;
                SqlLiteral::integer(rowid)
            }
        };
        self.read_row(tx, &key).await
    }

    async fn read_row(&self, tx: &mut dyn DatabaseTransaction, key: &SqlLiteral) -> ContainerResult<Row> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = {}",
            self.table_name(),
            self.key_column(),
            key
        );
        let db_row = tx
            .query_one(&sql, &[])
            .await?
            .ok_or_else(|| DatabaseError::Query(format!("row {} vanished during commit", key)))?;
        self.row_from_storage(db_row.as_ref())?.ok_or_else(|| {
            ContainerError::MissingPrimaryKey {
                table: self.table_name(),
                column: self.key_column(),
            }
        })
    }

    fn reconcile(&mut self, applied: AppliedBatch) -> CommitOutcome {
        let mut outcome = CommitOutcome::default();

        for key in applied.deleted {
            self.store.shift_remove(&key);
            outcome.deleted += 1;
        }
        for row in applied.updated {
            if let Some(key) = row.id().key().cloned() {
                self.store.insert(key, row);
                outcome.updated += 1;
            }
        }
        for (temp, row) in applied.inserted {
            if let Some(key) = row.id().key().cloned() {
                outcome.inserted.insert(temp, row.id().clone());
                self.store.insert(key, row);
            }
        }

        self.pending.clear();
        outcome
    }
}
