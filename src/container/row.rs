use indexmap::{IndexMap, IndexSet};
use std::fmt;

use crate::database::SqlLiteral;

/// Identity of a row held by a container.
///
/// Rows added in the current session carry a temporary id until they are
/// committed; stored rows are identified by their primary-key literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowId {
    Temporary(u64),
    Persistent(SqlLiteral),
}

impl RowId {
    pub fn is_temporary(&self) -> bool {
        matches!(self, RowId::Temporary(_))
    }

    /// The primary-key literal of a stored row.
    pub fn key(&self) -> Option<&SqlLiteral> {
        match self {
            RowId::Persistent(key) => Some(key),
            RowId::Temporary(_) => None,
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Temporary(id) => write!(f, "temporary row {}", id),
            RowId::Persistent(key) => write!(f, "row {}", key),
        }
    }
}

/// Column values of one row, by column position. `None` is SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    id: RowId,
    values: Vec<Option<SqlLiteral>>,
}

impl Row {
    pub(crate) fn empty(id: RowId, width: usize) -> Self {
        Self {
            id,
            values: vec![None; width],
        }
    }

    pub(crate) fn from_values(id: RowId, values: Vec<Option<SqlLiteral>>) -> Self {
        Self { id, values }
    }

    pub fn id(&self) -> &RowId {
        &self.id
    }

    pub fn values(&self) -> &[Option<SqlLiteral>] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&SqlLiteral> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn set(&mut self, index: usize, value: Option<SqlLiteral>) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// Positions whose value differs from `other`.
    pub(crate) fn changed_columns(&self, other: &Row) -> Vec<usize> {
        self.values
            .iter()
            .zip(other.values.iter())
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Changes staged since the last commit, rollback or refresh.
#[derive(Debug, Clone, Default)]
pub struct PendingChangeSet {
    /// Unbound rows by temporary id
    pub(crate) added: IndexMap<u64, Row>,
    /// Staged copies of bound rows by primary key
    pub(crate) modified: IndexMap<SqlLiteral, Row>,
    /// Keys of bound rows marked for deletion
    pub(crate) removed: IndexSet<SqlLiteral>,
}

impl PendingChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn added_count(&self) -> usize {
        self.added.len()
    }

    pub fn modified_count(&self) -> usize {
        self.modified.len()
    }

    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    pub(crate) fn clear(&mut self) {
        self.added.clear();
        self.modified.clear();
        self.removed.clear();
    }
}
