use serde::{Deserialize, Serialize};

use crate::container::{ContainerError, ContainerResult};
use crate::database::{DatabaseTransaction, SqlLiteral};
use crate::schema::{NamingConfig, TableSpec};

/// How the version column advances on update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStrategy {
    /// The table's AFTER UPDATE trigger increments the version
    #[default]
    Trigger,
    /// Every UPDATE increments the version itself, for tables installed
    /// without triggers
    Explicit,
}

impl VersionStrategy {
    /// Whether tables used with this strategy need their version triggers.
    /// Installing them under `Explicit` would advance versions twice.
    pub fn installs_triggers(self) -> bool {
        self == VersionStrategy::Trigger
    }
}

/// Builds and runs the conditional statements that guard stored rows.
///
/// Each UPDATE or DELETE names the version the row had when it was read. A
/// statement that affects no rows means somebody else committed first.
#[derive(Debug, Clone)]
pub struct OptimisticLockEnforcer {
    table: String,
    key_column: String,
    version_column: String,
    strategy: VersionStrategy,
}

impl OptimisticLockEnforcer {
    pub fn new(table: &TableSpec, naming: &NamingConfig, strategy: VersionStrategy) -> Self {
        Self {
            table: table.storage_name(naming),
            key_column: table.primary_key().storage_name(naming),
            version_column: table.version_column().storage_name(naming),
            strategy,
        }
    }

    pub fn strategy(&self) -> VersionStrategy {
        self.strategy
    }

    fn guard(&self, key: &SqlLiteral, expected: Option<&SqlLiteral>) -> String {
        let version = match expected {
            Some(version) if !version.is_null() => format!("{} = {}", self.version_column, version),
            _ => format!("{} IS NULL", self.version_column),
        };
        format!("WHERE {} = {} AND {}", self.key_column, key, version)
    }

    /// `UPDATE <t> SET <assignments> WHERE <key> = <id> AND <version> = <expected>`
    pub fn update_statement(
        &self,
        key: &SqlLiteral,
        expected: Option<&SqlLiteral>,
        assignments: &[(String, Option<SqlLiteral>)],
    ) -> String {
        let mut set: Vec<String> = assignments
            .iter()
            .map(|(column, value)| match value {
                Some(literal) => format!("{} = {}", column, literal),
                None => format!("{} = NULL", column),
            })
            .collect();
        if self.strategy == VersionStrategy::Explicit {
            set.push(format!("{0} = {0} + 1", self.version_column));
        }

        format!(
            "UPDATE {} SET {} {}",
            self.table,
            set.join(", "),
            self.guard(key, expected)
        )
    }

    /// `DELETE FROM <t> WHERE <key> = <id> AND <version> = <expected>`
    pub fn delete_statement(&self, key: &SqlLiteral, expected: Option<&SqlLiteral>) -> String {
        format!("DELETE FROM {} {}", self.table, self.guard(key, expected))
    }

    /// Run a guarded update inside `tx`.
    pub async fn update(
        &self,
        tx: &mut dyn DatabaseTransaction,
        key: &SqlLiteral,
        expected: Option<&SqlLiteral>,
        assignments: &[(String, Option<SqlLiteral>)],
    ) -> ContainerResult<()> {
        let sql = self.update_statement(key, expected, assignments);
        let affected = tx.execute(&sql, &[]).await?;
        self.check_affected(affected, key, expected)
    }

    /// Run a guarded delete inside `tx`.
    pub async fn delete(
        &self,
        tx: &mut dyn DatabaseTransaction,
        key: &SqlLiteral,
        expected: Option<&SqlLiteral>,
    ) -> ContainerResult<()> {
        let sql = self.delete_statement(key, expected);
        let affected = tx.execute(&sql, &[]).await?;
        self.check_affected(affected, key, expected)
    }

    fn check_affected(
        &self,
        affected: u64,
        key: &SqlLiteral,
        expected: Option<&SqlLiteral>,
    ) -> ContainerResult<()> {
        if affected > 0 {
            return Ok(());
        }
        let expected = expected.cloned().unwrap_or_else(SqlLiteral::null);
        tracing::warn!(
            table = %self.table,
            key = %key,
            expected = %expected,
            "optimistic lock conflict"
        );
        Err(ContainerError::OptimisticLockConflict {
            table: self.table.clone(),
            key: key.clone(),
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> TableSpec {
        TableSpec::from_descriptor(
            "Accounts",
            &["id INTEGER PRIMARY KEY", "balance INTEGER", "version INTEGER @VERSION"],
        )
        .unwrap()
    }

    #[test]
    fn test_update_statement_with_trigger_strategy() {
        let enforcer =
            OptimisticLockEnforcer::new(&accounts(), &NamingConfig::unprefixed(), VersionStrategy::Trigger);
        let sql = enforcer.update_statement(
            &SqlLiteral::integer(1),
            Some(&SqlLiteral::integer(0)),
            &[("balance".to_string(), Some(SqlLiteral::integer(150)))],
        );
        assert_eq!(sql, "UPDATE Accounts SET balance = 150 WHERE id = 1 AND version = 0");
    }

    #[test]
    fn test_update_statement_with_explicit_strategy() {
        let enforcer =
            OptimisticLockEnforcer::new(&accounts(), &NamingConfig::default(), VersionStrategy::Explicit);
        let sql = enforcer.update_statement(
            &SqlLiteral::integer(7),
            Some(&SqlLiteral::integer(3)),
            &[("c_balance".to_string(), None)],
        );
        assert_eq!(
            sql,
            "UPDATE Accounts SET c_balance = NULL, c_version = c_version + 1 \
             WHERE c_id = 7 AND c_version = 3"
        );
    }

    #[test]
    fn test_delete_statement_with_null_version() {
        let enforcer =
            OptimisticLockEnforcer::new(&accounts(), &NamingConfig::unprefixed(), VersionStrategy::Trigger);
        assert_eq!(
            enforcer.delete_statement(&SqlLiteral::integer(2), None),
            "DELETE FROM Accounts WHERE id = 2 AND version IS NULL"
        );
    }

    #[test]
    fn test_zero_rows_is_a_conflict() {
        let enforcer =
            OptimisticLockEnforcer::new(&accounts(), &NamingConfig::unprefixed(), VersionStrategy::Trigger);
        let err = enforcer
            .check_affected(0, &SqlLiteral::integer(1), Some(&SqlLiteral::integer(0)))
            .unwrap_err();
        assert!(matches!(
            err,
            ContainerError::OptimisticLockConflict { ref table, .. } if table == "Accounts"
        ));
        assert!(enforcer
            .check_affected(1, &SqlLiteral::integer(1), Some(&SqlLiteral::integer(0)))
            .is_ok());
    }

    #[test]
    fn test_strategy_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            strategy: VersionStrategy,
        }
        let parsed: Wrapper = toml::from_str(r#"strategy = "explicit""#).unwrap();
        assert_eq!(parsed.strategy, VersionStrategy::Explicit);
        assert_eq!(VersionStrategy::default(), VersionStrategy::Trigger);
        assert!(VersionStrategy::Trigger.installs_triggers());
        assert!(!VersionStrategy::Explicit.installs_triggers());
    }
}
