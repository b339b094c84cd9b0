//! Plan files: pre-rendered diffs stored as JSON.
//!
//! A plan lets a diff computed elsewhere be applied later, with the same
//! safety policies as a live diff. Each entry carries its rendered statement
//! and whether that statement is unsafe.
//!
//! ```json
//! {
//!   "options": {"safe-below-size": "10M"},
//!   "modifiers": {"algorithm_clause": "INPLACE"},
//!   "diffs": [
//!     {"type": "table", "name": "users", "diff": "alter",
//!      "statement": "ALTER TABLE `users` DROP COLUMN `legacy`", "unsafe": true}
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::config::OptionSet;
use crate::diff::{
    DiffError, DiffType, ObjectDiff, ObjectKey, ObjectType, StatementModifiers, TableDiff,
};
use crate::error::Result;

static ALTER_TABLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*ALTER\s+TABLE\s+(?:`(?:[^`]|``)+`|\S+)\s+")
        .expect("alter table regex is valid")
});

/// A diff whose statement was rendered ahead of time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlannedDiff {
    /// Object the diff modifies.
    #[serde(flatten)]
    pub key: ObjectKey,
    /// Kind of change.
    #[serde(rename = "diff")]
    pub diff_type: DiffType,
    /// The rendered statement, without ALGORITHM or LOCK clauses.
    pub statement: String,
    /// Whether the statement is unsafe or destructive.
    #[serde(default, rename = "unsafe")]
    pub is_unsafe: bool,
    /// ALTER TABLE clauses, if different from what can be derived from the
    /// statement.
    #[serde(default)]
    pub clauses: Option<String>,
    /// Whether an ALTER TABLE adds foreign keys.
    #[serde(default)]
    pub adds_foreign_keys: bool,
}

impl PlannedDiff {
    /// Creates a planned diff.
    #[must_use]
    pub fn new(key: ObjectKey, diff_type: DiffType, statement: impl Into<String>) -> Self {
        Self {
            key,
            diff_type,
            statement: statement.into(),
            is_unsafe: false,
            clauses: None,
            adds_foreign_keys: false,
        }
    }

    /// Marks the statement unsafe.
    #[must_use]
    pub fn unsafe_statement(mut self) -> Self {
        self.is_unsafe = true;
        self
    }

    /// Marks the ALTER as adding foreign keys.
    #[must_use]
    pub fn with_foreign_keys(mut self) -> Self {
        self.adds_foreign_keys = true;
        self
    }

    fn is_table_alter(&self) -> bool {
        self.key.object_type == ObjectType::Table && self.diff_type == DiffType::Alter
    }

    /// Appends ALGORITHM and LOCK clauses for ALTER TABLE.
    fn with_modifier_clauses(&self, sql: &str, mods: &StatementModifiers) -> String {
        let mut sql = sql.to_string();
        if self.is_table_alter() && !sql.is_empty() {
            if !mods.algorithm_clause.is_empty() {
                sql.push_str(&format!(", ALGORITHM={}", mods.algorithm_clause));
            }
            if !mods.lock_clause.is_empty() {
                sql.push_str(&format!(", LOCK={}", mods.lock_clause));
            }
        }
        sql
    }
}

#[async_trait]
impl ObjectDiff for PlannedDiff {
    fn object_key(&self) -> ObjectKey {
        self.key.clone()
    }

    fn diff_type(&self) -> DiffType {
        self.diff_type
    }

    async fn statement(&self, mods: &StatementModifiers) -> std::result::Result<String, DiffError> {
        let statement = self.with_modifier_clauses(&self.statement, mods);
        if self.is_unsafe && !mods.allow_unsafe {
            return Err(DiffError::Forbidden { statement });
        }
        Ok(statement)
    }

    fn is_compound_statement(&self) -> bool {
        matches!(self.key.object_type, ObjectType::Proc | ObjectType::Func)
            && self.diff_type != DiffType::Drop
    }

    fn as_table_diff(&self) -> Option<&dyn TableDiff> {
        (self.key.object_type == ObjectType::Table).then_some(self as &dyn TableDiff)
    }
}

#[async_trait]
impl TableDiff for PlannedDiff {
    async fn clauses(&self, mods: &StatementModifiers) -> std::result::Result<String, DiffError> {
        let clauses = match &self.clauses {
            Some(clauses) => clauses.clone(),
            None if self.is_table_alter() => ALTER_TABLE_PREFIX
                .replace(&self.statement, "")
                .into_owned(),
            None => self.statement.clone(),
        };
        Ok(self.with_modifier_clauses(&clauses, mods))
    }

    fn adds_foreign_keys(&self) -> bool {
        self.adds_foreign_keys
    }
}

/// A plan file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Plan {
    /// Options in effect, overriding nothing; missing means defaults.
    #[serde(default)]
    pub options: OptionSet,
    /// Modifiers the diffs are rendered with.
    #[serde(default)]
    pub modifiers: StatementModifiers,
    /// Diffs, applied in order.
    #[serde(default)]
    pub diffs: Vec<PlannedDiff>,
}

impl Plan {
    /// Parses a plan from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a plan file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptionName;

    fn drop_column() -> PlannedDiff {
        PlannedDiff::new(
            ObjectKey::new(ObjectType::Table, "users"),
            DiffType::Alter,
            "ALTER TABLE `users` DROP COLUMN `legacy`",
        )
        .unsafe_statement()
    }

    #[tokio::test]
    async fn unsafe_statement_needs_allow_unsafe() {
        let diff = drop_column();
        let err = diff.statement(&StatementModifiers::new()).await.unwrap_err();
        match err {
            DiffError::Forbidden { statement } => {
                assert_eq!(statement, "ALTER TABLE `users` DROP COLUMN `legacy`");
            }
            other => panic!("expected forbidden, got {other:?}"),
        }

        let stmt = diff
            .statement(&StatementModifiers::new().allow_unsafe(true))
            .await
            .unwrap();
        assert_eq!(stmt, "ALTER TABLE `users` DROP COLUMN `legacy`");
    }

    #[tokio::test]
    async fn modifier_clauses_only_for_alter_table() {
        let mods = StatementModifiers::new()
            .allow_unsafe(true)
            .algorithm("INPLACE")
            .lock("NONE");
        assert_eq!(
            drop_column().statement(&mods).await.unwrap(),
            "ALTER TABLE `users` DROP COLUMN `legacy`, ALGORITHM=INPLACE, LOCK=NONE"
        );

        let create = PlannedDiff::new(
            ObjectKey::new(ObjectType::Table, "t"),
            DiffType::Create,
            "CREATE TABLE `t` (id int)",
        );
        assert_eq!(create.statement(&mods).await.unwrap(), "CREATE TABLE `t` (id int)");
    }

    #[tokio::test]
    async fn clauses_strip_alter_prefix() {
        let diff = drop_column();
        let mods = StatementModifiers::new().lock("SHARED");
        assert_eq!(diff.clauses(&mods).await.unwrap(), "DROP COLUMN `legacy`, LOCK=SHARED");

        let mut explicit = drop_column();
        explicit.clauses = Some("DROP COLUMN legacy".to_string());
        assert_eq!(
            explicit.clauses(&StatementModifiers::new()).await.unwrap(),
            "DROP COLUMN legacy"
        );
    }

    #[test]
    fn routines_are_compound() {
        let create_proc = PlannedDiff::new(
            ObjectKey::new(ObjectType::Proc, "p"),
            DiffType::Create,
            "CREATE PROCEDURE p() BEGIN SELECT 1; END",
        );
        assert!(create_proc.is_compound_statement());
        assert!(create_proc.as_table_diff().is_none());

        let drop_func = PlannedDiff::new(
            ObjectKey::new(ObjectType::Func, "f"),
            DiffType::Drop,
            "DROP FUNCTION f",
        );
        assert!(!drop_func.is_compound_statement());
        assert!(!drop_column().is_compound_statement());
    }

    #[test]
    fn parses_plan_json() {
        let plan = Plan::from_json(
            r#"{
                "options": {"safe-below-size": "10M", "alter-wrapper": "osc {CLAUSES}"},
                "modifiers": {"algorithm_clause": "INPLACE"},
                "diffs": [
                    {"type": "table", "name": "users", "diff": "alter",
                     "statement": "ALTER TABLE `users` ADD KEY (a)", "adds_foreign_keys": true},
                    {"type": "procedure", "name": "p", "diff": "drop",
                     "statement": "DROP PROCEDURE `p`", "unsafe": true}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(plan.options.get_bytes(OptionName::SafeBelowSize).unwrap(), 10 << 20);
        assert_eq!(plan.modifiers.algorithm_clause, "INPLACE");
        assert_eq!(plan.diffs.len(), 2);
        assert!(plan.diffs[0].adds_foreign_keys);
        assert_eq!(plan.diffs[1].key, ObjectKey::new(ObjectType::Proc, "p"));
        assert!(plan.diffs[1].is_unsafe);
    }

    #[test]
    fn loads_plan_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, r#"{"diffs": []}"#).unwrap();
        let plan = Plan::load(&path).unwrap();
        assert!(plan.diffs.is_empty());

        assert!(Plan::load(dir.path().join("missing.json")).is_err());
        std::fs::write(&path, "not json").unwrap();
        assert!(Plan::load(&path).is_err());
    }
}
