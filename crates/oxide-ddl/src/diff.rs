//! The diff abstraction consumed by the applier.
//!
//! Computing diffs and rendering them to SQL is the job of a schema diff
//! engine. This module only defines the capabilities the applier needs from
//! one: identifying the changed object, rendering it under a set of
//! [`StatementModifiers`], and a few table-specific queries.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Kind of database object a diff refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// A database (schema) itself.
    Database,
    /// A table.
    Table,
    /// A stored procedure.
    #[serde(alias = "procedure")]
    Proc,
    /// A stored function.
    #[serde(alias = "function")]
    Func,
}

impl ObjectType {
    /// Returns the lowercase keyword for this object type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Table => "table",
            Self::Proc => "procedure",
            Self::Func => "function",
        }
    }

    /// Returns the uppercase name.
    #[must_use]
    pub fn caps(&self) -> String {
        self.as_str().to_uppercase()
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of change a diff represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    /// The object does not exist yet.
    Create,
    /// The object exists and is modified in place.
    Alter,
    /// The object exists and is removed.
    Drop,
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
            Self::Drop => "DROP",
        })
    }
}

/// Identifies an object by type and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Object type.
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    /// Object name.
    pub name: String,
}

impl ObjectKey {
    /// Creates a new object key.
    #[must_use]
    pub fn new(object_type: ObjectType, name: impl Into<String>) -> Self {
        Self {
            object_type,
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.object_type, self.name)
    }
}

/// Safety and formatting toggles applied when rendering a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementModifiers {
    /// Permit statements that are unsafe or potentially destructive.
    pub allow_unsafe: bool,
    /// `ALGORITHM=` clause appended to ALTER TABLE, empty for none.
    pub algorithm_clause: String,
    /// `LOCK=` clause appended to ALTER TABLE, empty for none.
    pub lock_clause: String,
}

impl StatementModifiers {
    /// Creates modifiers with everything off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unsafe override.
    #[must_use]
    pub fn allow_unsafe(mut self, allow: bool) -> Self {
        self.allow_unsafe = allow;
        self
    }

    /// Sets the algorithm clause.
    #[must_use]
    pub fn algorithm(mut self, clause: impl Into<String>) -> Self {
        self.algorithm_clause = clause.into();
        self
    }

    /// Sets the lock clause.
    #[must_use]
    pub fn lock(mut self, clause: impl Into<String>) -> Self {
        self.lock_clause = clause.into();
        self
    }
}

/// Errors a diff may return while rendering.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The statement is unsafe and the modifiers do not allow it. The
    /// would-be statement is still provided.
    #[error("Statement is unsafe or potentially destructive: {statement}")]
    Forbidden {
        /// The rendered statement.
        statement: String,
    },

    /// The diff cannot be expressed as DDL.
    #[error("Unsupported diff for {key}: {reason}")]
    Unsupported {
        /// The object the diff refers to.
        key: ObjectKey,
        /// Why it is unsupported.
        reason: String,
    },

    /// Any other failure of the diff engine (including database errors
    /// while rendering).
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A pending change to one database object.
#[async_trait]
pub trait ObjectDiff: Send + Sync {
    /// The object this diff modifies.
    fn object_key(&self) -> ObjectKey;

    /// The kind of change.
    fn diff_type(&self) -> DiffType;

    /// Renders the diff to a single SQL statement. An empty string means the
    /// diff is a no-op under `mods`.
    async fn statement(&self, mods: &StatementModifiers) -> Result<String, DiffError>;

    /// Whether the rendered statement has a body that may itself contain `;`
    /// (stored routines).
    fn is_compound_statement(&self) -> bool;

    /// Table-specific capabilities, if this diff targets a table.
    fn as_table_diff(&self) -> Option<&dyn TableDiff>;
}

/// Capabilities only table diffs have.
#[async_trait]
pub trait TableDiff: Send + Sync {
    /// Renders only the clauses of an ALTER TABLE (without the
    /// `ALTER TABLE name` prefix), or the full statement for CREATE/DROP.
    async fn clauses(&self, mods: &StatementModifiers) -> Result<String, DiffError>;

    /// Whether this ALTER adds at least one new foreign key constraint.
    fn adds_foreign_keys(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_type_names() {
        assert_eq!(ObjectType::Table.caps(), "TABLE");
        assert_eq!(ObjectType::Proc.caps(), "PROCEDURE");
        assert_eq!(ObjectType::Func.to_string(), "function");
        assert_eq!(ObjectType::Database.as_str(), "database");
    }

    #[test]
    fn diff_type_display() {
        assert_eq!(DiffType::Create.to_string(), "CREATE");
        assert_eq!(DiffType::Alter.to_string(), "ALTER");
        assert_eq!(DiffType::Drop.to_string(), "DROP");
    }

    #[test]
    fn object_key_display() {
        let key = ObjectKey::new(ObjectType::Table, "users");
        assert_eq!(key.to_string(), "table `users`");
    }

    #[test]
    fn modifiers_builder() {
        let mods = StatementModifiers::new()
            .allow_unsafe(true)
            .algorithm("INPLACE")
            .lock("NONE");
        assert!(mods.allow_unsafe);
        assert_eq!(mods.algorithm_clause, "INPLACE");
        assert_eq!(mods.lock_clause, "NONE");
    }

    #[test]
    fn object_type_deserialize_aliases() {
        let t: ObjectType = serde_json::from_str("\"procedure\"").unwrap();
        assert_eq!(t, ObjectType::Proc);
        let t: ObjectType = serde_json::from_str("\"func\"").unwrap();
        assert_eq!(t, ObjectType::Func);
    }
}
