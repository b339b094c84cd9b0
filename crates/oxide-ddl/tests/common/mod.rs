#![allow(dead_code)]

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use oxide_ddl::prelude::*;

/// An instance that answers metadata queries from fixed values and records
/// executed statements.
pub struct MockInstance {
    pub host: String,
    pub port: u16,
    pub socket: Option<String>,
    pub has_rows: bool,
    pub fail_rows: bool,
    pub size: u64,
    pub fail_size: bool,
    pub fail_exec: bool,
    pub row_checks: AtomicUsize,
    pub size_queries: AtomicUsize,
    pub executed: Mutex<Vec<(String, String, String)>>,
}

impl MockInstance {
    pub fn new() -> Self {
        Self {
            host: "db1.example.com".to_string(),
            port: 3306,
            socket: None,
            has_rows: true,
            fail_rows: false,
            size: 0,
            fail_size: false,
            fail_exec: false,
            row_checks: AtomicUsize::new(0),
            size_queries: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_size(size: u64) -> Self {
        Self {
            size,
            ..Self::new()
        }
    }

    pub fn size_queries(&self) -> usize {
        self.size_queries.load(Ordering::SeqCst)
    }

    pub fn row_checks(&self) -> usize {
        self.row_checks.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<(String, String, String)> {
        self.executed.lock().unwrap().clone()
    }
}

impl fmt::Display for MockInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.socket {
            Some(path) => write!(f, "localhost:{path}"),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

#[async_trait]
impl Instance for MockInstance {
    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn socket_path(&self) -> Option<&str> {
        self.socket.as_deref()
    }

    async fn table_has_rows(&self, _schema: &str, _table: &str) -> Result<bool> {
        self.row_checks.fetch_add(1, Ordering::SeqCst);
        if self.fail_rows {
            return Err(ApplyError::Database(sqlx::Error::Protocol(
                "server has gone away".to_string(),
            )));
        }
        Ok(self.has_rows)
    }

    async fn table_size(&self, _schema: &str, _table: &str) -> Result<u64> {
        self.size_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_size {
            return Err(ApplyError::Database(sqlx::Error::Protocol(
                "lost connection".to_string(),
            )));
        }
        Ok(self.size)
    }

    async fn exec(&self, schema: &str, connect_params: &str, sql: &str) -> Result<()> {
        if self.fail_exec {
            return Err(ApplyError::Database(sqlx::Error::Protocol(
                "table is locked".to_string(),
            )));
        }
        self.executed.lock().unwrap().push((
            schema.to_string(),
            connect_params.to_string(),
            sql.to_string(),
        ));
        Ok(())
    }
}

/// A diff with a fixed statement that records the modifiers it renders with.
pub struct MockDiff {
    pub key: ObjectKey,
    pub diff_type: DiffType,
    pub statement: String,
    pub clauses: String,
    pub is_unsafe: bool,
    pub compound: bool,
    pub adds_fks: bool,
    pub fail: bool,
    pub seen_mods: Mutex<Vec<StatementModifiers>>,
}

impl MockDiff {
    pub fn new(object_type: ObjectType, name: &str, diff_type: DiffType, statement: &str) -> Self {
        Self {
            key: ObjectKey::new(object_type, name),
            diff_type,
            statement: statement.to_string(),
            clauses: String::new(),
            is_unsafe: false,
            compound: false,
            adds_fks: false,
            fail: false,
            seen_mods: Mutex::new(Vec::new()),
        }
    }

    pub fn alter_table(name: &str, clauses: &str) -> Self {
        let mut diff = Self::new(
            ObjectType::Table,
            name,
            DiffType::Alter,
            &format!("ALTER TABLE `{name}` {clauses}"),
        );
        diff.clauses = clauses.to_string();
        diff
    }

    pub fn drop_table(name: &str) -> Self {
        let mut diff = Self::new(
            ObjectType::Table,
            name,
            DiffType::Drop,
            &format!("DROP TABLE `{name}`"),
        );
        diff.is_unsafe = true;
        diff
    }

    pub fn create_table(name: &str) -> Self {
        Self::new(
            ObjectType::Table,
            name,
            DiffType::Create,
            &format!("CREATE TABLE `{name}` (`id` int NOT NULL)"),
        )
    }

    pub fn last_mods(&self) -> StatementModifiers {
        self.seen_mods
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("diff was never rendered")
    }

    fn render(&self, sql: &str, mods: &StatementModifiers) -> String {
        let mut sql = sql.to_string();
        if !sql.is_empty() && self.diff_type == DiffType::Alter {
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
impl ObjectDiff for MockDiff {
    fn object_key(&self) -> ObjectKey {
        self.key.clone()
    }

    fn diff_type(&self) -> DiffType {
        self.diff_type
    }

    async fn statement(&self, mods: &StatementModifiers) -> std::result::Result<String, DiffError> {
        self.seen_mods.lock().unwrap().push(mods.clone());
        if self.fail {
            return Err(DiffError::Other("diff engine failure".into()));
        }
        let statement = self.render(&self.statement, mods);
        if self.is_unsafe && !mods.allow_unsafe {
            return Err(DiffError::Forbidden { statement });
        }
        Ok(statement)
    }

    fn is_compound_statement(&self) -> bool {
        self.compound
    }

    fn as_table_diff(&self) -> Option<&dyn TableDiff> {
        (self.key.object_type == ObjectType::Table).then_some(self as &dyn TableDiff)
    }
}

#[async_trait]
impl TableDiff for MockDiff {
    async fn clauses(&self, mods: &StatementModifiers) -> std::result::Result<String, DiffError> {
        Ok(self.render(&self.clauses, mods))
    }

    fn adds_foreign_keys(&self) -> bool {
        self.adds_fks
    }
}

pub fn target(instance: Arc<MockInstance>, options: OptionSet) -> Target {
    Target::new(instance, "app", Arc::new(Dir::new("/srv/schemas/app", options)))
}
