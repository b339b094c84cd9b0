//! Database instances.
//!
//! [`Instance`] is the capability the applier needs from a server: a couple of
//! table metadata queries and a way to run a statement over a pooled
//! connection chosen by schema and session params. [`MySqlInstance`] provides
//! it for MySQL and MariaDB via sqlx.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::Executor;
use tokio::sync::Mutex;
use tracing::debug;

use crate::connopts::{merge_param_strings, parse_params, DRIVER_ONLY_OPTIONS};
use crate::error::{ApplyError, Result};

/// A database server the applier can query and run statements on.
#[async_trait]
pub trait Instance: Send + Sync + fmt::Display {
    /// Host name or address; for socket connections this is `localhost`.
    fn host(&self) -> &str;

    /// TCP port.
    fn port(&self) -> u16;

    /// Unix socket path, if connecting over a socket.
    fn socket_path(&self) -> Option<&str>;

    /// Returns true if the table has at least one row.
    async fn table_has_rows(&self, schema: &str, table: &str) -> Result<bool>;

    /// Returns the on-disk size of the table in bytes, as reported by
    /// `information_schema`.
    async fn table_size(&self, schema: &str, table: &str) -> Result<u64>;

    /// Runs `sql` on a pooled connection for `schema` with the session
    /// `connect_params` (query-string encoded) applied.
    async fn exec(&self, schema: &str, connect_params: &str, sql: &str) -> Result<()>;
}

/// A MySQL or MariaDB server reached over TCP or a Unix socket.
pub struct MySqlInstance {
    host: String,
    port: u16,
    socket_path: Option<String>,
    user: String,
    password: String,
    default_params: String,
    pools: Mutex<HashMap<(String, String), MySqlPool>>,
}

impl MySqlInstance {
    /// Creates an instance reached over TCP.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            socket_path: None,
            user: "root".to_string(),
            password: String::new(),
            default_params: String::new(),
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an instance reached over a Unix socket.
    #[must_use]
    pub fn with_socket(path: impl Into<String>) -> Self {
        let mut instance = Self::new("localhost", 3306);
        instance.socket_path = Some(path.into());
        instance
    }

    /// Sets the credentials used for every connection.
    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Sets params applied to every pool, underneath per-statement params.
    #[must_use]
    pub fn default_params(mut self, params: impl Into<String>) -> Self {
        self.default_params = params.into();
        self
    }

    /// Returns the number of pools created so far.
    pub async fn pool_count(&self) -> usize {
        self.pools.lock().await.len()
    }

    /// Returns the pool for `(schema, params)`, creating it on first use.
    /// Concurrent first use still creates only one pool per key.
    pub async fn cached_pool(&self, schema: &str, params: &str) -> Result<MySqlPool> {
        let params = merge_param_strings(&self.default_params, params);
        let key = (schema.to_string(), params);

        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(&key) {
            return Ok(pool.clone());
        }
        debug!(instance = %self, schema = %key.0, params = %key.1, "Creating connection pool");
        let pool = self.build_pool(&key.0, &key.1)?;
        pools.insert(key, pool.clone());
        Ok(pool)
    }

    fn connect_options(&self, schema: &str) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .username(&self.user)
            .password(&self.password);
        options = match &self.socket_path {
            Some(path) => options.socket(path),
            None => options.host(&self.host).port(self.port),
        };
        if !schema.is_empty() {
            options = options.database(schema);
        }
        options
    }

    fn build_pool(&self, schema: &str, params: &str) -> Result<MySqlPool> {
        let parsed = parse_params(params);
        let mut options = self.connect_options(schema);
        if let Some(charset) = parsed.get("charset") {
            options = options.charset(charset);
        }
        if let Some(collation) = parsed.get("collation") {
            options = options.collation(collation);
        }

        Ok(pool_options(params)?.connect_lazy_with(options))
    }
}

/// Builds pool settings for a query-string param list: the acquire timeout
/// from `timeout`, and `SET SESSION` on every new connection for params
/// that are session variables.
pub fn pool_options(params: &str) -> Result<MySqlPoolOptions> {
    let parsed = parse_params(params);
    let mut options = MySqlPoolOptions::new().max_connections(4);
    if let Some(timeout) = parsed
        .get("timeout")
        .map(|t| parse_duration(t))
        .transpose()?
        .flatten()
    {
        options = options.acquire_timeout(timeout);
    }

    let session_vars: Arc<Vec<String>> = Arc::new(session_statements(params));
    if !session_vars.is_empty() {
        options = options.after_connect(move |conn, _meta| {
            let session_vars = Arc::clone(&session_vars);
            Box::pin(async move {
                for stmt in session_vars.iter() {
                    Executor::execute(&mut *conn, stmt.as_str()).await?;
                }
                Ok(())
            })
        });
    }
    Ok(options)
}

impl fmt::Display for MySqlInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.socket_path {
            Some(path) => write!(f, "{}:{}", self.host, path),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

#[async_trait]
impl Instance for MySqlInstance {
    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn socket_path(&self) -> Option<&str> {
        self.socket_path.as_deref()
    }

    async fn table_has_rows(&self, schema: &str, table: &str) -> Result<bool> {
        let pool = self.cached_pool("", "").await?;
        let sql = format!(
            "SELECT 1 FROM {}.{} LIMIT 1",
            escape_identifier(schema),
            escape_identifier(table)
        );
        let row = sqlx::query(&sql).fetch_optional(&pool).await?;
        Ok(row.is_some())
    }

    async fn table_size(&self, schema: &str, table: &str) -> Result<u64> {
        let pool = self.cached_pool("", "").await?;
        let size: u64 = sqlx::query_scalar(
            "SELECT CAST(data_length + index_length + data_free AS UNSIGNED)
             FROM information_schema.tables
             WHERE table_schema = ? AND table_name = ?",
        )
        .bind(schema)
        .bind(table)
        .fetch_one(&pool)
        .await?;
        Ok(size)
    }

    async fn exec(&self, schema: &str, connect_params: &str, sql: &str) -> Result<()> {
        let pool = self.cached_pool(schema, connect_params).await?;
        let merged = parse_params(&merge_param_strings(&self.default_params, connect_params));
        let read_timeout = merged
            .get("readTimeout")
            .map(|t| parse_duration(t))
            .transpose()?
            .flatten();

        let query = sqlx::raw_sql(sql).execute(&pool);
        match read_timeout {
            Some(after) => {
                tokio::time::timeout(after, query)
                    .await
                    .map_err(|_| ApplyError::Timeout { after })??;
            }
            None => {
                query.await?;
            }
        }
        Ok(())
    }
}

/// Wraps a MySQL identifier in backticks, doubling any embedded backticks.
#[must_use]
pub fn escape_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Builds the `SET SESSION` statements for params that are session
/// variables. Driver-only params are handled by the pool or not at all.
#[must_use]
pub fn session_statements(params: &str) -> Vec<String> {
    parse_params(params)
        .into_iter()
        .filter(|(name, _)| !DRIVER_ONLY_OPTIONS.contains(&name.as_str()))
        .map(|(name, value)| format!("SET SESSION {name} = {value}"))
        .collect()
}

/// Parses a duration such as `0`, `30`, `500ms`, `20s`, `5m` or `1h`. A bare
/// number is seconds. Zero means unlimited and yields `None`.
pub fn parse_duration(value: &str) -> Result<Option<Duration>> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| ApplyError::Config(format!("Invalid duration \"{value}\"")))?;
    let duration = match unit {
        "" | "s" => Duration::from_secs(amount),
        "ms" => Duration::from_millis(amount),
        "m" => Duration::from_secs(amount * 60),
        "h" => Duration::from_secs(amount * 3600),
        _ => return Err(ApplyError::Config(format!("Invalid duration \"{value}\""))),
    };
    Ok((!duration.is_zero()).then_some(duration))
}
