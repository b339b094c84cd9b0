//! Executable DDL statements.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::OptionName;
use crate::diff::{DiffError, ObjectDiff, ObjectType, StatementModifiers};
use crate::error::{ApplyError, Result};
use crate::instance::Instance;
use crate::shellout::ShellOut;
use crate::target::Target;
use crate::wrap::{terminal_width, wrap_with_padding};

use super::params::connect_params;
use super::policy::{apply_safe_below_size, resolve_wrapper};
use super::size::{needs_table_size, table_size};
use super::variables::{wrapper_variables, WrapperContext};

/// Columns reserved for log prefixes when wrapping a rejected statement.
const FORBIDDEN_WRAP_MARGIN: usize = 29;

/// Prefix for commented-out statements in rejection messages.
const COMMENT_PADDING: &str = "  # ";

/// Prefix the MySQL client uses for shelling out (`system`).
const SHELL_ESCAPE: &str = "\\! ";

/// Client settings in effect when a statement runs, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientState {
    /// Display name of the instance.
    pub instance_name: String,
    /// Default schema, empty for none.
    pub schema_name: String,
    /// Statement delimiter: `;`, `//` for compound statements, or empty for
    /// external commands.
    pub delimiter: String,
}

/// A DDL statement ready to run, either directly against the database or by
/// shelling out to an external command.
///
/// Exactly one of the SQL text and the external command is set.
pub struct DdlStatement {
    stmt: String,
    compound: bool,
    shell_out: Option<ShellOut>,
    instance: Arc<dyn Instance>,
    schema_name: String,
    connect_params: String,
}

impl DdlStatement {
    /// Builds the statement for `diff` on `target`.
    ///
    /// Returns `Ok(None)` when the diff renders to nothing under the
    /// (finalized) modifiers; the caller should skip it silently. `mods` is
    /// not modified: size-based overrides apply to a private copy.
    pub async fn new(
        diff: &dyn ObjectDiff,
        mods: &StatementModifiers,
        target: &Target,
    ) -> Result<Option<Self>> {
        let key = diff.object_key();
        let config = target.config();

        // Database-level DDL never runs inside a schema
        let schema_name = if key.object_type == ObjectType::Database {
            String::new()
        } else {
            target.schema_name.clone()
        };

        // One size lookup, shared by both size-based decisions below
        let mut mods = mods.clone();
        let mut size = 0;
        if needs_table_size(diff, config) {
            size = table_size(target, &key.name).await?;
            let safe_below_size = config.get_bytes(OptionName::SafeBelowSize)?;
            mods = apply_safe_below_size(mods, &key, size, safe_below_size);
        }
        let (wrapper, mods) = resolve_wrapper(config, diff, size, mods)?;

        let stmt = match diff.statement(&mods).await {
            Ok(stmt) => stmt,
            Err(DiffError::Forbidden { statement }) => return Err(forbidden(statement)),
            Err(err) => return Err(err.into()),
        };
        if stmt.is_empty() {
            debug!(object = %key, "Statement is a no-op under current modifiers");
            return Ok(None);
        }

        let instance = Arc::clone(&target.instance);
        if wrapper.is_empty() {
            return Ok(Some(Self {
                compound: diff.is_compound_statement(),
                connect_params: connect_params(diff, config)?,
                stmt,
                shell_out: None,
                instance,
                schema_name,
            }));
        }

        let vars = wrapper_variables(&WrapperContext {
            diff,
            mods: &mods,
            target,
            schema_name: &schema_name,
            statement: &stmt,
            table_size: size,
        })
        .await?;
        let shell_out = ShellOut::interpolated(&wrapper, &vars).map_err(|e| {
            ApplyError::Config(format!(
                "A fatal error occurred with pre-processing a DDL statement: {e}."
            ))
        })?;

        Ok(Some(Self {
            stmt: String::new(),
            compound: false,
            shell_out: Some(shell_out),
            instance,
            schema_name,
            connect_params: String::new(),
        }))
    }

    /// Runs the statement, either as a query on a pooled connection or by
    /// running the external command. Errors are returned as-is; nothing is
    /// retried or rolled back.
    pub async fn execute(&self) -> Result<()> {
        if let Some(shell_out) = &self.shell_out {
            return shell_out.run().await;
        }
        info!(
            instance = %self.instance,
            schema = %self.schema_name,
            params = %self.connect_params,
            "Executing DDL"
        );
        self.instance
            .exec(&self.schema_name, &self.connect_params, &self.stmt)
            .await
    }

    /// Returns the statement for display. External commands are prefixed
    /// with `\! `, the MySQL client's shell-out command.
    #[must_use]
    pub fn statement(&self) -> String {
        match &self.shell_out {
            Some(shell_out) => format!("{SHELL_ESCAPE}{shell_out}"),
            None => self.stmt.clone(),
        }
    }

    /// Returns the client state this statement runs under.
    #[must_use]
    pub fn client_state(&self) -> ClientState {
        let delimiter = if self.shell_out.is_some() {
            ""
        } else if self.compound {
            "//"
        } else {
            ";"
        };
        ClientState {
            instance_name: self.instance.to_string(),
            schema_name: self.schema_name.clone(),
            delimiter: delimiter.to_string(),
        }
    }

    /// SQL text for direct execution; empty when an external command is used.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.stmt
    }

    /// The external command, if one is used.
    #[must_use]
    pub fn shell_out(&self) -> Option<&ShellOut> {
        self.shell_out.as_ref()
    }

    /// Whether the statement needs a non-default delimiter.
    #[must_use]
    pub fn is_compound(&self) -> bool {
        self.compound
    }

    /// Schema the statement runs in; empty for database-level statements.
    #[must_use]
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Session params for direct execution.
    #[must_use]
    pub fn connect_params(&self) -> &str {
        &self.connect_params
    }

    /// The instance the statement runs on.
    #[must_use]
    pub fn instance(&self) -> &Arc<dyn Instance> {
        &self.instance
    }
}

fn forbidden(statement: String) -> ApplyError {
    let width = terminal_width().saturating_sub(FORBIDDEN_WRAP_MARGIN);
    let commented = format!(
        "{COMMENT_PADDING}{}",
        wrap_with_padding(&statement, width, COMMENT_PADDING)
    );
    ApplyError::Forbidden {
        statement,
        commented,
    }
}
