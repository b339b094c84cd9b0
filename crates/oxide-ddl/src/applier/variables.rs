//! Variables exposed to wrapper command templates.

use crate::config::OptionName;
use crate::connopts::real_connect_options;
use crate::diff::{ObjectDiff, StatementModifiers};
use crate::error::Result;
use crate::shellout::{Variable, Variables};
use crate::target::Target;

/// Everything a wrapper template can reference for one statement.
pub struct WrapperContext<'a> {
    /// The diff being applied.
    pub diff: &'a dyn ObjectDiff,
    /// Finalized modifiers.
    pub mods: &'a StatementModifiers,
    /// Where the statement is applied.
    pub target: &'a Target,
    /// Schema name, empty for database-level statements.
    pub schema_name: &'a str,
    /// The rendered statement.
    pub statement: &'a str,
    /// Resolved table size, 0 if not needed.
    pub table_size: u64,
}

/// Builds the variable values for a wrapper template.
///
/// `HOST` and `PORT` are left empty for socket connections, in which case
/// `SOCKET` is set. `CLAUSES` and `TABLE` are only set for table diffs.
pub async fn wrapper_variables(ctx: &WrapperContext<'_>) -> Result<Variables> {
    let config = ctx.target.config();
    let instance = &ctx.target.instance;
    let key = ctx.diff.object_key();

    let mut vars = Variables::new();
    match instance.socket_path() {
        Some(socket) => vars.set(Variable::Socket, socket),
        None => {
            vars.set(Variable::Host, instance.host());
            vars.set(Variable::Port, instance.port().to_string());
        }
    }
    vars.set(Variable::Schema, ctx.schema_name);
    vars.set(Variable::User, config.get_allow_env_var(OptionName::User));
    vars.set(Variable::Password, config.get_allow_env_var(OptionName::Password));
    vars.set(Variable::Environment, config.get(OptionName::Environment));
    vars.set(Variable::Ddl, ctx.statement);
    vars.set(Variable::Name, key.name.as_str());
    vars.set(Variable::Size, ctx.table_size.to_string());
    vars.set(Variable::Type, ctx.diff.diff_type().to_string());
    vars.set(Variable::Class, key.object_type.caps());
    vars.set(
        Variable::ConnOpts,
        real_connect_options(config.get(OptionName::ConnectOptions))?,
    );
    vars.set(Variable::DirName, ctx.target.dir.base_name());
    vars.set(Variable::DirPath, ctx.target.dir.path.to_string_lossy());

    if let Some(table_diff) = ctx.diff.as_table_diff() {
        vars.set(Variable::Clauses, table_diff.clauses(ctx.mods).await?);
        vars.set(Variable::Table, key.name.as_str());
    }

    Ok(vars)
}
