//! External commands with `{VARIABLE}` placeholders.
//!
//! Wrapper options such as `alter-wrapper` are command-line templates. Each
//! `{NAME}` placeholder is replaced by the value of a [`Variable`], escaped
//! for the shell according to the quoting context it appears in. Unknown
//! placeholders are rejected rather than passed through.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ApplyError, Result};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]*)\}").expect("placeholder regex is valid"));

/// Display value substituted for a non-empty password.
const MASKED_PASSWORD: &str = "*****";

/// The closed set of variables available to wrapper templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variable {
    /// Instance host name, empty for socket connections.
    Host,
    /// Instance port, empty for socket connections.
    Port,
    /// Socket path, empty for TCP connections.
    Socket,
    /// Schema name, empty for database-level statements.
    Schema,
    /// Connection user.
    User,
    /// Connection password.
    Password,
    /// Environment name.
    Environment,
    /// Full DDL statement.
    Ddl,
    /// ALTER TABLE clauses, tables only.
    Clauses,
    /// Object name.
    Name,
    /// Table name, tables only.
    Table,
    /// Table size in bytes.
    Size,
    /// Diff type (`CREATE`, `ALTER`, `DROP`).
    Type,
    /// Object type in capitals (`TABLE`, `PROCEDURE`, ...).
    Class,
    /// Session options for external tools.
    ConnOpts,
    /// Base name of the target directory.
    DirName,
    /// Path of the target directory.
    DirPath,
}

impl Variable {
    /// Every variable, in a fixed order.
    pub const ALL: [Self; 17] = [
        Self::Host,
        Self::Port,
        Self::Socket,
        Self::Schema,
        Self::User,
        Self::Password,
        Self::Environment,
        Self::Ddl,
        Self::Clauses,
        Self::Name,
        Self::Table,
        Self::Size,
        Self::Type,
        Self::Class,
        Self::ConnOpts,
        Self::DirName,
        Self::DirPath,
    ];

    /// The placeholder name, without braces.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Host => "HOST",
            Self::Port => "PORT",
            Self::Socket => "SOCKET",
            Self::Schema => "SCHEMA",
            Self::User => "USER",
            Self::Password => "PASSWORD",
            Self::Environment => "ENVIRONMENT",
            Self::Ddl => "DDL",
            Self::Clauses => "CLAUSES",
            Self::Name => "NAME",
            Self::Table => "TABLE",
            Self::Size => "SIZE",
            Self::Type => "TYPE",
            Self::Class => "CLASS",
            Self::ConnOpts => "CONNOPTS",
            Self::DirName => "DIRNAME",
            Self::DirPath => "DIRPATH",
        }
    }

    /// The placeholder as written in templates, e.g. `{SIZE}`.
    #[must_use]
    pub fn placeholder(&self) -> String {
        format!("{{{}}}", self.name())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variable {
    type Err = ApplyError;

    /// Placeholder names are case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ApplyError::Config(format!("Unknown variable {{{s}}}")))
    }
}

/// Values for every [`Variable`]. Variables never set are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variables {
    values: BTreeMap<Variable, String>,
}

impl Default for Variables {
    fn default() -> Self {
        Self {
            values: Variable::ALL
                .into_iter()
                .map(|v| (v, String::new()))
                .collect(),
        }
    }
}

impl Variables {
    /// Creates a context with every variable empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable.
    pub fn set(&mut self, var: Variable, value: impl Into<String>) {
        self.values.insert(var, value.into());
    }

    /// Returns a variable's value.
    #[must_use]
    pub fn get(&self, var: Variable) -> &str {
        self.values.get(&var).map_or("", String::as_str)
    }

    /// Iterates over all variables and values.
    pub fn iter(&self) -> impl Iterator<Item = (Variable, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Quoting context of a position in a shell command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Returns the quoting context at the end of `text`, starting from `state`.
fn scan_quotes(text: &str, mut state: Quote) -> Quote {
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        state = match (state, c) {
            (Quote::None, '\\') | (Quote::Double, '\\') => {
                chars.next();
                state
            }
            (Quote::None, '\'') => Quote::Single,
            (Quote::None, '"') => Quote::Double,
            (Quote::Single, '\'') | (Quote::Double, '"') => Quote::None,
            _ => state,
        };
    }
    state
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-.,/:=@%+".contains(c)
}

fn escape_value(value: &str, quote: Quote) -> String {
    match quote {
        Quote::Single => value.replace('\'', r"'\''"),
        Quote::Double => {
            let mut out = String::with_capacity(value.len());
            for c in value.chars() {
                if matches!(c, '\\' | '"' | '$' | '`') {
                    out.push('\\');
                }
                out.push(c);
            }
            out
        }
        Quote::None if !value.is_empty() && value.chars().all(is_shell_safe) => value.to_string(),
        Quote::None => format!("'{}'", value.replace('\'', r"'\''")),
    }
}

/// Substitutes every placeholder in `template` with its escaped value.
/// When `mask_password` is set, a non-empty `{PASSWORD}` renders as
/// `*****`.
pub fn interpolate(template: &str, vars: &Variables, mask_password: bool) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut quote = Quote::None;
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).expect("capture 0 always present");
        let literal = &template[last..whole.start()];
        quote = scan_quotes(literal, quote);
        out.push_str(literal);

        let var: Variable = caps[1].parse()?;
        let value = vars.get(var);
        if mask_password && var == Variable::Password && !value.is_empty() {
            out.push_str(MASKED_PASSWORD);
        } else {
            out.push_str(&escape_value(value, quote));
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// A command to run through the system shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOut {
    command: String,
    printable: String,
}

impl ShellOut {
    /// Creates a shell-out from a literal command line.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            printable: command.clone(),
            command,
        }
    }

    /// Creates a shell-out by interpolating `vars` into `template`.
    pub fn interpolated(template: &str, vars: &Variables) -> Result<Self> {
        if template.trim().is_empty() {
            return Err(ApplyError::Config("Command template is empty".to_string()));
        }
        Ok(Self {
            command: interpolate(template, vars, false)?,
            printable: interpolate(template, vars, true)?,
        })
    }

    /// The command line that will be executed.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Runs the command to completion with inherited stdio. A non-zero exit
    /// status is an error.
    pub async fn run(&self) -> Result<()> {
        info!(command = %self.printable, "Running external command");
        let status = shell_command(&self.command).status().await?;
        debug!(command = %self.printable, status = %status, "External command finished");
        if status.success() {
            Ok(())
        } else {
            Err(ApplyError::ExternalCommand {
                command: self.printable.clone(),
                code: status.code(),
            })
        }
    }
}

/// Display form, with any password masked.
impl fmt::Display for ShellOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.printable)
    }
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Variables {
        let mut vars = Variables::new();
        vars.set(Variable::Host, "db1.example.com");
        vars.set(Variable::Port, "3306");
        vars.set(Variable::Schema, "app");
        vars.set(Variable::Table, "users");
        vars.set(Variable::Clauses, "ADD COLUMN `age` int");
        vars.set(Variable::Password, "it's secret");
        vars
    }

    #[test]
    fn variable_names_are_case_insensitive() {
        assert_eq!("size".parse::<Variable>().unwrap(), Variable::Size);
        assert_eq!("ConnOpts".parse::<Variable>().unwrap(), Variable::ConnOpts);
        assert!("BOGUS".parse::<Variable>().unwrap_err().is_config());
        assert_eq!(Variable::Size.placeholder(), "{SIZE}");
    }

    #[test]
    fn new_context_has_every_variable_empty() {
        let vars = Variables::new();
        assert_eq!(vars.iter().count(), Variable::ALL.len());
        assert!(vars.iter().all(|(_, v)| v.is_empty()));
    }

    #[test]
    fn bare_placeholders_are_quoted_when_needed() {
        let out = interpolate("osc --alter {CLAUSES} D={SCHEMA},t={table} -h {HOST}", &vars(), false)
            .unwrap();
        assert_eq!(
            out,
            "osc --alter 'ADD COLUMN `age` int' D=app,t=users -h db1.example.com"
        );
    }

    #[test]
    fn empty_bare_value_becomes_empty_quotes() {
        let out = interpolate("tool --socket {SOCKET}", &vars(), false).unwrap();
        assert_eq!(out, "tool --socket ''");
    }

    #[test]
    fn quoted_placeholders_are_escaped_for_their_context() {
        let out = interpolate("tool -p '{PASSWORD}'", &vars(), false).unwrap();
        assert_eq!(out, r"tool -p 'it'\''s secret'");

        let mut v = Variables::new();
        v.set(Variable::Ddl, "ALTER TABLE `t` COMMENT \"$x\"");
        let out = interpolate("echo \"{DDL}\"", &v, false).unwrap();
        assert_eq!(out, r#"echo "ALTER TABLE \`t\` COMMENT \"\$x\"""#);
    }

    #[test]
    fn password_is_masked_in_display_form() {
        let shell = ShellOut::interpolated("tool --password={PASSWORD} {TABLE}", &vars()).unwrap();
        assert_eq!(shell.command(), r"tool --password='it'\''s secret' users");
        assert_eq!(shell.to_string(), "tool --password=***** users");
    }

    #[test]
    fn unknown_placeholder_fails() {
        let err = ShellOut::interpolated("tool {NOPE}", &vars()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("{NOPE}"));
    }

    #[test]
    fn non_placeholder_braces_are_left_alone() {
        let out = interpolate("awk '{print $1}' {TABLE}", &vars(), false).unwrap();
        assert_eq!(out, "awk '{print $1}' users");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_reports_exit_status() {
        ShellOut::new("true").run().await.unwrap();

        let err = ShellOut::new("exit 3").run().await.unwrap_err();
        assert!(matches!(
            err,
            ApplyError::ExternalCommand { code: Some(3), .. }
        ));
    }
}
