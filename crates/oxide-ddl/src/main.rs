//! oxide-ddl CLI
//!
//! Command-line tool for applying planned DDL with safety checks.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use oxide_ddl::connopts::connect_options_to_params;
use oxide_ddl::instance::escape_identifier;
use oxide_ddl::prelude::*;

/// Safe application of DDL to MySQL and MariaDB.
#[derive(Parser)]
#[command(name = "oxide-ddl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the diffs in a plan file.
    Apply {
        /// Plan file (JSON).
        #[arg(short, long)]
        plan: PathBuf,

        /// Options file (JSON); replaces the plan's options.
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Database host.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Database port.
        #[arg(long, default_value_t = 3306)]
        port: u16,

        /// Unix socket path; takes precedence over host and port.
        #[arg(long)]
        socket: Option<String>,

        /// Database user.
        #[arg(short, long, env = "MYSQL_USER")]
        user: Option<String>,

        /// Database password.
        #[arg(long, env = "MYSQL_PWD", hide_env_values = true)]
        password: Option<String>,

        /// Schema the diffs apply to.
        #[arg(short, long, default_value = "")]
        schema: String,

        /// Directory the schema is managed from.
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Permit unsafe or destructive statements.
        #[arg(long)]
        allow_unsafe: bool,

        /// ALGORITHM clause for ALTER TABLE.
        #[arg(long)]
        alter_algorithm: Option<String>,

        /// LOCK clause for ALTER TABLE.
        #[arg(long)]
        alter_lock: Option<String>,

        /// Print statements without executing them.
        #[arg(long)]
        dry_run: bool,
    },

    /// List the variables available to wrapper templates.
    Variables,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Variables => {
            for var in Variable::ALL {
                println!("{}", var.placeholder());
            }
        }

        Commands::Apply {
            plan,
            options,
            host,
            port,
            socket,
            user,
            password,
            schema,
            dir,
            allow_unsafe,
            alter_algorithm,
            alter_lock,
            dry_run,
        } => {
            let plan = Plan::load(&plan)?;
            let mut config = match options {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => plan.options.clone(),
            };
            if let Some(user) = user {
                config.set(OptionName::User, user);
            }
            if let Some(password) = password {
                config.set(OptionName::Password, password);
            }

            let instance = match socket {
                Some(path) => MySqlInstance::with_socket(path),
                None => MySqlInstance::new(host, port),
            }
            .credentials(
                config.get_allow_env_var(OptionName::User),
                config.get_allow_env_var(OptionName::Password),
            )
            .default_params(connect_options_to_params(
                config.get(OptionName::ConnectOptions),
            )?);
            let instance: Arc<dyn Instance> = Arc::new(instance);
            let target = Target::new(instance, schema, Arc::new(Dir::new(dir, config)));

            let mut mods = plan.modifiers.clone();
            mods.allow_unsafe |= allow_unsafe;
            if let Some(algorithm) = alter_algorithm {
                mods.algorithm_clause = algorithm;
            }
            if let Some(lock) = alter_lock {
                mods.lock_clause = lock;
            }

            let mut statements = Vec::new();
            for diff in &plan.diffs {
                match DdlStatement::new(diff, &mods, &target).await {
                    Ok(Some(ddl)) => statements.push(ddl),
                    Ok(None) => {}
                    Err(e) => {
                        error!("{} {}: {}", diff.diff_type, diff.key, e);
                        return Err(e.into());
                    }
                }
            }

            if dry_run {
                print_statements(&statements);
                return Ok(());
            }

            for ddl in &statements {
                info!("{}", ddl.statement());
                ddl.execute().await?;
            }
            info!(count = statements.len(), "All statements applied successfully");
        }
    }

    Ok(())
}

/// Prints statements the way the MySQL client would read them, switching
/// schema and delimiter as needed.
fn print_statements(statements: &[DdlStatement]) {
    let mut current = ClientState {
        instance_name: String::new(),
        schema_name: String::new(),
        delimiter: ";".to_string(),
    };
    for ddl in statements {
        let state = ddl.client_state();
        if state.schema_name != current.schema_name && !state.schema_name.is_empty() {
            println!("USE {};", escape_identifier(&state.schema_name));
        }
        if state.delimiter != current.delimiter && !state.delimiter.is_empty() {
            println!("DELIMITER {}", state.delimiter);
        }
        println!("{}{}", ddl.statement(), state.delimiter);
        if !state.delimiter.is_empty() {
            current.delimiter = state.delimiter.clone();
        }
        current.schema_name = state.schema_name;
    }
    if current.delimiter != ";" {
        println!("DELIMITER ;");
    }
}
