//! Safe application of DDL to live MySQL and MariaDB instances.
//!
//! `oxide-ddl` takes a pending schema change (a diff) and decides how it
//! should run:
//! - Unsafe or destructive statements are refused unless explicitly allowed,
//!   either unconditionally or because the table is small enough
//! - Large ALTER TABLEs can be handed off to an external online schema change
//!   tool through a command template
//! - Direct execution uses session params suited to the statement
//!
//! # Architecture
//!
//! - **Diff** - the [`ObjectDiff`](diff::ObjectDiff) capability a diff engine
//!   provides: object identity and SQL rendering under modifiers
//! - **Applier** - builds a [`DdlStatement`](applier::DdlStatement) from a diff,
//!   modifiers and a [`Target`](target::Target)
//! - **Instance** - table metadata queries and pooled execution
//! - **Shell-out** - `{VARIABLE}` interpolation into wrapper commands
//! - **Config** - typed access to the options steering all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_ddl::prelude::*;
//!
//! let options = OptionSet::new()
//!     .with(OptionName::SafeBelowSize, "10M")
//!     .with(OptionName::AlterWrapper, "pt-online-schema-change --alter {CLAUSES} D={SCHEMA},t={TABLE}")
//!     .with(OptionName::AlterWrapperMinSize, "1G");
//! let instance: Arc<dyn Instance> = Arc::new(MySqlInstance::new("127.0.0.1", 3306));
//! let target = Target::new(instance, "app", Arc::new(Dir::new("schemas/app", options)));
//!
//! if let Some(ddl) = DdlStatement::new(&diff, &StatementModifiers::new(), &target).await? {
//!     println!("{}", ddl.statement());
//!     ddl.execute().await?;
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show what would run
//! oxide-ddl apply --plan plan.json --host 127.0.0.1 --schema app --dry-run
//!
//! # Run it
//! oxide-ddl apply --plan plan.json --host 127.0.0.1 --schema app
//! ```

pub mod applier;
pub mod config;
pub mod connopts;
pub mod diff;
pub mod error;
pub mod instance;
pub mod plan;
pub mod shellout;
pub mod target;
pub mod wrap;

/// Prelude for convenient imports.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::applier::{ClientState, DdlStatement};
    pub use crate::config::{OptionName, OptionSet};
    pub use crate::diff::{
        DiffError, DiffType, ObjectDiff, ObjectKey, ObjectType, StatementModifiers, TableDiff,
    };
    pub use crate::error::{ApplyError, Result};
    pub use crate::instance::{Instance, MySqlInstance};
    pub use crate::plan::{Plan, PlannedDiff};
    pub use crate::shellout::{ShellOut, Variable, Variables};
    pub use crate::target::{Dir, Target};
}
