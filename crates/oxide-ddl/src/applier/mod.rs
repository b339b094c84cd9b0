//! Turning diffs into executable DDL statements.
//!
//! Building a [`DdlStatement`] runs these steps in order:
//!
//! 1. **Size lookup** - if any size-based option is in play for an ALTER or
//!    DROP TABLE, the table size is queried once.
//! 2. **Safety override** - tables below `safe-below-size` permit unsafe
//!    statements.
//! 3. **Wrapper selection** - `ddl-wrapper`, or `alter-wrapper` for large
//!    enough ALTER TABLEs, which also drops ALGORITHM/LOCK clauses.
//! 4. **Rendering** - the diff renders its statement under the finalized
//!    modifiers; forbidden statements are rejected and empty ones skipped.
//! 5. **Execution details** - session params for direct execution, or an
//!    interpolated external command.

mod params;
mod policy;
mod size;
mod statement;
mod variables;

pub use params::connect_params;
pub use policy::{apply_safe_below_size, resolve_wrapper};
pub use size::{needs_table_size, table_size};
pub use statement::{ClientState, DdlStatement};
pub use variables::{wrapper_variables, WrapperContext};
