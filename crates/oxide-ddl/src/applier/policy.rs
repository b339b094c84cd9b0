//! Size-based overrides of statement modifiers and wrapper selection.
//!
//! Both steps take the modifiers by value and return the finalized version,
//! so the order of overrides is visible at the call site: the safety
//! override first, then wrapper-driven clause clearing.

use tracing::debug;

use crate::config::{OptionName, OptionSet};
use crate::diff::{DiffType, ObjectDiff, ObjectKey, ObjectType, StatementModifiers};
use crate::error::Result;

/// Forces `allow_unsafe` on when the table is smaller than `safe_below_size`.
#[must_use]
pub fn apply_safe_below_size(
    mut mods: StatementModifiers,
    key: &ObjectKey,
    table_size: u64,
    safe_below_size: u64,
) -> StatementModifiers {
    if table_size < safe_below_size {
        debug!(
            object = %key,
            size = table_size,
            safe_below_size,
            "Allowing unsafe operations"
        );
        mods.allow_unsafe = true;
    }
    mods
}

/// Returns the command template that should run `diff`, or an empty string
/// to run it directly, along with the finalized modifiers.
///
/// `ddl-wrapper` applies to everything. For ALTER TABLE, an explicitly
/// configured `alter-wrapper` takes over when the table is at least
/// `alter-wrapper-min-size` bytes. When that threshold is positive, the
/// algorithm and lock clauses are dropped, since an external online schema
/// change tool would choke on them.
pub fn resolve_wrapper(
    config: &OptionSet,
    diff: &dyn ObjectDiff,
    table_size: u64,
    mut mods: StatementModifiers,
) -> Result<(String, StatementModifiers)> {
    let mut wrapper = config.get(OptionName::DdlWrapper).to_string();
    let key = diff.object_key();

    if key.object_type == ObjectType::Table
        && diff.diff_type() == DiffType::Alter
        && config.changed(OptionName::AlterWrapper)
    {
        let min_size = config.get_bytes(OptionName::AlterWrapperMinSize)?;

        if table_size >= min_size {
            wrapper = config.get(OptionName::AlterWrapper).to_string();
            if min_size > 0 {
                debug!(object = %key, size = table_size, min_size, "Using alter-wrapper");
                if !mods.algorithm_clause.is_empty() || !mods.lock_clause.is_empty() {
                    debug!("Ignoring alter-algorithm and alter-lock for generating DDL for alter-wrapper");
                    mods.algorithm_clause.clear();
                    mods.lock_clause.clear();
                }
            }
        } else {
            debug!(object = %key, size = table_size, min_size, "Skipping alter-wrapper");
        }
    }

    Ok((wrapper, mods))
}
