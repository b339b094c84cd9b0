//! Table size lookups for size-based options.

use tracing::debug;

use crate::config::{OptionName, OptionSet};
use crate::diff::{DiffType, ObjectDiff, ObjectType};
use crate::error::Result;
use crate::shellout::Variable;
use crate::target::Target;

/// Returns true if `diff` is an ALTER or DROP of a table and some option
/// depends on the table's size: either a size threshold is configured, or a
/// wrapper template references `{SIZE}`.
#[must_use]
pub fn needs_table_size(diff: &dyn ObjectDiff, config: &OptionSet) -> bool {
    if diff.object_key().object_type != ObjectType::Table || diff.diff_type() == DiffType::Create {
        return false;
    }

    if [OptionName::SafeBelowSize, OptionName::AlterWrapperMinSize]
        .into_iter()
        .any(|opt| config.changed(opt))
    {
        return true;
    }

    let placeholder = Variable::Size.placeholder();
    [OptionName::AlterWrapper, OptionName::DdlWrapper]
        .into_iter()
        .any(|opt| config.get(opt).to_uppercase().contains(&placeholder))
}

/// Returns the size of `table` in the target's schema. A table without rows
/// is reported as 0 bytes, even though `information_schema` shows at least
/// one page for it.
pub async fn table_size(target: &Target, table: &str) -> Result<u64> {
    let instance = &target.instance;
    if !instance.table_has_rows(&target.schema_name, table).await? {
        debug!(schema = %target.schema_name, table, "Table has no rows, treating size as 0");
        return Ok(0);
    }
    instance.table_size(&target.schema_name, table).await
}
