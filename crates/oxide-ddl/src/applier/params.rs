//! Session params for statements run directly.

use crate::config::{OptionName, OptionSet};
use crate::diff::{DiffType, ObjectDiff};
use crate::error::Result;

/// Unlimited read timeout: ALTER and DROP of large tables can be slow.
const UNLIMITED_READ_TIMEOUT: &str = "readTimeout=0";

/// Returns the connection params (query-string encoded) to use when running
/// `diff` directly.
///
/// ALTER TABLE and DROP TABLE get an unlimited read timeout. An ALTER TABLE
/// that adds foreign keys also enables `foreign_key_checks` when the
/// `foreign-key-checks` option is on.
pub fn connect_params(diff: &dyn ObjectDiff, config: &OptionSet) -> Result<String> {
    let Some(table_diff) = diff.as_table_diff() else {
        return Ok(String::new());
    };
    match diff.diff_type() {
        DiffType::Alter => {
            if config.get_bool(OptionName::ForeignKeyChecks)? && table_diff.adds_foreign_keys() {
                Ok(format!("{UNLIMITED_READ_TIMEOUT}&foreign_key_checks=1"))
            } else {
                Ok(UNLIMITED_READ_TIMEOUT.to_string())
            }
        }
        DiffType::Drop => Ok(UNLIMITED_READ_TIMEOUT.to_string()),
        DiffType::Create => Ok(String::new()),
    }
}
