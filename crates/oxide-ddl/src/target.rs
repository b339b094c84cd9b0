//! Where statements are applied.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::OptionSet;
use crate::instance::Instance;

/// A directory of schema definitions and the options that apply to it.
#[derive(Debug, Clone, Default)]
pub struct Dir {
    /// Path of the directory.
    pub path: PathBuf,
    /// Options in effect for this directory.
    pub config: OptionSet,
}

impl Dir {
    /// Creates a directory entry.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, config: OptionSet) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Returns the last path component, or an empty string.
    #[must_use]
    pub fn base_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Returns the path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A schema on an instance, along with the directory it is managed from.
#[derive(Clone)]
pub struct Target {
    /// The instance statements run on. Shared with the caller.
    pub instance: Arc<dyn Instance>,
    /// Schema name.
    pub schema_name: String,
    /// Directory whose options apply.
    pub dir: Arc<Dir>,
}

impl Target {
    /// Creates a target.
    #[must_use]
    pub fn new(instance: Arc<dyn Instance>, schema_name: impl Into<String>, dir: Arc<Dir>) -> Self {
        Self {
            instance,
            schema_name: schema_name.into(),
            dir,
        }
    }

    /// The options in effect for this target.
    #[must_use]
    pub fn config(&self) -> &OptionSet {
        &self.dir.config
    }
}
