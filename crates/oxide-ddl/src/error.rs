//! Error types for DDL statement construction and execution.

use std::time::Duration;

use crate::diff::DiffError;

/// Errors that can occur while building or running a DDL statement.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// An option value is malformed (size strings, connect-options, wrapper
    /// templates).
    #[error("{0}")]
    Config(String),

    /// The rendered statement is unsafe or destructive and the current
    /// modifiers do not permit it.
    #[error(
        "Preventing execution of unsafe or potentially destructive statement:\n{commented}\nUse --allow-unsafe or --safe-below-size to permit this operation. For more information, see Safety Options section of --help."
    )]
    Forbidden {
        /// The statement exactly as the diff rendered it.
        statement: String,
        /// The statement commented out and wrapped for terminal display.
        commented: String,
    },

    /// Error from the diff rendering capability, passed through untouched.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// Database error while querying table metadata or running a statement.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (spawning an external command, reading plan files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An external command exited unsuccessfully.
    #[error("External command failed with {}: {command}", .code.map_or_else(|| "signal".to_string(), |c| format!("exit code {c}")))]
    ExternalCommand {
        /// Display form of the command.
        command: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
    },

    /// A statement exceeded the read timeout of its connection.
    #[error("Statement timed out after {after:?}")]
    Timeout {
        /// The timeout that elapsed.
        after: Duration,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApplyError {
    /// Returns true if this error is a safety-policy rejection.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// Returns true if this error stems from a malformed option value.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type for DDL operations.
pub type Result<T> = std::result::Result<T, ApplyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_message_names_both_overrides() {
        let err = ApplyError::Forbidden {
            statement: "DROP TABLE `users`".to_string(),
            commented: "  # DROP TABLE `users`".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("  # DROP TABLE `users`"));
        assert!(msg.contains("--allow-unsafe"));
        assert!(msg.contains("--safe-below-size"));
        assert!(err.is_forbidden());
        assert!(!err.is_config());
    }

    #[test]
    fn external_command_message() {
        let err = ApplyError::ExternalCommand {
            command: "false".to_string(),
            code: Some(1),
        };
        assert_eq!(err.to_string(), "External command failed with exit code 1: false");

        let err = ApplyError::ExternalCommand {
            command: "sleep 100".to_string(),
            code: None,
        };
        assert_eq!(err.to_string(), "External command failed with signal: sleep 100");
    }
}
