//! Typed access to the options that steer DDL execution.
//!
//! Options are stored as raw strings, the way they arrive from option files
//! or the command line, and parsed on access. Parse failures surface as
//! [`ApplyError::Config`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::error::{ApplyError, Result};

/// Options consulted while building a DDL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionName {
    /// Command template used for every DDL statement.
    DdlWrapper,
    /// Command template used for ALTER TABLE.
    AlterWrapper,
    /// Tables smaller than this skip `alter-wrapper`.
    AlterWrapperMinSize,
    /// Tables smaller than this permit unsafe statements.
    SafeBelowSize,
    /// Enable `foreign_key_checks` for ALTERs adding foreign keys.
    ForeignKeyChecks,
    /// Session variables for connections.
    ConnectOptions,
    /// Environment name.
    Environment,
    /// User name.
    User,
    /// Password.
    Password,
}

impl OptionName {
    /// Every known option.
    pub const ALL: [Self; 9] = [
        Self::DdlWrapper,
        Self::AlterWrapper,
        Self::AlterWrapperMinSize,
        Self::SafeBelowSize,
        Self::ForeignKeyChecks,
        Self::ConnectOptions,
        Self::Environment,
        Self::User,
        Self::Password,
    ];

    /// The option's name as written in option files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DdlWrapper => "ddl-wrapper",
            Self::AlterWrapper => "alter-wrapper",
            Self::AlterWrapperMinSize => "alter-wrapper-min-size",
            Self::SafeBelowSize => "safe-below-size",
            Self::ForeignKeyChecks => "foreign-key-checks",
            Self::ConnectOptions => "connect-options",
            Self::Environment => "environment",
            Self::User => "user",
            Self::Password => "password",
        }
    }

    /// Value used when the option was never set.
    #[must_use]
    pub fn default_value(&self) -> &'static str {
        match self {
            Self::AlterWrapperMinSize | Self::SafeBelowSize => "0",
            Self::ForeignKeyChecks => "false",
            Self::Environment => "production",
            Self::User => "root",
            Self::DdlWrapper | Self::AlterWrapper | Self::ConnectOptions | Self::Password => "",
        }
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionName {
    type Err = ApplyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|opt| opt.as_str() == s)
            .ok_or_else(|| ApplyError::Config(format!("Unknown option \"{s}\"")))
    }
}

/// A set of explicitly-configured option values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    values: BTreeMap<OptionName, String>,
}

impl OptionSet {
    /// Creates an option set with nothing explicitly configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option, marking it as explicitly configured.
    #[must_use]
    pub fn with(mut self, name: OptionName, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets an option in place.
    pub fn set(&mut self, name: OptionName, value: impl Into<String>) {
        self.values.insert(name, value.into());
    }

    /// Returns true if the option was explicitly configured, even if to its
    /// default value.
    #[must_use]
    pub fn changed(&self, name: OptionName) -> bool {
        self.values.contains_key(&name)
    }

    /// Returns the raw text value of an option.
    #[must_use]
    pub fn get(&self, name: OptionName) -> &str {
        self.values
            .get(&name)
            .map_or_else(|| name.default_value(), String::as_str)
    }

    /// Returns the text value of an option, resolving a `$NAME` value from
    /// the environment.
    #[must_use]
    pub fn get_allow_env_var(&self, name: OptionName) -> String {
        let value = self.get(name);
        match value.strip_prefix('$') {
            Some(var) if is_env_var_name(var) => std::env::var(var).unwrap_or_default(),
            _ => value.to_string(),
        }
    }

    /// Returns an option parsed as a boolean.
    pub fn get_bool(&self, name: OptionName) -> Result<bool> {
        parse_bool(self.get(name)).ok_or_else(|| {
            ApplyError::Config(format!(
                "Option {name} has non-boolean value \"{}\"",
                self.get(name)
            ))
        })
    }

    /// Returns an option parsed as a byte count.
    pub fn get_bytes(&self, name: OptionName) -> Result<u64> {
        parse_bytes(self.get(name)).ok_or_else(|| {
            ApplyError::Config(format!(
                "Option {name} must be a byte count with optional K, M, G, or T suffix; found \"{}\" instead",
                self.get(name)
            ))
        })
    }
}

fn is_env_var_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses a boolean option value. An empty value is false.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "off" | "no" => Some(false),
        "1" | "true" | "on" | "yes" => Some(true),
        _ => None,
    }
}

/// Parses a byte count such as `1024`, `64k`, `10M` or `2GB`. Suffixes are
/// powers of 1024.
#[must_use]
pub fn parse_bytes(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return Some(0);
    }
    let upper = value.to_ascii_uppercase();
    let digits = upper.strip_suffix('B').unwrap_or(&upper);
    let (digits, multiplier) = match digits.chars().last()? {
        'K' => (&digits[..digits.len() - 1], 1_u64 << 10),
        'M' => (&digits[..digits.len() - 1], 1 << 20),
        'G' => (&digits[..digits.len() - 1], 1 << 30),
        'T' => (&digits[..digits.len() - 1], 1 << 40),
        _ => (digits, 1),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok()?.checked_mul(multiplier)
}

impl<'de> Deserialize<'de> for OptionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OptionSetVisitor;

        impl<'de> Visitor<'de> for OptionSetVisitor {
            type Value = OptionSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of option names to values")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<OptionSet, A::Error> {
                let mut options = OptionSet::new();
                while let Some(key) = map.next_key::<String>()? {
                    let name: OptionName = key.parse().map_err(de::Error::custom)?;
                    let value = match map.next_value::<serde_json::Value>()? {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Bool(b) => b.to_string(),
                        serde_json::Value::Number(n) => n.to_string(),
                        serde_json::Value::Null => String::new(),
                        other => {
                            return Err(de::Error::custom(format!(
                                "option {name} has unsupported value {other}"
                            )));
                        }
                    };
                    options.set(name, value);
                }
                Ok(options)
            }
        }

        deserializer.deserialize_map(OptionSetVisitor)
    }
}
