//! Tree configuration module.
//!
//! This module provides the policy knobs of the tree engine and loads them
//! from environment variables.
//!
//! # Environment Variables
//!
//! - `DATATREE_AUTO_DECLARE`: declare unknown fields on first write (default: `true`)
//! - `DATATREE_STRICT_SCHEMA`: freeze a schema at the first write (default: `true`)
//! - `DATATREE_MAX_DEPTH`: maximum nesting accepted by the decoder (default: `256`)
//! - `DATATREE_MAX_STRING_LENGTH`: maximum string length in bytes (default: 16 MiB)
//!
//! # Invariants
//!
//! - `max_depth` is at least 1
//! - `max_string_len` is at least 1 and fits in a `u32` length prefix

use crate::constants::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_STRING_LENGTH};

/// Tree engine configuration.
///
/// A `TreeConfig` is handed to [`crate::TreeFactory`] once at startup and
/// copied into every tree the factory plants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Writing an undeclared field declares it with the written kind.
    /// When off, such writes fail with `UnknownField`.
    pub auto_declare: bool,
    /// Explicit declarations are rejected once a sapling holds data.
    pub strict_schema: bool,
    /// Maximum nesting depth accepted when decoding.
    pub max_depth: usize,
    /// Maximum length of any string value, field name or lookup text.
    pub max_string_len: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            auto_declare: true,
            strict_schema: true,
            max_depth: DEFAULT_MAX_DEPTH,
            max_string_len: DEFAULT_MAX_STRING_LENGTH,
        }
    }
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl TreeConfig {
    pub const AUTO_DECLARE_VAR: &'static str = "DATATREE_AUTO_DECLARE";
    pub const STRICT_SCHEMA_VAR: &'static str = "DATATREE_STRICT_SCHEMA";
    pub const MAX_DEPTH_VAR: &'static str = "DATATREE_MAX_DEPTH";
    pub const MAX_STRING_LENGTH_VAR: &'static str = "DATATREE_MAX_STRING_LENGTH";

    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let auto_declare = match lookup(Self::AUTO_DECLARE_VAR) {
            Some(value) => parse_bool(Self::AUTO_DECLARE_VAR, &value)?,
            None => defaults.auto_declare,
        };
        let strict_schema = match lookup(Self::STRICT_SCHEMA_VAR) {
            Some(value) => parse_bool(Self::STRICT_SCHEMA_VAR, &value)?,
            None => defaults.strict_schema,
        };
        let max_depth = match lookup(Self::MAX_DEPTH_VAR) {
            Some(value) => parse_limit(Self::MAX_DEPTH_VAR, &value, usize::MAX)?,
            None => defaults.max_depth,
        };
        let max_string_len = match lookup(Self::MAX_STRING_LENGTH_VAR) {
            Some(value) => parse_limit(Self::MAX_STRING_LENGTH_VAR, &value, u32::MAX as usize)?,
            None => defaults.max_string_len,
        };

        Ok(Self {
            auto_declare,
            strict_schema,
            max_depth,
            max_string_len,
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a boolean"),
        }),
    }
}

fn parse_limit(name: &str, value: &str, max: usize) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n >= 1 && n <= max => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a number between 1 and {max}"),
        }),
    }
}
