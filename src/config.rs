//! Tree table configuration
//!
//! Names the table and the five columns the engine reads and writes. The
//! roles are fixed (id, title, left, right, parent); only the names change.

use crate::{MpttError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Table and column names used by a tree session.
///
/// ```
/// use mptt::MpttConfig;
///
/// let config = MpttConfig::default()
///     .with_table("categories")
///     .with_left_column("lft")
///     .with_right_column("rgt");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpttConfig {
    /// Tree table name (default: `mptt`)
    pub table: String,
    /// Auto-assigned integer primary key (default: `id`)
    pub id_column: String,
    /// Node payload (default: `title`)
    pub title_column: String,
    /// Left boundary (default: `lft`)
    pub left_column: String,
    /// Right boundary (default: `rgt`)
    pub right_column: String,
    /// Direct parent id, `0` for topmost nodes (default: `parent`)
    pub parent_column: String,
}

impl Default for MpttConfig {
    fn default() -> Self {
        Self {
            table: "mptt".to_string(),
            id_column: "id".to_string(),
            title_column: "title".to_string(),
            left_column: "lft".to_string(),
            right_column: "rgt".to_string(),
            parent_column: "parent".to_string(),
        }
    }
}

impl MpttConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_title_column(mut self, column: impl Into<String>) -> Self {
        self.title_column = column.into();
        self
    }

    pub fn with_left_column(mut self, column: impl Into<String>) -> Self {
        self.left_column = column.into();
        self
    }

    pub fn with_right_column(mut self, column: impl Into<String>) -> Self {
        self.right_column = column.into();
        self
    }

    pub fn with_parent_column(mut self, column: impl Into<String>) -> Self {
        self.parent_column = column.into();
        self
    }

    /// Parse a configuration from JSON. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// All column names in row order: id, title, left, right, parent
    pub fn columns(&self) -> [&str; 5] {
        [
            &self.id_column,
            &self.title_column,
            &self.left_column,
            &self.right_column,
            &self.parent_column,
        ]
    }

    /// Check every name is a plain SQL identifier and that columns are distinct.
    pub fn validate(&self) -> Result<()> {
        validate_identifier("table", &self.table)?;

        let roles = ["id", "title", "left", "right", "parent"];
        let columns = self.columns();
        for (role, name) in roles.iter().zip(columns.iter()) {
            validate_identifier(role, name)?;
        }

        for (i, name) in columns.iter().enumerate() {
            if let Some(dup) = columns[i + 1..].iter().position(|other| other == name) {
                return Err(MpttError::Config(format!(
                    "column '{}' is used for both the {} and {} roles",
                    name,
                    roles[i],
                    roles[i + 1 + dup]
                )));
            }
        }

        Ok(())
    }
}

fn validate_identifier(role: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first = chars
        .next()
        .ok_or_else(|| MpttError::Config(format!("{} name is empty", role)))?;

    if first.is_ascii_digit() {
        return Err(MpttError::Config(format!(
            "{} name '{}' starts with a digit",
            role, name
        )));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MpttError::Config(format!(
            "{} name '{}' contains characters outside [A-Za-z0-9_]",
            role, name
        )));
    }

    Ok(())
}
