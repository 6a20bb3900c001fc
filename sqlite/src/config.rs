//! Connection configuration.
//!
//! Defines the YAML-serializable settings applied when a database is opened.
//! Every field has a default, so an empty document is a valid configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! foreign_keys: true
//! enclose_table_names: true
//! busy_timeout_ms: 5000
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sew_core::statement::StatementOptions;

use crate::error::Result;

/// Settings applied to every connection.
///
/// # Examples
///
/// ```
/// use sew_sqlite::DatabaseConfig;
///
/// let config: DatabaseConfig = serde_yaml::from_str("busy_timeout_ms: 250").unwrap();
/// assert!(config.foreign_keys);
/// assert!(config.enclose_table_names);
/// assert_eq!(config.busy_timeout_ms, Some(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Run `PRAGMA foreign_keys = ON` after opening.
    pub foreign_keys: bool,
    /// Double-quote table names in generated statements.
    pub enclose_table_names: bool,
    /// How long the engine waits on a locked database.
    pub busy_timeout_ms: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            foreign_keys: true,
            enclose_table_names: true,
            busy_timeout_ms: None,
        }
    }
}

impl DatabaseConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::SewError::IoError) if the file cannot be
    /// read, or [`YamlError`](crate::SewError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::SewError::IoError) if the file cannot be
    /// written, or [`YamlError`](crate::SewError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout_ms.map(Duration::from_millis)
    }

    /// Statement rendering options derived from this configuration.
    pub fn statement_options(&self) -> StatementOptions {
        StatementOptions {
            enclose_table_names: self.enclose_table_names,
        }
    }
}
