use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Feature switches for tag emission and flushing.
///
/// Every key is optional in the JSON form; missing keys fall back to the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Emit `<table>_<uid>` tags for every row a page rendered.
    pub flush_cache_on_uid: bool,
    /// Emit and flush `<table>--new` tags for listing queries.
    pub flush_cache_on_new: bool,
    /// Emit and flush `<table>-<field>` tags for fields used in predicates.
    pub flush_cache_on_conditional_field: bool,
    /// Only log what would be tagged or flushed; never touch the page cache.
    pub metrics_only: bool,
    /// Page cache lifetime in seconds, used to clamp the computed bound.
    pub default_cache_timeout: Option<u64>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            flush_cache_on_uid: true,
            flush_cache_on_new: true,
            flush_cache_on_conditional_field: true,
            metrics_only: false,
            default_cache_timeout: None,
        }
    }
}

impl Configuration {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid configuration JSON: {e}")))
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_json(&content)
    }
}
