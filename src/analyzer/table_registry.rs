use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Platform page table; its row tags use the `pageId` prefix.
pub const PAGE_TABLE: &str = "pages";
/// Tag prefix used for rows of [`PAGE_TABLE`].
pub const PAGE_TAG_PREFIX: &str = "pageId";
/// Page-content table, already invalidated through its page.
pub const CONTENT_TABLE: &str = "tt_content";
/// Uploaded-file metadata table, tracked despite its system prefix.
pub const FILE_TABLE: &str = "sys_file";
/// Namespace prefix of administrative-user tables.
pub const ADMIN_PREFIX: &str = "be_";
/// Namespace prefix of system tables.
pub const SYSTEM_PREFIX: &str = "sys_";

/// Columns that control row visibility for a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnableColumns {
    /// Boolean "hidden" column.
    pub disabled: Option<String>,
    /// Timestamp before which a row is not visible.
    pub starttime: Option<String>,
    /// Timestamp after which a row is not visible.
    pub endtime: Option<String>,
}

/// Content-type definition of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDefinition {
    /// Static reference data that never changes at runtime.
    pub is_static: bool,
    /// Rows cannot be edited through the platform.
    pub read_only: bool,
    /// Soft-delete column.
    pub delete: Option<String>,
    /// Visibility columns.
    pub enable_columns: EnableColumns,
}

/// Registry of known content types, keyed by table name.
///
/// A table missing from the registry is not a trackable content type.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    /// Table name → definition lookup table.
    pub tables: HashMap<String, TableDefinition>,
}

impl TableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load table definitions from a JSON string.
    pub fn load_from_json(&mut self, json: &str) -> Result<()> {
        let parsed: HashMap<String, TableDefinition> = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid table registry JSON: {e}")))?;
        self.tables.extend(parsed);
        Ok(())
    }

    /// Read and load a registry file.
    pub fn load_from_path(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        self.load_from_json(&content)
    }

    /// Register a definition.
    pub fn insert(&mut self, table: impl Into<String>, definition: TableDefinition) {
        self.tables.insert(table.into(), definition);
    }

    /// Get the definition of a table.
    pub fn get(&self, table: &str) -> Option<&TableDefinition> {
        self.tables.get(table)
    }

    /// Whether the table is a known content type.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Visibility columns of a table, if it is known.
    pub fn enable_columns(&self, table: &str) -> Option<&EnableColumns> {
        self.get(table).map(|definition| &definition.enable_columns)
    }

    /// Whether usages of `table` must never produce tags or flushes.
    pub fn is_excluded(&self, table: &str) -> bool {
        let Some(definition) = self.get(table) else {
            return true;
        };
        if definition.is_static || definition.read_only {
            return true;
        }
        if table == CONTENT_TABLE || table.starts_with(ADMIN_PREFIX) {
            return true;
        }
        if table == FILE_TABLE {
            return false;
        }
        table.starts_with(SYSTEM_PREFIX)
    }
}

/// Prefix used in row tags for `table`.
pub fn tag_table(table: &str) -> &str {
    if table == PAGE_TABLE {
        PAGE_TAG_PREFIX
    } else {
        table
    }
}
