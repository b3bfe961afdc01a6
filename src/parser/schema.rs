use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::analysis_cache::{get_json, set_json};
use crate::cache::AnalysisCache;
use crate::error::Result;
use crate::parser::names::unquote_identifier;
use crate::parser::sql_parser::{parse_database, ColumnLike, DatabaseLike, ParserDB, TableLike};

/// Fixed cache key of the schema snapshot.
pub const SCHEMA_CACHE_KEY: &str = "sqlparser_tablesInDb";

/// Table name → column names, as declared by the store's schema definitions.
///
/// Lookups are exact (case-sensitive), matching how the store reports names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl SchemaSnapshot {
    /// Build a snapshot from a parsed schema database.
    pub fn from_database(db: &ParserDB) -> Self {
        db.tables()
            .map(|table| {
                let columns = table
                    .columns(db)
                    .map(|c| unquote_identifier(c.column_name()).to_string())
                    .collect::<Vec<_>>();
                (unquote_identifier(table.table_name()).to_string(), columns)
            })
            .collect()
    }

    /// Load the snapshot from `cache`, or parse `ddl` and store the result
    /// under [`SCHEMA_CACHE_KEY`].
    pub fn load_or_parse(cache: &dyn AnalysisCache, ddl: &str) -> Result<Self> {
        if let Some(snapshot) = get_json::<Self>(cache, SCHEMA_CACHE_KEY)? {
            debug!(tables = snapshot.len(), "schema snapshot served from cache");
            return Ok(snapshot);
        }
        let snapshot = parse_schema(ddl)?;
        set_json(cache, SCHEMA_CACHE_KEY, &snapshot)?;
        debug!(tables = snapshot.len(), "schema snapshot parsed and cached");
        Ok(snapshot)
    }

    /// Whether `table` declares a column named `field`.
    pub fn has_field(&self, table: &str, field: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|columns| columns.contains(field))
    }

    /// Whether `table` is declared at all.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Declared columns of `table`.
    pub fn columns(&self, table: &str) -> impl Iterator<Item = &str> {
        self.tables
            .get(table)
            .into_iter()
            .flat_map(|columns| columns.iter().map(String::as_str))
    }

    /// Declared table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Number of declared tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table is declared.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl<T, C, F> FromIterator<(T, C)> for SchemaSnapshot
where
    T: Into<String>,
    C: IntoIterator<Item = F>,
    F: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (T, C)>>(iter: I) -> Self {
        let mut tables: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (table, columns) in iter {
            tables
                .entry(table.into())
                .or_default()
                .extend(columns.into_iter().map(Into::into));
        }
        Self { tables }
    }
}

/// Parse `CREATE TABLE` definitions into a snapshot.
pub fn parse_schema(ddl: &str) -> Result<SchemaSnapshot> {
    let db = parse_database(ddl)?;
    Ok(SchemaSnapshot::from_database(&db))
}
