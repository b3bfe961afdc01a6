use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::parser::expr::ColumnRef;
use crate::parser::names::table_field;
use crate::parser::schema::SchemaSnapshot;

/// Name resolution state for the statements of one query text.
///
/// Aliases and candidate tables accumulate over every statement; the
/// selected-field list belongs to the statement being analyzed.
#[derive(Debug)]
pub struct QueryScope<'s> {
    schema: &'s SchemaSnapshot,
    aliases: HashMap<String, String>,
    possible_tables: Vec<String>,
    selected_fields: Vec<String>,
}

impl<'s> QueryScope<'s> {
    /// Create an empty scope resolving against `schema`.
    pub fn new(schema: &'s SchemaSnapshot) -> Self {
        Self {
            schema,
            aliases: HashMap::new(),
            possible_tables: Vec::new(),
            selected_fields: Vec::new(),
        }
    }

    /// Register a table of the FROM list or a JOIN.
    pub fn add_table(&mut self, table: &str, alias: Option<&str>) {
        if !self.possible_tables.iter().any(|t| t == table) {
            self.possible_tables.push(table.to_string());
        }
        if let Some(alias) = alias {
            self.aliases.insert(alias.to_string(), table.to_string());
        }
    }

    /// Tables referenced so far, in order of appearance.
    pub fn possible_tables(&self) -> &[String] {
        &self.possible_tables
    }

    /// Map an alias to its table; anything else is taken as a table name.
    pub fn resolve_table<'a>(&'a self, qualifier: &'a str) -> &'a str {
        self.aliases
            .get(qualifier)
            .map_or(qualifier, String::as_str)
    }

    /// Forget the projection of the previous statement.
    pub fn clear_selected(&mut self) {
        self.selected_fields.clear();
    }

    /// Remember a qualified projection item (`table.field` or `table.*`).
    pub fn add_selected(&mut self, qualifier: &str, column: &str) {
        let reference = table_field(self.resolve_table(qualifier), column);
        self.selected_fields.push(reference);
    }

    /// Resolve a column reference to `table.field`.
    ///
    /// Returns `Ok(None)` when no candidate table owns the field. With
    /// `narrow_by_selection`, an ambiguous bare name is narrowed to the tables
    /// whose field (or wildcard) appears in the projection; when none of them
    /// does, the name is dropped.
    pub fn resolve(&self, column: &ColumnRef, narrow_by_selection: bool) -> Result<Option<String>> {
        if let Some(qualifier) = &column.qualifier {
            let table = self.resolve_table(qualifier);
            if self.schema.has_field(table, &column.field) {
                return Ok(Some(table_field(table, &column.field)));
            }
        }
        Ok(self
            .unique_table_for_field(&column.field, narrow_by_selection)?
            .map(|table| table_field(table, &column.field)))
    }

    /// The only candidate table declaring `field`.
    pub fn unique_table_for_field(
        &self,
        field: &str,
        narrow_by_selection: bool,
    ) -> Result<Option<&str>> {
        let owners: Vec<&str> = self
            .possible_tables
            .iter()
            .map(String::as_str)
            .filter(|table| self.schema.has_field(table, field))
            .collect();

        match owners.as_slice() {
            [] => Ok(None),
            [table] => Ok(Some(*table)),
            _ if narrow_by_selection && !self.selected_fields.is_empty() => {
                let selected: Vec<&str> = owners
                    .iter()
                    .copied()
                    .filter(|table| self.is_selected(table, field))
                    .collect();
                match selected.as_slice() {
                    [] => Ok(None),
                    [table] => Ok(Some(*table)),
                    _ => Err(ambiguous(field, &selected)),
                }
            }
            _ => Err(ambiguous(field, &owners)),
        }
    }

    fn is_selected(&self, table: &str, field: &str) -> bool {
        let exact = table_field(table, field);
        let wildcard = table_field(table, "*");
        self.selected_fields
            .iter()
            .any(|selected| *selected == exact || *selected == wildcard)
    }
}

fn ambiguous(field: &str, tables: &[&str]) -> Error {
    Error::AmbiguousField {
        field: field.to_string(),
        tables: tables.iter().map(|t| t.to_string()).collect(),
    }
}
