use crate::error::{Error, Result};
use crate::query::row::{Row, Value};

/// Helper columns appended to a rewritten query, by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectBy {
    start_times: Vec<String>,
    end_times: Vec<String>,
    filter_by_start_times: Vec<String>,
    all_fields: Vec<String>,
}

impl SelectBy {
    /// Describe the helper columns of a query.
    ///
    /// `filter_by_start_times` names the start-time columns whose restriction
    /// was lifted from the executed SQL and must be applied per row instead.
    pub fn new(
        start_times: Vec<String>,
        end_times: Vec<String>,
        filter_by_start_times: Vec<String>,
    ) -> Self {
        let mut all_fields: Vec<String> = Vec::new();
        for alias in start_times
            .iter()
            .chain(&end_times)
            .chain(&filter_by_start_times)
        {
            if !all_fields.contains(alias) {
                all_fields.push(alias.clone());
            }
        }
        Self {
            start_times,
            end_times,
            filter_by_start_times,
            all_fields,
        }
    }

    /// Start-time helper aliases.
    pub fn start_times(&self) -> &[String] {
        &self.start_times
    }

    /// End-time helper aliases.
    pub fn end_times(&self) -> &[String] {
        &self.end_times
    }

    /// Start-time aliases acting as a visibility gate.
    pub fn filter_by_start_times(&self) -> &[String] {
        &self.filter_by_start_times
    }

    /// Every helper alias once, in start, end, filter order.
    pub fn all_fields(&self) -> &[String] {
        &self.all_fields
    }

    /// Whether the query carries no helper columns.
    pub fn is_empty(&self) -> bool {
        self.all_fields.is_empty()
    }

    /// Separate the helper columns from the columns the caller selected.
    pub fn split(&self, mut row: Row) -> Result<(Row, HelperColumns)> {
        let mut helpers = Vec::with_capacity(self.all_fields.len());
        for alias in &self.all_fields {
            let value = row.remove(alias).ok_or_else(|| Error::MissingExpectedColumn {
                column: alias.clone(),
            })?;
            helpers.push((alias.clone(), value));
        }
        Ok((row, HelperColumns { values: helpers }))
    }
}

/// Helper column values extracted from one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelperColumns {
    values: Vec<(String, Value)>,
}

impl HelperColumns {
    /// Raw value of helper `alias`.
    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, value)| value)
    }

    /// Timestamp carried by helper `alias`; 0 when absent or `NULL`.
    pub fn timestamp(&self, alias: &str) -> i64 {
        self.get(alias).map_or(0, Value::as_integer)
    }
}
