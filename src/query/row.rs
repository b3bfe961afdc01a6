use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analyzer::dependency::UID_FIELD;
use crate::error::Result;

/// A single column value as delivered by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean column.
    Bool(bool),
    /// Integer column.
    Int(i64),
    /// Floating point column.
    Float(f64),
    /// Anything else, including numbers delivered as text.
    Text(String),
}

impl Value {
    /// Integer reading of the value, the way the store's timestamps and ids
    /// are compared: numeric text is parsed, anything unreadable is 0.
    pub fn as_integer(&self) -> i64 {
        match self {
            Self::Null => 0,
            Self::Bool(b) => i64::from(*b),
            Self::Int(i) => *i,
            Self::Float(f) => *f as i64,
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .or_else(|_| s.parse::<f64>().map(|f| f as i64))
                    .unwrap_or(0)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A result row: named columns in select order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Build a row from `(name, value)` pairs.
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Value of the column called `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Whether a column called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove the column called `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.columns.iter().position(|(column, _)| column == name)?;
        Some(self.columns.remove(index).1)
    }

    /// Remove and return the first column.
    pub fn take_first(&mut self) -> Option<(String, Value)> {
        if self.columns.is_empty() {
            None
        } else {
            Some(self.columns.remove(0))
        }
    }

    /// Row identifier; 0 when the column is missing or not numeric.
    pub fn uid(&self) -> i64 {
        self.get(UID_FIELD).map_or(0, Value::as_integer)
    }

    /// Column names in select order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Values in select order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, value)| value)
    }

    /// Consume the row into its values, dropping the names.
    pub fn into_values(self) -> Vec<Value> {
        self.columns.into_iter().map(|(_, value)| value).collect()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// Forward-only cursor over the rows of an executed statement.
pub trait RowSource {
    /// Next raw row, or `None` when the cursor is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>>;

    /// Number of columns the statement returns.
    fn column_count(&self) -> usize;
}

/// Row source over rows already held in memory.
#[derive(Debug, Clone, Default)]
pub struct VecRowSource {
    columns: Vec<String>,
    rows: VecDeque<Row>,
}

impl VecRowSource {
    /// Build a source from column names and positional values.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|values| columns.iter().cloned().zip(values).collect())
            .collect();
        Self { columns, rows }
    }
}

impl RowSource for VecRowSource {
    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }
}
