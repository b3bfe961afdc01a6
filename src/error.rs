use thiserror::Error;

/// Errors raised while analyzing statements, intercepting rows, or talking to
/// the cache collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// The statement is not a plain `SELECT` or uses a construct the analyzer
    /// cannot classify (set operations, derived tables, subqueries, ...).
    #[error("unsupported statement ({reason}): {sql}")]
    UnsupportedStatement {
        /// Statement text as handed to the analyzer.
        sql: String,
        /// Human-readable explanation of the rejected construct.
        reason: String,
    },

    /// An unqualified identifier exists in more than one candidate table.
    #[error("ambiguous field name: {} field:{field}", tables.join(", "))]
    AmbiguousField {
        /// Bare column name that could not be attributed.
        field: String,
        /// Every table that owns a column of that name.
        tables: Vec<String>,
    },

    /// A helper column appended by the query rewriter is missing from a row.
    #[error("field not found, {column}")]
    MissingExpectedColumn {
        /// Alias of the helper column.
        column: String,
    },

    /// Key/value extraction was requested on a result with fewer than two columns.
    #[error("key/value extraction needs at least two columns, result has {column_count}")]
    NoKeyValue {
        /// Visible column count of the result.
        column_count: usize,
    },

    /// Schema definitions could not be parsed into a snapshot.
    #[error("schema error: {0}")]
    Schema(String),

    /// The persistent analysis cache failed to read or write an entry.
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration or registry input is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Output artifacts could not be written.
    #[error("output error: {0}")]
    Output(String),

    /// Failure reported by the underlying row source or cache backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Wrap an unsupported-construct failure for `sql`.
    pub fn unsupported(sql: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedStatement {
            sql: sql.to_string(),
            reason: reason.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
