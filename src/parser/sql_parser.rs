pub use sql_traits::prelude::*;

use sqlparser::ast::Statement;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::error::{Error, Result};

/// Convenience: parse `CREATE TABLE` definitions into a `ParserDB`.
pub fn parse_database(sql: &str) -> Result<ParserDB> {
    ParserDB::parse::<MySqlDialect>(sql).map_err(|e| Error::Schema(e.to_string()))
}

/// Parse query text into statements using the store's dialect.
///
/// Queries are generated with backtick quoting and `:name` placeholders, so
/// the MySQL dialect is used throughout.
pub fn parse_statements(sql: &str) -> Result<Vec<Statement>> {
    Parser::parse_sql(&MySqlDialect {}, sql).map_err(|e| Error::unsupported(sql, e.to_string()))
}
