/// Column-reference extraction from SQL expressions.
pub mod expr;
/// Identifier helpers: quoting, `table.field` references and ordering.
pub mod names;
/// The table → columns snapshot used for field-existence lookups.
pub mod schema;
/// Thin wrapper around `sql-traits` and `sqlparser` for schema and query parsing.
pub mod sql_parser;
