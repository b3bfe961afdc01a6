//! Derive page cache invalidation tags from the SQL a page render runs.
//!
//! Every `SELECT` is analyzed once into a [`analyzer::DependencyFact`] (main
//! table, conditional fields, relational flag). While the page renders, the
//! facts and every fetched row feed a [`usage::UsageAccumulator`], which at the
//! end of the render yields the tags to attach to the cached page and the
//! lifetime bound derived from start and end times. Writes go through
//! [`usage::TagFlusher`], which evicts the pages carrying matching tags.
#![warn(missing_docs)]

/// Statement analysis: dependency facts, table scopes, and the table registry.
pub mod analyzer;
/// Persistent caches for analysis results and the schema snapshot.
pub mod cache;
/// Feature switches loaded from JSON.
pub mod config;
/// Crate-wide error type.
pub mod error;
/// Facts JSON and markdown report generation.
pub mod output;
/// Schema DDL parsing, identifier helpers, and column reference extraction.
pub mod parser;
/// Query rewriting, planning-time tracking, and row interception.
pub mod query;
/// Per-render usage accumulation, tag synthesis, and write-side flushing.
pub mod usage;

pub use error::{Error, Result};
