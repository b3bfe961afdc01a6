/// Row-level interception of executed queries.
pub mod interceptor;
/// Restriction and helper-column rewriting of planned queries.
pub mod rewrite;
/// Result rows, values and row sources.
pub mod row;
/// Helper-column descriptors.
pub mod select_by;
/// Planning-time tracking entry point.
pub mod tracker;

pub use interceptor::ResultInterceptor;
pub use rewrite::{QueriedTable, QueryPlan, Restrictions};
pub use row::{Row, RowSource, Value, VecRowSource};
pub use select_by::{HelperColumns, SelectBy};
pub use tracker::{PreparedQuery, Tracker};
