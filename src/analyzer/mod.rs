/// Dependency facts produced per statement.
pub mod dependency;
/// Alias and candidate-table resolution.
pub mod scope;
/// Statement analysis with persistent caching.
pub mod statement_analyzer;
/// Content-type registry and table exclusion policy.
pub mod table_registry;

pub use dependency::DependencyFact;
pub use statement_analyzer::StatementAnalyzer;
pub use table_registry::{EnableColumns, TableDefinition, TableRegistry};
