/// Writes the facts JSON and the report to disk.
pub mod formatter;
/// Builds the per-run analysis report.
pub mod report;

pub use report::{AnalysisReport, StatementOutcome};
