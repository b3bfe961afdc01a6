use std::fmt::{self, Write};

use serde::Serialize;

use crate::analyzer::DependencyFact;

/// Outcome of analyzing one statement of a query file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementOutcome {
    /// Statement text as analyzed.
    pub sql: String,
    /// SQL that would be executed after rewriting, when rewriting was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_sql: Option<String>,
    /// Dependency fact, when the statement could be classified.
    pub fact: Option<DependencyFact>,
    /// Why the statement could not be classified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatementOutcome {
    /// Whether analysis of this statement failed.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything a CLI run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    /// Per-statement outcomes, in file order.
    pub statements: Vec<StatementOutcome>,
    /// Tags the page would be annotated with.
    pub tags: Vec<String>,
    /// Page cache lifetime in seconds, when bounded.
    pub cache_timeout: Option<i64>,
}

impl AnalysisReport {
    /// Number of statements whose analysis failed.
    pub fn failure_count(&self) -> usize {
        self.statements.iter().filter(|s| s.is_failure()).count()
    }

    /// Pretty-printed JSON form, written as `<name>_facts.json`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the markdown report: one table row per statement, then the tags.
pub fn build_report(report: &AnalysisReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &AnalysisReport) -> fmt::Result {
    writeln!(out, "# cache-autotag Analysis Report")?;
    writeln!(out)?;

    writeln!(out, "## Statements")?;
    writeln!(out)?;
    writeln!(out, "| # | Main table | Relational | Conditional fields |")?;
    writeln!(out, "|---|------------|------------|--------------------|")?;
    for (index, outcome) in report.statements.iter().enumerate() {
        let number = index + 1;
        match (&outcome.fact, &outcome.error) {
            (_, Some(error)) => {
                writeln!(out, "| {number} | error | | {} |", escape_cell(error))?;
            }
            (Some(fact), None) => {
                let relational = if fact.is_relational() { "yes" } else { "no" };
                let fields = if fact.conditional_fields().is_empty() {
                    "none".to_string()
                } else {
                    fact.conditional_fields()
                        .iter()
                        .map(|f| format!("`{f}`"))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                writeln!(
                    out,
                    "| {number} | `{}` | {relational} | {fields} |",
                    fact.main_table()
                )?;
            }
            (None, None) => writeln!(out, "| {number} | untracked | | |")?,
        }
    }

    writeln!(out)?;
    writeln!(out, "## Cache Tags")?;
    writeln!(out)?;
    if report.tags.is_empty() {
        writeln!(out, "No tags.")?;
    }
    for tag in &report.tags {
        writeln!(out, "- `{tag}`")?;
    }

    writeln!(out)?;
    writeln!(out, "## Cache Lifetime")?;
    writeln!(out)?;
    match report.cache_timeout {
        Some(seconds) => writeln!(out, "{seconds} seconds")?,
        None => writeln!(out, "Unbounded")?,
    }

    let failures = report.failure_count();
    if failures > 0 {
        writeln!(out)?;
        writeln!(out, "## Failures")?;
        writeln!(out)?;
        for (index, outcome) in report.statements.iter().enumerate() {
            if outcome.is_failure() {
                writeln!(out, "- Statement {}: `{}`", index + 1, outcome.sql)?;
            }
        }
    }
    Ok(())
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
