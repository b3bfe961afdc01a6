use std::path::{Component, Path};

use crate::error::{Error, Result};
use crate::output::report::{self, AnalysisReport};

/// Write `<name>_facts.json` and `<name>_report.md` into `output_dir`.
pub fn write_output(output_dir: &Path, name: &str, analysis: &AnalysisReport) -> Result<()> {
    validate_output_name(name)?;

    std::fs::create_dir_all(output_dir)
        .map_err(|e| Error::Output(format!("Failed to create output directory: {e}")))?;

    let facts_path = output_dir.join(format!("{name}_facts.json"));
    let facts = analysis
        .to_json()
        .map_err(|e| Error::Output(format!("Failed to serialize facts: {e}")))?;
    std::fs::write(&facts_path, facts)
        .map_err(|e| Error::Output(format!("Failed to write {}: {e}", facts_path.display())))?;

    let report_path = output_dir.join(format!("{name}_report.md"));
    std::fs::write(&report_path, report::build_report(analysis))
        .map_err(|e| Error::Output(format!("Failed to write {}: {e}", report_path.display())))?;

    Ok(())
}

fn validate_output_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Output("Output name must not be empty".to_string()));
    }
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        return Err(Error::Output(format!(
            "Invalid output name '{name}': absolute paths are not allowed"
        )));
    }
    if candidate.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    }) {
        return Err(Error::Output(format!(
            "Invalid output name '{name}': traversal segments are not allowed"
        )));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(Error::Output(format!(
            "Invalid output name '{name}': path separators are not allowed"
        )));
    }
    Ok(())
}
