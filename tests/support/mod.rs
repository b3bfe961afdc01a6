#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use cache_autotag::analyzer::{StatementAnalyzer, TableRegistry};
use cache_autotag::cache::MemoryCache;
use cache_autotag::config::Configuration;
use cache_autotag::parser::schema::{self, SchemaSnapshot};
use cache_autotag::usage::UsageAccumulator;

pub(crate) const FIXTURE: &str = "typo3";

pub(crate) fn fixture_dir(fixture: &str) -> PathBuf {
    PathBuf::from("tests/fixtures").join(fixture)
}

pub(crate) fn fixture_path(file: &str) -> PathBuf {
    fixture_dir(FIXTURE).join(file)
}

pub(crate) fn read_fixture(file: &str) -> String {
    let path = fixture_path(file);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

pub(crate) fn load_fixture_schema() -> SchemaSnapshot {
    schema::parse_schema(&read_fixture("tables.sql")).expect("fixture DDL should parse")
}

pub(crate) fn load_fixture_registry() -> TableRegistry {
    let mut registry = TableRegistry::new();
    registry
        .load_from_json(&read_fixture("table_registry.json"))
        .expect("fixture registry should parse");
    registry
}

pub(crate) fn fixture_analyzer() -> StatementAnalyzer {
    StatementAnalyzer::new(load_fixture_schema(), Arc::new(MemoryCache::new()))
}

pub(crate) fn fixture_usage(config: Configuration, now: i64) -> UsageAccumulator {
    UsageAccumulator::new(Arc::new(load_fixture_registry()), config, now)
}

pub(crate) fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}_{nanos}"));
    std::fs::create_dir_all(&dir).expect("should create temp dir");
    dir
}

/// Run the binary against the fixture schema and registry plus `args`.
pub(crate) fn run_cli(args: &[&std::ffi::OsStr]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cache-autotag"))
        .arg(fixture_path("tables.sql"))
        .arg("--table-registry")
        .arg(fixture_path("table_registry.json"))
        .args(args)
        .output()
        .expect("should run cache-autotag binary")
}
