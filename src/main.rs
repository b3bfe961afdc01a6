//! CLI entry point for `cache-autotag`.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use cache_autotag::analyzer::{StatementAnalyzer, TableRegistry};
use cache_autotag::cache::{AnalysisCache, FileCache, MemoryCache};
use cache_autotag::config::Configuration;
use cache_autotag::output::formatter;
use cache_autotag::output::{AnalysisReport, StatementOutcome};
use cache_autotag::parser::schema::SchemaSnapshot;
use cache_autotag::parser::sql_parser;
use cache_autotag::query::tracker::register_fact;
use cache_autotag::query::{QueryPlan, Tracker};
use cache_autotag::usage::{CollectedPageCache, UsageAccumulator};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cache-autotag",
    about = "Derive page cache invalidation tags from the SQL a page render runs"
)]
struct Cli {
    /// Schema DDL files (CREATE TABLE statements)
    #[arg(required_unless_present = "schema_dir")]
    input: Vec<PathBuf>,

    /// Read every .sql file in directory as schema DDL
    #[arg(long)]
    schema_dir: Option<PathBuf>,

    /// JSON table registry (content types and their restriction columns)
    #[arg(long)]
    table_registry: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// File with the `;`-terminated statements to analyze
    #[arg(long)]
    queries: PathBuf,

    /// Persist analysis results in this directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Output directory
    #[arg(long, default_value = "cache-autotag-output")]
    output_dir: PathBuf,

    /// Render time as a unix timestamp (defaults to the current time)
    #[arg(long)]
    now: Option<i64>,

    /// Apply the registry's visibility restrictions before analyzing
    #[arg(long)]
    rewrite: bool,

    /// Print verbose diagnostics
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut ddl_files = cli.input.clone();
    if let Some(dir) = &cli.schema_dir {
        match std::fs::read_dir(dir) {
            Ok(entries) => {
                let mut found: Vec<PathBuf> = entries
                    .flatten()
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().is_some_and(|e| e == "sql"))
                    .collect();
                found.sort();
                ddl_files.extend(found);
            }
            Err(e) => {
                eprintln!("Error reading schema directory: {e}");
                process::exit(2);
            }
        }
    }

    if ddl_files.is_empty() {
        eprintln!("No schema SQL files provided");
        process::exit(2);
    }

    let mut ddl = String::new();
    for path in &ddl_files {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                ddl.push_str(&content);
                ddl.push('\n');
            }
            Err(e) => {
                eprintln!("Error reading {}: {e}", path.display());
                process::exit(2);
            }
        }
    }

    let cache: Arc<dyn AnalysisCache> = match &cli.cache_dir {
        Some(dir) => match FileCache::open(dir) {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                eprintln!("Error opening cache directory: {e}");
                process::exit(2);
            }
        },
        None => Arc::new(MemoryCache::new()),
    };

    let schema = match SchemaSnapshot::load_or_parse(cache.as_ref(), &ddl) {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("Schema parse error: {e}");
            process::exit(2);
        }
    };
    info!(tables = schema.len(), "schema loaded");

    let mut registry = TableRegistry::new();
    if let Some(path) = &cli.table_registry {
        if let Err(e) = registry.load_from_path(path) {
            eprintln!("Error loading table registry: {e}");
            process::exit(2);
        }
    }

    let config = match &cli.config {
        Some(path) => match Configuration::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration: {e}");
                process::exit(2);
            }
        },
        None => Configuration::default(),
    };

    let queries = match std::fs::read_to_string(&cli.queries) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.queries.display());
            process::exit(2);
        }
    };
    let statements = match sql_parser::parse_statements(&queries) {
        Ok(statements) => statements,
        Err(e) => {
            eprintln!("Query parse error: {e}");
            process::exit(2);
        }
    };

    let now = cli.now.unwrap_or_else(current_unix_time);
    let analyzer = StatementAnalyzer::new(schema, cache);
    let usage = UsageAccumulator::new(Arc::new(registry), config, now);

    let outcomes: Vec<StatementOutcome> = statements
        .iter()
        .map(|statement| {
            let sql = statement.to_string();
            debug!(sql = %sql, "analyzing statement");
            if cli.rewrite {
                rewrite_and_analyze(&analyzer, &usage, sql)
            } else {
                analyze(&analyzer, &usage, sql)
            }
        })
        .collect();

    let mut page_cache = CollectedPageCache::default();
    let tags = usage.finish(&mut page_cache);
    let analysis = AnalysisReport {
        statements: outcomes,
        tags,
        cache_timeout: usage.cache_timeout(),
    };

    let name = cli
        .queries
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    if let Err(e) = formatter::write_output(&cli.output_dir, name, &analysis) {
        eprintln!("Error writing output: {e}");
        process::exit(2);
    }

    let failures = analysis.failure_count();
    if cli.verbose {
        eprintln!(
            "Analyzed {} statements, {} failed, {} tags",
            analysis.statements.len(),
            failures,
            analysis.tags.len()
        );
    }
    if failures > 0 {
        process::exit(1);
    }
}

fn analyze(
    analyzer: &StatementAnalyzer,
    usage: &UsageAccumulator,
    sql: String,
) -> StatementOutcome {
    match analyzer.analyze(&sql) {
        Ok(fact) => {
            if let Some(fact) = &fact {
                register_fact(fact, usage);
            }
            StatementOutcome {
                sql,
                executed_sql: None,
                fact,
                error: None,
            }
        }
        Err(e) => StatementOutcome {
            sql,
            executed_sql: None,
            fact: None,
            error: Some(e.to_string()),
        },
    }
}

fn rewrite_and_analyze(
    analyzer: &StatementAnalyzer,
    usage: &UsageAccumulator,
    sql: String,
) -> StatementOutcome {
    let prepared = QueryPlan::parse(sql.as_str())
        .and_then(|plan| Tracker::new(analyzer).prepare(&plan, usage));
    match prepared {
        Ok(prepared) => StatementOutcome {
            sql: prepared.analyzed_sql,
            executed_sql: Some(prepared.sql),
            fact: prepared.fact,
            error: prepared.analysis_error,
        },
        Err(e) => StatementOutcome {
            sql,
            executed_sql: None,
            fact: None,
            error: Some(e.to_string()),
        },
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "cache_autotag=debug"
    } else {
        "cache_autotag=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn current_unix_time() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
