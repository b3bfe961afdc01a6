use tracing::{debug, warn};

use crate::analyzer::dependency::DependencyFact;
use crate::analyzer::StatementAnalyzer;
use crate::error::Result;
use crate::parser::names::helper_column_alias;
use crate::query::interceptor::ResultInterceptor;
use crate::query::rewrite::{access_time, HelperProjection, QueryPlan};
use crate::query::row::RowSource;
use crate::query::select_by::SelectBy;
use crate::usage::UsageAccumulator;

const STARTTIME_KIND: &str = "starttime";
const ENDTIME_KIND: &str = "endtime";

/// Execution entry point: prepares queries for tracking and wraps their
/// results.
#[derive(Debug)]
pub struct Tracker<'a> {
    analyzer: &'a StatementAnalyzer,
}

/// A query ready to run, with what is needed to intercept its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    /// SQL to execute: helper columns appended, start-time restriction lifted.
    pub sql: String,
    /// SQL that was analyzed: helper columns and every restriction.
    pub analyzed_sql: String,
    /// Dependency fact of the analyzed SQL, if it could be classified.
    pub fact: Option<DependencyFact>,
    /// Why the analyzed SQL could not be classified.
    pub analysis_error: Option<String>,
    /// Helper columns to strip from and gate the rows with.
    pub select_by: SelectBy,
}

impl PreparedQuery {
    /// Table the result rows are attributed to.
    pub fn main_table(&self) -> Option<&str> {
        self.fact.as_ref().map(DependencyFact::main_table)
    }

    /// Wrap the cursor of the executed [`PreparedQuery::sql`].
    pub fn intercept<'u, S: RowSource>(
        &self,
        source: S,
        usage: &'u UsageAccumulator,
    ) -> ResultInterceptor<'u, S> {
        ResultInterceptor::new(
            source,
            self.main_table().map(str::to_string),
            self.select_by.clone(),
            usage,
        )
    }
}

impl<'a> Tracker<'a> {
    /// Create a tracker using `analyzer` for dependency facts.
    pub fn new(analyzer: &'a StatementAnalyzer) -> Self {
        Self { analyzer }
    }

    /// Rewrite `plan`, record what the query depends on into `usage`, and
    /// return the SQL to execute.
    ///
    /// Analysis failures are logged and leave the query untracked; only a
    /// statement that cannot be rewritten at all is an error.
    pub fn prepare(&self, plan: &QueryPlan, usage: &UsageAccumulator) -> Result<PreparedQuery> {
        let registry = usage.registry();
        let mut helpers = Vec::new();
        let mut start_times = Vec::new();
        let mut end_times = Vec::new();
        let mut filter_by_start_times = Vec::new();

        for queried in &plan.tables {
            let Some(columns) = registry.enable_columns(&queried.table) else {
                continue;
            };
            if plan.restrictions.hidden {
                if let Some(hidden) = &columns.disabled {
                    usage.record_field_usage(&queried.table, hidden);
                }
            }
            if let Some(starttime) = &columns.starttime {
                let alias = helper_column_alias(STARTTIME_KIND, &queried.table);
                helpers.push(helper(&queried.alias, starttime, &alias));
                if plan.restrictions.start_time {
                    filter_by_start_times.push(alias.clone());
                    usage.record_field_usage(&queried.table, starttime);
                }
                start_times.push(alias);
            }
            if let Some(endtime) = &columns.endtime {
                let alias = helper_column_alias(ENDTIME_KIND, &queried.table);
                helpers.push(helper(&queried.alias, endtime, &alias));
                end_times.push(alias);
            }
        }

        let time = access_time(usage.now());
        let analyzed_sql = plan.render(registry, time, &helpers, true)?;
        let sql = plan.render(registry, time, &helpers, false)?;

        let (fact, analysis_error) = match self.analyzer.analyze(&analyzed_sql) {
            Ok(fact) => (fact, None),
            Err(e) => {
                warn!(
                    error = %e,
                    sql = %analyzed_sql,
                    "query analysis failed, result is untracked"
                );
                (None, Some(e.to_string()))
            }
        };
        if let Some(fact) = &fact {
            register_fact(fact, usage);
        }

        Ok(PreparedQuery {
            sql,
            analyzed_sql,
            fact,
            analysis_error,
            select_by: SelectBy::new(start_times, end_times, filter_by_start_times),
        })
    }
}

/// Record the planning-time usages of an analyzed query.
///
/// Facts whose main table is not a registered content type only attribute
/// rows; they add no list or field usages.
pub fn register_fact(fact: &DependencyFact, usage: &UsageAccumulator) {
    let table = fact.main_table();
    if !usage.registry().contains(table) {
        debug!(table, "main table is not a registered content type");
        return;
    }
    if !fact.is_relational() {
        usage.record_list_usage(table);
    }
    for (table, field) in fact.conditional_field_pairs() {
        usage.record_field_usage(table, field);
    }
}

fn helper(table_alias: &str, column: &str, name: &str) -> HelperProjection {
    HelperProjection {
        table_alias: table_alias.to_string(),
        column: column.to_string(),
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::analyzer::TableRegistry;
    use crate::cache::{AnalysisCache, MemoryCache};
    use crate::config::Configuration;
    use crate::parser::schema::SchemaSnapshot;
    use crate::query::row::{Value, VecRowSource};
    use crate::query::rewrite::{QueriedTable, Restrictions};

    const NOW: i64 = 1_000;

    fn analyzer() -> StatementAnalyzer {
        analyzer_with_cache(Arc::new(MemoryCache::new()))
    }

    fn analyzer_with_cache(cache: Arc<dyn AnalysisCache>) -> StatementAnalyzer {
        let schema: SchemaSnapshot = [
            ("pages", vec!["uid", "pid", "title", "deleted", "hidden", "starttime", "endtime"]),
            ("be_sessions", vec!["ses_id"]),
        ]
        .into_iter()
        .collect();
        StatementAnalyzer::new(schema, cache)
    }

    fn usage() -> UsageAccumulator {
        usage_at(NOW)
    }

    fn usage_at(now: i64) -> UsageAccumulator {
        let mut registry = TableRegistry::new();
        registry
            .load_from_json(
                r#"{"pages": {"delete": "deleted", "enable_columns": {"disabled": "hidden", "starttime": "starttime", "endtime": "endtime"}}}"#,
            )
            .unwrap();
        UsageAccumulator::new(Arc::new(registry), Configuration::default(), now)
    }

    #[test]
    fn prepare_records_restriction_fields_and_lifts_the_start_time_predicate() {
        let analyzer = analyzer();
        let usage = usage();
        let plan = QueryPlan::parse("SELECT * FROM `pages` WHERE `pid` = :pid").unwrap();

        let prepared = Tracker::new(&analyzer).prepare(&plan, &usage).unwrap();
        assert_eq!(prepared.main_table(), Some("pages"));
        assert!(prepared.analyzed_sql.contains("`pages`.`starttime` <= 960"));
        assert!(!prepared.sql.contains("`pages`.`starttime` <="));
        assert!(prepared.sql.contains("`pages`.`endtime` > 960"));
        assert!(prepared.sql.contains("AS `starttime__pages`"));
        assert_eq!(prepared.select_by.filter_by_start_times(), ["starttime__pages"]);
        assert_eq!(
            usage.synthesize_tags(),
            vec![
                "pages--new",
                "pages-hidden",
                "pages-starttime",
                "pages-deleted",
                "pages-endtime",
                "pages-pid",
            ]
        );
    }

    #[test]
    fn renders_within_one_minute_share_the_analysis_cache_entry() {
        let cache = Arc::new(MemoryCache::new());
        let analyzer = analyzer_with_cache(cache.clone());
        let plan = QueryPlan::parse("SELECT * FROM `pages` WHERE `pid` = :pid").unwrap();

        let first = Tracker::new(&analyzer).prepare(&plan, &usage_at(1_200)).unwrap();
        let second = Tracker::new(&analyzer).prepare(&plan, &usage_at(1_201)).unwrap();
        assert_eq!(first.analyzed_sql, second.analyzed_sql);
        assert_eq!(cache.len(), 1);

        Tracker::new(&analyzer).prepare(&plan, &usage_at(1_260)).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn intercepted_rows_are_attributed_to_the_main_table() {
        let analyzer = analyzer();
        let usage = usage();
        let plan = QueryPlan::parse("SELECT * FROM `pages` WHERE `uid` = :uid").unwrap();
        let prepared = Tracker::new(&analyzer).prepare(&plan, &usage).unwrap();

        let source = VecRowSource::new(
            ["uid", "title", "starttime__pages", "endtime__pages"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            vec![
                vec![Value::Int(4), Value::from("now"), Value::Int(0), Value::Int(0)],
                vec![Value::Int(5), Value::from("later"), Value::Int(NOW + 60), Value::Int(0)],
            ],
        );
        let rows = prepared
            .intercept(source, &usage)
            .fetch_all_associative()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(usage.cache_timeout(), Some(60));
        assert_eq!(&usage.synthesize_tags()[..2], ["pageId_4", "pageId_5"]);
        assert!(!usage.synthesize_tags().contains(&"pages--new".to_string()));
    }

    #[test]
    fn disabled_start_time_restriction_does_not_gate_rows() {
        let analyzer = analyzer();
        let usage = usage();
        let plan = QueryPlan::new("SELECT * FROM pages", vec![QueriedTable::new("pages", "pages")])
            .with_restrictions(Restrictions {
                start_time: false,
                hidden: false,
                ..Restrictions::all()
            });

        let prepared = Tracker::new(&analyzer).prepare(&plan, &usage).unwrap();
        assert!(prepared.select_by.filter_by_start_times().is_empty());
        assert_eq!(prepared.select_by.start_times(), ["starttime__pages"]);
        assert!(!usage.synthesize_tags().contains(&"pages-hidden".to_string()));
    }

    #[test]
    fn analysis_failure_leaves_the_query_untracked() {
        let analyzer = analyzer();
        let usage = usage();
        let plan =
            QueryPlan::parse("SELECT * FROM pages WHERE pid IN (SELECT uid FROM pages)").unwrap();

        let prepared = Tracker::new(&analyzer).prepare(&plan, &usage).unwrap();
        assert_eq!(prepared.fact, None);
        assert_eq!(prepared.main_table(), None);
        assert!(prepared
            .analysis_error
            .as_deref()
            .is_some_and(|e| e.contains("subquery")));
        assert!(prepared.sql.contains("AS `endtime__pages`"));
        assert!(usage.synthesize_tags().contains(&"pages-hidden".to_string()));
    }

    #[test]
    fn unregistered_main_tables_add_no_usages() {
        let usage = usage();
        let fact = DependencyFact::new("be_sessions", ["be_sessions.ses_id".to_string()], false);
        register_fact(&fact, &usage);
        assert!(usage.synthesize_tags().is_empty());
    }
}
