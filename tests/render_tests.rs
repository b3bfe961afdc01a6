mod support;

use cache_autotag::config::Configuration;
use cache_autotag::query::{QueryPlan, Tracker, Value, VecRowSource};
use cache_autotag::usage::{CollectedPageCache, PageCacheSink};
use cache_autotag::Error;

use support::{fixture_analyzer, fixture_usage};

const NOW: i64 = 1_710_315_540;

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[test]
fn news_listing_render_collects_rows_lists_fields_and_lifetime() {
    let analyzer = fixture_analyzer();
    let usage = fixture_usage(Configuration::default(), NOW);
    let tracker = Tracker::new(&analyzer);

    let plan = QueryPlan::parse(
        "SELECT * FROM `tx_news_domain_model_news` WHERE `pid` = :pid ORDER BY `publish_date` DESC",
    )
    .unwrap();
    let prepared = tracker.prepare(&plan, &usage).unwrap();
    assert_eq!(prepared.main_table(), Some("tx_news_domain_model_news"));
    assert_eq!(prepared.analysis_error, None);

    let source = VecRowSource::new(
        columns(&[
            "uid",
            "title",
            "starttime__tx_news_domain_model_news",
            "endtime__tx_news_domain_model_news",
        ]),
        vec![
            vec![Value::Int(10), Value::from("published"), Value::Int(0), Value::Int(0)],
            vec![Value::Int(11), Value::from("scheduled"), Value::Int(NOW + 3_600), Value::Int(0)],
            vec![Value::Int(12), Value::from("expiring"), Value::Int(0), Value::Int(NOW + 600)],
        ],
    );
    let rows = prepared
        .intercept(source, &usage)
        .fetch_all_associative()
        .unwrap();
    assert_eq!(
        rows.iter().map(|row| row.uid()).collect::<Vec<_>>(),
        vec![10, 12]
    );
    assert!(rows.iter().all(|row| !row.contains("starttime__tx_news_domain_model_news")));

    let mut page = CollectedPageCache::default();
    let tags = usage.finish(&mut page);
    assert_eq!(
        &tags[..4],
        [
            "tx_news_domain_model_news_10",
            "tx_news_domain_model_news_11",
            "tx_news_domain_model_news_12",
            "tx_news_domain_model_news--new",
        ]
    );
    assert!(tags.contains(&"tx_news_domain_model_news-pid".to_string()));
    assert!(tags.contains(&"tx_news_domain_model_news-publish_date".to_string()));
    assert!(tags.contains(&"tx_news_domain_model_news-hidden".to_string()));
    assert_eq!(page.tags, tags);
    assert_eq!(page.timeout, Some(600));
}

#[test]
fn page_rows_use_the_page_id_prefix_and_content_is_never_tagged() {
    let analyzer = fixture_analyzer();
    let usage = fixture_usage(Configuration::default(), NOW);
    let tracker = Tracker::new(&analyzer);

    let pages = tracker
        .prepare(&QueryPlan::parse("SELECT * FROM pages WHERE uid = 1").unwrap(), &usage)
        .unwrap();
    let source = VecRowSource::new(
        columns(&["uid", "title", "starttime__pages", "endtime__pages"]),
        vec![vec![Value::Int(1), Value::from("Home"), Value::Int(0), Value::Int(0)]],
    );
    assert_eq!(pages.intercept(source, &usage).row_count().unwrap(), 1);

    let content = tracker
        .prepare(
            &QueryPlan::parse("SELECT * FROM tt_content WHERE pid = 1 ORDER BY sorting").unwrap(),
            &usage,
        )
        .unwrap();
    assert_eq!(content.main_table(), Some("tt_content"));
    let source = VecRowSource::new(
        columns(&["uid", "bodytext"]),
        vec![vec![Value::Int(7), Value::from("Hello")]],
    );
    assert_eq!(content.intercept(source, &usage).fetch_all_numeric().unwrap().len(), 1);

    let tags = usage.synthesize_tags();
    assert_eq!(tags[0], "pageId_1");
    assert!(tags.iter().all(|tag| !tag.starts_with("tt_content")));
    assert!(tags.contains(&"pages-starttime".to_string()));
    assert!(!tags.contains(&"pages-uid".to_string()));
}

#[test]
fn default_cache_timeout_clamps_the_lifetime() {
    let config = Configuration {
        default_cache_timeout: Some(300),
        ..Configuration::default()
    };
    let usage = fixture_usage(config, NOW);
    usage.bound_lifetime(NOW + 86_400);
    assert_eq!(usage.cache_timeout(), Some(300));

    usage.bound_lifetime(NOW + 60);
    assert_eq!(usage.cache_timeout(), Some(60));

    // Past and zero timestamps never narrow.
    usage.bound_lifetime(NOW - 1);
    usage.bound_lifetime(0);
    assert_eq!(usage.cache_timeout(), Some(60));
}

#[test]
fn metrics_only_renders_leave_the_page_untouched() {
    let config = Configuration {
        metrics_only: true,
        ..Configuration::default()
    };
    let usage = fixture_usage(config, NOW);
    usage.record_row_usage("tx_news_domain_model_news", 5);
    usage.bound_lifetime(NOW + 30);

    let mut page = CollectedPageCache::default();
    let tags = usage.finish(&mut page);
    assert_eq!(tags, vec!["tx_news_domain_model_news_5"]);
    assert_eq!(page, CollectedPageCache::default());
}

#[test]
fn disabled_switches_suppress_their_tag_kinds() {
    let config = Configuration {
        flush_cache_on_uid: false,
        flush_cache_on_conditional_field: false,
        ..Configuration::default()
    };
    let usage = fixture_usage(config, NOW);
    usage.record_row_usage("tx_news_domain_model_news", 5);
    usage.record_list_usage("tx_news_domain_model_news");
    usage.record_field_usage("tx_news_domain_model_news", "pid");
    assert_eq!(usage.synthesize_tags(), vec!["tx_news_domain_model_news--new"]);
}

#[test]
fn rows_missing_a_helper_column_fail_the_fetch() {
    let analyzer = fixture_analyzer();
    let usage = fixture_usage(Configuration::default(), NOW);
    let prepared = Tracker::new(&analyzer)
        .prepare(&QueryPlan::parse("SELECT * FROM pages").unwrap(), &usage)
        .unwrap();

    let source = VecRowSource::new(
        columns(&["uid", "starttime__pages"]),
        vec![vec![Value::Int(1), Value::Int(0)]],
    );
    let err = prepared
        .intercept(source, &usage)
        .fetch_row()
        .expect_err("endtime helper is missing");
    assert!(matches!(
        err,
        Error::MissingExpectedColumn { ref column } if column == "endtime__pages"
    ));
}

#[test]
fn collected_page_cache_merges_repeated_tags() {
    let mut page = CollectedPageCache::default();
    page.add_cache_tags(&["a".to_string(), "b".to_string()]);
    page.add_cache_tags(&["b".to_string(), "c".to_string()]);
    page.set_cache_timeout(10);
    assert_eq!(page.tags, vec!["a", "b", "c"]);
    assert_eq!(page.timeout, Some(10));
}
