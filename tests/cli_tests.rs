mod support;

use std::ffi::OsStr;

use support::{fixture_path, run_cli, unique_temp_dir};

fn read(path: &std::path::Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

#[test]
fn cli_writes_facts_and_report_for_the_fixture_queries() {
    let temp = unique_temp_dir("cache_autotag_cli_ok");
    let output_dir = temp.join("out");
    let queries = fixture_path("queries.sql");
    let config = fixture_path("config.json");

    let output = run_cli(&[
        OsStr::new("--queries"),
        queries.as_os_str(),
        OsStr::new("--config"),
        config.as_os_str(),
        OsStr::new("--now"),
        OsStr::new("1000"),
        OsStr::new("--output-dir"),
        output_dir.as_os_str(),
    ]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let facts: serde_json::Value =
        serde_json::from_str(&read(&output_dir.join("queries_facts.json")))
            .expect("facts should be JSON");
    let statements = facts["statements"].as_array().expect("statements array");
    assert_eq!(statements.len(), 5);
    assert_eq!(statements[0]["fact"]["main_table"], "pages");
    assert_eq!(statements[0]["fact"]["is_relational"], true);
    assert_eq!(statements[2]["fact"]["is_relational"], true);
    assert!(statements[4]["fact"].is_null());
    assert_eq!(
        facts["tags"],
        serde_json::json!([
            "tx_news_domain_model_news--new",
            "tx_news_domain_model_news-hidden",
            "tx_news_domain_model_news-pid",
            "tx_news_domain_model_news-publish_date",
        ])
    );
    assert!(facts["cache_timeout"].is_null());

    let report = read(&output_dir.join("queries_report.md"));
    assert!(report.contains("# cache-autotag Analysis Report"));
    assert!(report.contains("| 1 | `pages` | yes | `pages.uid` |"));
    assert!(report.contains("| 5 | untracked | | |"));
    assert!(report.contains("- `tx_news_domain_model_news--new`"));
    assert!(report.contains("Unbounded"));
}

#[test]
fn cli_exits_one_when_a_statement_cannot_be_analyzed() {
    let temp = unique_temp_dir("cache_autotag_cli_failure");
    let queries = temp.join("mixed.sql");
    std::fs::write(
        &queries,
        "SELECT * FROM pages WHERE doktype = 1;\nDELETE FROM pages WHERE uid = 3;\n",
    )
    .expect("should write queries");
    let output_dir = temp.join("out");

    let output = run_cli(&[
        OsStr::new("--queries"),
        queries.as_os_str(),
        OsStr::new("--output-dir"),
        output_dir.as_os_str(),
    ]);
    assert_eq!(output.status.code(), Some(1), "{output:?}");

    let report = read(&output_dir.join("mixed_report.md"));
    assert!(report.contains("| 1 | `pages` | no | `pages.doktype` |"));
    assert!(report.contains("| 2 | error | | unsupported statement"));
    assert!(report.contains("## Failures"));
    assert!(report.contains("- `pages--new`"));
}

#[test]
fn cli_rewrite_mode_records_restriction_fields() {
    let temp = unique_temp_dir("cache_autotag_cli_rewrite");
    let queries = temp.join("news.sql");
    std::fs::write(&queries, "SELECT * FROM tx_news_domain_model_news WHERE pid = 4;\n")
        .expect("should write queries");
    let output_dir = temp.join("out");

    let output = run_cli(&[
        OsStr::new("--queries"),
        queries.as_os_str(),
        OsStr::new("--rewrite"),
        OsStr::new("--now"),
        OsStr::new("1000"),
        OsStr::new("--output-dir"),
        output_dir.as_os_str(),
    ]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let facts: serde_json::Value =
        serde_json::from_str(&read(&output_dir.join("news_facts.json"))).expect("facts JSON");
    let statement = &facts["statements"][0];
    let executed = statement["executed_sql"].as_str().expect("executed SQL");
    assert!(executed.contains("AS `starttime__tx_news_domain_model_news`"), "{executed}");
    assert!(!executed.contains("`starttime` <="), "{executed}");
    assert!(statement["sql"]
        .as_str()
        .is_some_and(|sql| sql.contains("`starttime` <= 960")));

    let tags: Vec<&str> = facts["tags"]
        .as_array()
        .expect("tags array")
        .iter()
        .filter_map(|tag| tag.as_str())
        .collect();
    assert!(tags.contains(&"tx_news_domain_model_news-deleted"));
    assert!(tags.contains(&"tx_news_domain_model_news-starttime"));
    assert!(tags.contains(&"tx_news_domain_model_news-endtime"));
}

#[test]
fn cli_config_can_switch_off_tag_kinds() {
    let temp = unique_temp_dir("cache_autotag_cli_config");
    let config = temp.join("config.json");
    std::fs::write(&config, r#"{"flush_cache_on_conditional_field": false}"#)
        .expect("should write config");
    let output_dir = temp.join("out");
    let queries = fixture_path("queries.sql");

    let output = run_cli(&[
        OsStr::new("--queries"),
        queries.as_os_str(),
        OsStr::new("--config"),
        config.as_os_str(),
        OsStr::new("--output-dir"),
        output_dir.as_os_str(),
    ]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let facts: serde_json::Value =
        serde_json::from_str(&read(&output_dir.join("queries_facts.json"))).expect("facts JSON");
    assert_eq!(facts["tags"], serde_json::json!(["tx_news_domain_model_news--new"]));
}

#[test]
fn cli_exits_two_on_unreadable_inputs() {
    let temp = unique_temp_dir("cache_autotag_cli_usage");
    let missing = temp.join("missing.sql");

    let output = run_cli(&[OsStr::new("--queries"), missing.as_os_str()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error reading"));

    let bad_config = temp.join("config.json");
    std::fs::write(&bad_config, "{not json").expect("should write config");
    let output = run_cli(&[
        OsStr::new("--queries"),
        fixture_path("queries.sql").as_os_str(),
        OsStr::new("--config"),
        bad_config.as_os_str(),
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid configuration JSON"));
}

#[test]
fn cli_reuses_a_cache_directory_between_runs() {
    let temp = unique_temp_dir("cache_autotag_cli_cache");
    let cache_dir = temp.join("cache");
    let queries = fixture_path("queries.sql");

    for run in ["first", "second"] {
        let output_dir = temp.join(run);
        let output = run_cli(&[
            OsStr::new("--queries"),
            queries.as_os_str(),
            OsStr::new("--cache-dir"),
            cache_dir.as_os_str(),
            OsStr::new("--output-dir"),
            output_dir.as_os_str(),
        ]);
        assert_eq!(output.status.code(), Some(0), "{run}: {output:?}");
    }

    let first = read(&temp.join("first").join("queries_facts.json"));
    let second = read(&temp.join("second").join("queries_facts.json"));
    assert_eq!(first, second);
    assert!(std::fs::read_dir(&cache_dir).expect("cache dir").count() > 1);
}
