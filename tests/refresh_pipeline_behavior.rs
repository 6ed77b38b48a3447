//! Behavior-driven tests for full refresh cycles: fetch, normalize, store,
//! and fallback to stored state when the upstream misbehaves.

use std::sync::Arc;
use std::time::Duration;

use almanac_core::{
    AlmanacConfig, ConfigError, CoreError, EstatAdapter, FetchClient, FetchError, HttpError,
    HttpResponse, JmaAdapter, ParseError, Pipeline, ProviderPolicy, RefreshOutcome, RetryConfig,
    ScriptedHttpClient, StatsSelector, Warehouse,
};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

fn test_policy(base: ProviderPolicy) -> ProviderPolicy {
    ProviderPolicy {
        retry: RetryConfig::fixed(Duration::from_millis(1), 3),
        ..base.unthrottled()
    }
}

struct Harness {
    _home: TempDir,
    http: Arc<ScriptedHttpClient>,
    pipeline: Pipeline,
}

fn harness(with_app_id: bool) -> Harness {
    let home = tempdir().expect("tempdir");
    let http = Arc::new(ScriptedHttpClient::default());
    let warehouse = Warehouse::open_in_memory().expect("warehouse");

    let jma = JmaAdapter::new(
        FetchClient::new(http.clone(), &test_policy(ProviderPolicy::jma_default())),
        "https://www.jma.test/bosai",
    );
    let estat = with_app_id.then(|| {
        EstatAdapter::new(
            FetchClient::new(http.clone(), &test_policy(ProviderPolicy::estat_default())),
            "https://api.e-stat.test",
            "test-app-id",
        )
    });

    let pipeline = Pipeline::new(
        warehouse,
        jma,
        estat,
        home.path().join("raw").join("estat_raw.json"),
    );
    Harness {
        _home: home,
        http,
        pipeline,
    }
}

fn forecast_body(published_at: &str, days: &[(&str, &str)]) -> String {
    let periods: Vec<String> = days
        .iter()
        .map(|(date, _)| format!("{date}T00:00:00+09:00"))
        .collect();
    let weathers: Vec<&str> = days.iter().map(|(_, weather)| *weather).collect();
    json!([{
        "publishingOffice": "気象庁",
        "reportDatetime": published_at,
        "timeSeries": [
            {
                "timeDefines": periods,
                "areas": [{"area": {"name": "東京地方"}, "weathers": weathers}]
            },
            {
                "timeDefines": periods,
                "areas": [{"area": {"name": "東京"}, "tempsMin": ["", "12"], "tempsMax": ["21", "19"]}]
            }
        ]
    }])
    .to_string()
}

fn stats_body(values: Value) -> String {
    json!({
        "GET_STATS_DATA": {
            "RESULT": {"STATUS": 0, "ERROR_MSG": "正常に終了しました。"},
            "STATISTICAL_DATA": {"DATA_INF": {"VALUE": values}}
        }
    })
    .to_string()
}

// =============================================================================
// Forecast Refresh
// =============================================================================

#[tokio::test]
async fn when_forecast_refresh_succeeds_fresh_rows_are_stored_and_returned() {
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(false);
    http.push(Ok(HttpResponse::ok_json(forecast_body(
        "2026-10-19T05:00:00+09:00",
        &[("2026-10-19", "晴れ"), ("2026-10-20", "くもり")],
    ))));

    let outcome = pipeline.refresh_forecast("130000", "東京都").await;

    let snapshot = match outcome {
        RefreshOutcome::Fresh(snapshot) => snapshot,
        other => panic!("expected fresh outcome, got {other:?}"),
    };
    assert_eq!(snapshot.published_at, "2026-10-19T05:00:00+09:00");
    assert_eq!(snapshot.rows.len(), 2);
    assert_eq!(snapshot.rows[1].numeric_low, Some(12.0));
    assert_eq!(snapshot.rows[0].numeric_high, Some(21.0));
    assert_eq!(
        http.recorded_requests()[0].url,
        "https://www.jma.test/bosai/forecast/data/forecast/130000.json"
    );
}

#[tokio::test]
async fn when_forecast_is_refreshed_twice_with_same_publication_nothing_duplicates() {
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(false);
    let body = forecast_body("2026-10-19T05:00:00+09:00", &[("2026-10-19", "晴れ")]);
    http.push(Ok(HttpResponse::ok_json(body.clone())));
    http.push(Ok(HttpResponse::ok_json(body)));

    let first = pipeline.refresh_forecast("130000", "東京都").await;
    let second = pipeline.refresh_forecast("130000", "東京都").await;

    assert!(first.is_fresh() && second.is_fresh());
    assert_eq!(first.data(), second.data());
    assert_eq!(
        pipeline.warehouse().known_periods("130000").expect("periods"),
        vec!["2026-10-19"]
    );
}

#[tokio::test]
async fn when_upstream_fails_after_a_success_stored_snapshot_is_served() {
    // Given: One successful refresh
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(false);
    http.push(Ok(HttpResponse::ok_json(forecast_body(
        "2026-10-19T05:00:00+09:00",
        &[("2026-10-19", "晴れ")],
    ))));
    let fresh = pipeline.refresh_forecast("130000", "東京都").await;
    assert!(fresh.is_fresh());

    // When: Every following attempt fails at the transport level
    for _ in 0..3 {
        http.push(Err(HttpError::connect("network unreachable")));
    }
    let outcome = pipeline.refresh_forecast("130000", "東京都").await;

    // Then: The stored snapshot comes back with the failure attached
    match outcome {
        RefreshOutcome::Fallback { stored, error } => {
            assert_eq!(Some(&stored), fresh.data());
            assert!(matches!(
                error,
                CoreError::Fetch(FetchError::Transport { attempts: 3, .. })
            ));
        }
        other => panic!("expected fallback, got {other:?}"),
    }
    assert_eq!(http.call_count(), 4);
}

#[tokio::test]
async fn when_upstream_returns_garbage_stored_data_is_left_untouched() {
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(false);
    http.push(Ok(HttpResponse::ok_json(forecast_body(
        "2026-10-19T05:00:00+09:00",
        &[("2026-10-19", "晴れ"), ("2026-10-20", "雨")],
    ))));
    http.push(Ok(HttpResponse::ok_json(r#"[{"timeSeries": []}]"#)));

    pipeline.refresh_forecast("130000", "東京都").await;
    let outcome = pipeline.refresh_forecast("130000", "東京都").await;

    assert!(matches!(outcome.error(), Some(CoreError::Parse(_))));
    assert_eq!(outcome.data().map(|snapshot| snapshot.rows.len()), Some(2));
    assert_eq!(pipeline.warehouse().latest_snapshot("130000").expect("rows").len(), 2);
}

#[tokio::test]
async fn when_nothing_was_ever_stored_a_failure_is_reported_as_failed() {
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(false);
    http.push(Ok(HttpResponse::with_status(404, "not found")));

    let outcome = pipeline.refresh_forecast("999999", "不明").await;

    assert!(matches!(
        outcome,
        RefreshOutcome::Failed(CoreError::Fetch(FetchError::Transport {
            status: Some(404),
            ..
        }))
    ));
}

#[tokio::test]
async fn when_a_newer_publication_drops_a_day_the_day_remains_pinnable() {
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(false);
    http.push(Ok(HttpResponse::ok_json(forecast_body(
        "2026-10-19T05:00:00+09:00",
        &[("2026-10-19", "晴れ"), ("2026-10-20", "くもり")],
    ))));
    http.push(Ok(HttpResponse::ok_json(forecast_body(
        "2026-10-20T05:00:00+09:00",
        &[("2026-10-20", "雨"), ("2026-10-21", "晴れ")],
    ))));

    pipeline.refresh_forecast("130000", "東京都").await;
    let latest = pipeline
        .refresh_forecast("130000", "東京都")
        .await
        .into_result()
        .expect("fresh");

    assert_eq!(latest.published_at, "2026-10-20T05:00:00+09:00");
    let state = pipeline.warehouse().latest_state();
    let dropped = state
        .for_period("130000", "2026-10-19")
        .expect("query")
        .expect("row");
    assert_eq!(dropped.category_a.as_deref(), Some("晴れ"));
    let overlapping = state
        .for_period("130000", "2026-10-20")
        .expect("query")
        .expect("row");
    assert_eq!(overlapping.category_a.as_deref(), Some("雨"));
}

#[tokio::test]
async fn when_area_list_is_requested_offices_are_parsed() {
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(false);
    http.push(Ok(HttpResponse::ok_json(
        json!({"offices": {"130000": {"name": "東京都"}, "016000": {"name": "石狩・空知・後志地方"}}})
            .to_string(),
    )));

    let offices = pipeline.area_offices().await.expect("offices");

    assert_eq!(offices.len(), 2);
    assert_eq!(offices[0].code, "016000");
    assert_eq!(
        http.recorded_requests()[0].url,
        "https://www.jma.test/bosai/common/const/area.json"
    );
}

// =============================================================================
// Statistics Refresh
// =============================================================================

#[tokio::test]
async fn when_statistics_are_refreshed_a_generation_is_appended_and_audited() {
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(true);
    http.push(Ok(HttpResponse::ok_json(stats_body(json!([
        {"@area": "13000", "@time": "2024000000", "$": "100"},
        {"@area": "27000", "@time": "2024000000", "$": "x"}
    ])))));

    let outcome = pipeline
        .refresh_statistics(&StatsSelector::Id("0003411595".to_string()))
        .await;

    let generation = outcome.into_result().expect("fresh");
    assert_eq!(generation.rows.len(), 2);
    assert_eq!(generation.rows[0].value, Some(100.0));
    assert_eq!(generation.rows[1].value, None);
    assert!(generation
        .rows
        .iter()
        .all(|row| row.ingested_at.as_deref() == Some(generation.ingested_at.as_str())));

    let audit = std::fs::read_to_string(pipeline.raw_json_path()).expect("audit file");
    let audit: Value = serde_json::from_str(&audit).expect("audit json");
    assert_eq!(
        audit["GET_STATS_DATA"]["STATISTICAL_DATA"]["DATA_INF"]["VALUE"][0]["$"],
        "100"
    );

    let request = &http.recorded_requests()[0];
    assert_eq!(request.query_value("statsDataId"), Some("0003411595"));
    assert_eq!(request.query_value("appId"), Some("test-app-id"));
}

#[tokio::test]
async fn when_statistics_are_chosen_by_keyword_the_picked_table_is_fetched() {
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(true);
    http.push(Ok(HttpResponse::ok_json(
        json!({
            "GET_STATS_LIST": {
                "RESULT": {"STATUS": 0},
                "DATALIST_INF": {"TABLE_INF": [
                    {"@id": "0003000001", "TITLE": "一つ目"},
                    {"@id": "0003000002", "TITLE": {"$": "二つ目"}}
                ]}
            }
        })
        .to_string(),
    )));
    http.push(Ok(HttpResponse::ok_json(stats_body(json!({"@time": "2023", "$": "7"})))));

    let outcome = pipeline
        .refresh_statistics(&StatsSelector::Keyword {
            keyword: "宿泊".to_string(),
            pick: 2,
        })
        .await;

    let generation = outcome.into_result().expect("fresh");
    assert_eq!(generation.series_id, "0003000002");
    let requests = http.recorded_requests();
    assert_eq!(requests[0].query_value("searchWord"), Some("宿泊"));
    assert_eq!(requests[0].query_value("limit"), Some("10"));
    assert_eq!(requests[1].query_value("statsDataId"), Some("0003000002"));
}

#[tokio::test]
async fn when_pick_is_out_of_range_nothing_is_fetched_beyond_the_search() {
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(true);
    http.push(Ok(HttpResponse::ok_json(
        json!({"GET_STATS_LIST": {"DATALIST_INF": {"TABLE_INF": [{"@id": "1"}]}}}).to_string(),
    )));

    let outcome = pipeline
        .refresh_statistics(&StatsSelector::Keyword {
            keyword: "人口".to_string(),
            pick: 0,
        })
        .await;

    assert!(matches!(
        outcome,
        RefreshOutcome::Failed(CoreError::NoMatchingTable { pick: 0, .. })
    ));
    assert_eq!(http.call_count(), 1);
}

#[tokio::test]
async fn when_app_id_is_missing_no_network_call_is_made() {
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(false);

    let outcome = pipeline
        .refresh_statistics(&StatsSelector::Id("0003411595".to_string()))
        .await;

    assert!(matches!(
        outcome,
        RefreshOutcome::Failed(CoreError::Config(ConfigError::MissingCredential {
            var: "ESTAT_APP_ID"
        }))
    ));
    assert_eq!(http.call_count(), 0);
}

#[tokio::test]
async fn when_the_audit_copy_cannot_be_written_statistics_are_still_stored() {
    // Given: The audit directory is blocked by a regular file
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(true);
    let audit_dir = pipeline.raw_json_path().parent().expect("audit dir");
    std::fs::write(audit_dir, "not a directory").expect("blocking file");
    http.push(Ok(HttpResponse::ok_json(stats_body(json!([{"@time": "2023", "$": "5"}])))));

    // When: Statistics are refreshed
    let outcome = pipeline
        .refresh_statistics(&StatsSelector::Id("0003411595".to_string()))
        .await;

    // Then: The generation is fresh and stored, no audit file exists
    let generation = outcome.into_result().expect("fresh");
    assert_eq!(generation.rows[0].value, Some(5.0));
    assert!(!pipeline.raw_json_path().exists());
    assert_eq!(
        pipeline
            .warehouse()
            .latest_observations("0003411595")
            .expect("latest")
            .len(),
        1
    );
}

#[tokio::test]
async fn when_statistics_refresh_fails_the_previous_generation_is_served() {
    let Harness {
        _home,
        http,
        pipeline,
    } = harness(true);
    http.push(Ok(HttpResponse::ok_json(stats_body(json!([{"@time": "2023", "$": "1"}])))));
    http.push(Ok(HttpResponse::ok_json(stats_body(json!([])))));

    let selector = StatsSelector::Id("0003411595".to_string());
    let first = pipeline.refresh_statistics(&selector).await;
    let second = pipeline.refresh_statistics(&selector).await;

    assert!(first.is_fresh());
    match second {
        RefreshOutcome::Fallback { stored, error } => {
            assert_eq!(Some(&stored), first.data());
            assert!(matches!(error, CoreError::Parse(ParseError::NoRows)));
        }
        other => panic!("expected fallback, got {other:?}"),
    }
    assert_eq!(
        pipeline
            .warehouse()
            .observation_generations("0003411595")
            .expect("generations")
            .len(),
        1
    );
}

#[test]
fn when_config_points_at_a_fresh_home_pipeline_opens_its_warehouse_there() {
    let home = tempdir().expect("tempdir");
    let config = AlmanacConfig::for_home(home.path());

    let pipeline =
        Pipeline::from_config(&config, Arc::new(ScriptedHttpClient::default())).expect("pipeline");

    assert_eq!(pipeline.warehouse().db_path(), Some(config.db_path.as_path()));
    assert!(config.db_path.exists());
}
