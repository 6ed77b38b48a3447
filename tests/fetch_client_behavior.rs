//! Behavior-driven tests for the retrying fetch client.
//!
//! Time is paused so backoff and pacing waits are measured exactly
//! without slowing the suite down.

use std::sync::Arc;
use std::time::Duration;

use almanac_core::{
    ApiStatusCheck, Endpoint, FetchClient, FetchError, HttpError, HttpResponse, ProviderPolicy,
    RetryConfig, ScriptedHttpClient,
};
use tokio::time::Instant;

fn fetch_client(http: &Arc<ScriptedHttpClient>, retry: RetryConfig) -> FetchClient {
    let policy = ProviderPolicy {
        retry,
        ..ProviderPolicy::jma_default()
    };
    FetchClient::new(http.clone(), &policy)
}

fn endpoint() -> Endpoint {
    Endpoint::unchecked("https://www.jma.test/bosai/forecast/data/forecast/130000.json")
}

// =============================================================================
// Fetch Client: Retry Budget
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_every_attempt_times_out_client_gives_up_after_the_budget() {
    for budget in [1_u32, 2, 3, 5] {
        // Given: A transport that always times out
        let http = Arc::new(ScriptedHttpClient::new(
            (0..10).map(|_| Err(HttpError::timeout("operation timed out"))),
        ));
        let client = fetch_client(&http, RetryConfig::exponential(budget));

        // When: A fetch is attempted
        let error = client.fetch(&endpoint(), &[]).await.expect_err("exhausted");

        // Then: Exactly `budget` attempts were made and the last cause is kept
        assert_eq!(http.call_count(), budget as usize, "budget {budget}");
        assert_eq!(
            error,
            FetchError::Transport {
                attempts: budget,
                status: None,
                cause: "operation timed out".to_string(),
            }
        );
    }
}

#[tokio::test(start_paused = true)]
async fn when_one_attempt_fails_transiently_the_second_succeeds() {
    let http = Arc::new(ScriptedHttpClient::new([
        Ok(HttpResponse::with_status(429, "slow down")),
        Ok(HttpResponse::ok_json(r#"[{"reportDatetime": "2026-10-19T11:00:00+09:00"}]"#)),
    ]));
    let client = fetch_client(&http, RetryConfig::default());

    let started = Instant::now();
    let body = client.fetch(&endpoint(), &[]).await.expect("body");

    assert_eq!(http.call_count(), 2);
    assert_eq!(body[0]["reportDatetime"], "2026-10-19T11:00:00+09:00");
    assert_eq!(started.elapsed(), Duration::from_millis(800));
}

#[tokio::test(start_paused = true)]
async fn when_retries_are_disabled_a_transient_failure_is_final() {
    let http = Arc::new(ScriptedHttpClient::new([
        Err(HttpError::connect("connection refused")),
        Ok(HttpResponse::ok_json("{}")),
    ]));
    let client = fetch_client(&http, RetryConfig::no_retry());

    let error = client.fetch(&endpoint(), &[]).await.expect_err("no retry");
    assert_eq!(error.attempts(), Some(1));
    assert_eq!(http.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn when_the_server_rejects_the_request_it_is_not_retried() {
    let http = Arc::new(ScriptedHttpClient::new([
        Ok(HttpResponse::with_status(403, "forbidden")),
        Ok(HttpResponse::ok_json("{}")),
    ]));
    let client = fetch_client(&http, RetryConfig::default());

    let error = client.fetch(&endpoint(), &[]).await.expect_err("rejected");
    assert!(matches!(
        error,
        FetchError::Transport {
            attempts: 1,
            status: Some(403),
            ..
        }
    ));
}

// =============================================================================
// Fetch Client: Pacing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_calls_follow_each_other_they_are_spaced_by_the_pacing_interval() {
    let http = Arc::new(ScriptedHttpClient::json(["{}", "{}", "{}"]));
    let client = fetch_client(&http, RetryConfig::default());

    let started = Instant::now();
    for _ in 0..3 {
        client.fetch(&endpoint(), &[]).await.expect("body");
    }

    // Two gaps of one second; nothing is waited after the last call.
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn when_caller_is_already_idle_long_enough_no_extra_pause_is_added() {
    let http = Arc::new(ScriptedHttpClient::json(["{}", "{}"]));
    let client = fetch_client(&http, RetryConfig::default());

    client.fetch(&endpoint(), &[]).await.expect("first");
    tokio::time::sleep(Duration::from_secs(5)).await;

    let started = Instant::now();
    client.fetch(&endpoint(), &[]).await.expect("second");
    assert_eq!(started.elapsed(), Duration::ZERO);
}

// =============================================================================
// Fetch Client: Application Errors
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_estat_reports_a_failure_status_it_surfaces_as_api_error() {
    let http = Arc::new(ScriptedHttpClient::json([
        r#"{"GET_STATS_LIST": {"RESULT": {"STATUS": 100, "ERROR_MSG": "appIdが不正です。"}}}"#,
    ]));
    let client = fetch_client(&http, RetryConfig::default());

    let error = client
        .fetch(
            &Endpoint::new(
                "https://api.e-stat.test/rest/3.0/app/json/getStatsList",
                ApiStatusCheck::EstatResult,
            ),
            &[("appId", "bad"), ("searchWord", "宿泊")],
        )
        .await
        .expect_err("api error");

    assert_eq!(
        error,
        FetchError::Api {
            status: "100".to_string(),
            message: "appIdが不正です。".to_string(),
        }
    );
    assert_eq!(http.call_count(), 1);
}
