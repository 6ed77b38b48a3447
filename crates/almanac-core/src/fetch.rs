//! JSON fetch client with bounded retry, pacing and API status checks.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{FetchError, ParseError};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::json_path::JsonPath;
use crate::provider_policy::ProviderPolicy;
use crate::retry::RetryConfig;
use crate::source::ProviderId;
use crate::throttling::RequestPacer;

/// Query parameters never written to logs.
const HIDDEN_PARAMS: [&str; 1] = ["appId"];

/// Application-level status check run on a decoded body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatusCheck {
    /// Any decoded JSON is accepted.
    Unchecked,
    /// e-Stat envelope: `RESULT.STATUS` must be `0`.
    ///
    /// `RESULT` is looked up at the top level and under each top-level
    /// object (`GET_STATS_DATA`, `GET_STATS_LIST`, ...).
    EstatResult,
}

impl ApiStatusCheck {
    pub fn verify(self, body: &Value) -> Result<(), FetchError> {
        match self {
            Self::Unchecked => Ok(()),
            Self::EstatResult => verify_estat_result(body),
        }
    }
}

fn verify_estat_result(body: &Value) -> Result<(), FetchError> {
    let root = JsonPath::root(body);
    let result = if root.key("RESULT").is_present() {
        root.key("RESULT")
    } else {
        body.as_object()
            .into_iter()
            .flat_map(|object| object.values())
            .map(|child| JsonPath::root(child).key("RESULT"))
            .find(|candidate| candidate.is_present())
            .unwrap_or_else(JsonPath::empty)
    };

    let Some(status) = result.key("STATUS").value() else {
        return Ok(());
    };
    let status = match status {
        Value::String(text) => text.trim().to_owned(),
        other => other.to_string(),
    };
    if status == "0" {
        return Ok(());
    }

    let message = ["ERROR_MSG", "ERROR_MESSAGE"]
        .iter()
        .find_map(|key| result.key(key).as_str())
        .unwrap_or("unknown error")
        .to_owned();
    Err(FetchError::Api { status, message })
}

/// A JSON endpoint: where to send the request and how to judge the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub check: ApiStatusCheck,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, check: ApiStatusCheck) -> Self {
        Self {
            url: url.into(),
            check,
        }
    }

    pub fn unchecked(url: impl Into<String>) -> Self {
        Self::new(url, ApiStatusCheck::Unchecked)
    }
}

/// HTTP client wrapper shared by the source adapters.
#[derive(Clone)]
pub struct FetchClient {
    provider: ProviderId,
    http: Arc<dyn HttpClient>,
    retry: RetryConfig,
    pacer: RequestPacer,
    timeout_ms: u64,
}

impl FetchClient {
    pub fn new(http: Arc<dyn HttpClient>, policy: &ProviderPolicy) -> Self {
        Self {
            provider: policy.provider_id,
            http,
            retry: policy.retry.clone(),
            pacer: RequestPacer::from_policy(policy),
            timeout_ms: policy.timeout_ms,
        }
    }

    /// GET `endpoint` with `params`, decode JSON and run the endpoint check.
    pub async fn fetch(
        &self,
        endpoint: &Endpoint,
        params: &[(&str, &str)],
    ) -> Result<Value, FetchError> {
        let request = params
            .iter()
            .fold(
                HttpRequest::get(endpoint.url.as_str()).with_timeout_ms(self.timeout_ms),
                |request, (name, value)| request.with_query(*name, *value),
            )
            .with_header("accept", "application/json");

        let response = self.send(request).await?;
        let body: Value = serde_json::from_str(&response.body)
            .map_err(|error| ParseError::InvalidJson(error.to_string()))?;
        endpoint.check.verify(&body)?;
        Ok(body)
    }

    /// Execute `request` under the retry and pacing rules.
    ///
    /// Non-idempotent requests get exactly one attempt. A non-retryable
    /// status fails at once; retryable failures are repeated until the
    /// attempt budget is spent.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let budget = if request.method.is_idempotent() {
            self.retry.attempt_budget()
        } else {
            1
        };
        let shown_url = request.display_url(&HIDDEN_PARAMS);

        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            self.pacer.ready().await;
            tracing::debug!(
                provider = %self.provider,
                url = shown_url.as_str(),
                attempt,
                "sending request"
            );

            let (retryable, status, cause) = match self.http.execute(request.clone()).await {
                Ok(response) if response.is_success() => {
                    self.pacer.mark_success();
                    return Ok(response);
                }
                Ok(response) => (
                    self.retry.should_retry_status(response.status),
                    Some(response.status),
                    format!("http status {}", response.status),
                ),
                Err(error) => (
                    self.retry.should_retry_error(&error),
                    None,
                    error.message().to_owned(),
                ),
            };

            if !retryable || attempt >= budget {
                tracing::warn!(
                    provider = %self.provider,
                    url = shown_url.as_str(),
                    attempts = attempt,
                    cause = cause.as_str(),
                    "request failed"
                );
                return Err(FetchError::Transport {
                    attempts: attempt,
                    status,
                    cause,
                });
            }

            let delay = self.retry.delay_for_retry(attempt - 1);
            tracing::warn!(
                provider = %self.provider,
                url = shown_url.as_str(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                cause = cause.as_str(),
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
