use std::time::Duration;

use crate::retry::RetryConfig;
use crate::ProviderId;

/// Transport etiquette for one upstream API.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub retry: RetryConfig,
    /// Minimum gap after a successful call before the next may start.
    pub pacing_interval: Duration,
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub timeout_ms: u64,
}

impl ProviderPolicy {
    pub fn jma_default() -> Self {
        Self {
            provider_id: ProviderId::Jma,
            retry: RetryConfig::default(),
            pacing_interval: Duration::from_secs(1),
            quota_window: Duration::from_secs(60),
            quota_limit: 60,
            timeout_ms: 10_000,
        }
    }

    pub fn estat_default() -> Self {
        Self {
            provider_id: ProviderId::Estat,
            retry: RetryConfig::default(),
            pacing_interval: Duration::from_secs(1),
            quota_window: Duration::from_secs(60),
            quota_limit: 30,
            timeout_ms: 20_000,
        }
    }

    /// Same policy without pacing or quota waits, for offline runs.
    pub fn unthrottled(mut self) -> Self {
        self.pacing_interval = Duration::ZERO;
        self.quota_limit = 10_000;
        self.quota_window = Duration::from_secs(1);
        self
    }
}
