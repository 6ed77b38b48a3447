//! Retry policy with exponential backoff.

use std::time::Duration;

use crate::http_client::{HttpError, HttpErrorKind};

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed { delay: Duration },
    /// `base * factor^n`, capped at `max`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(800),
            factor: 2.0,
            max: Duration::from_secs(10),
        }
    }
}

impl Backoff {
    /// Delay to wait after the `retry`-th failure (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { base, factor, max } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let capped = if seconds.is_finite() {
                    seconds.min(max.as_secs_f64())
                } else {
                    max.as_secs_f64()
                };
                Duration::from_secs_f64(capped.max(0.0))
            }
        }
    }
}

/// Configuration for the automatic retry mechanism.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// HTTP statuses treated as transient.
    pub retry_on_status: Vec<u16>,
    pub retry_on_timeout: bool,
    pub retry_on_connect: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            backoff: Backoff::default(),
            retry_on_status: vec![429, 500, 502, 503, 504],
            retry_on_timeout: true,
            retry_on_connect: true,
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Attempts actually allowed, never below one.
    pub fn attempt_budget(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    pub fn should_retry_error(&self, error: &HttpError) -> bool {
        match error.kind() {
            HttpErrorKind::Timeout => self.retry_on_timeout,
            HttpErrorKind::Connect => self.retry_on_connect,
            HttpErrorKind::Other => false,
        }
    }

    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.backoff.delay(retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_doubles_from_800ms_and_caps_at_ten_seconds() {
        let config = RetryConfig::default();

        assert_eq!(config.delay_for_retry(0), Duration::from_millis(800));
        assert_eq!(config.delay_for_retry(1), Duration::from_millis(1_600));
        assert_eq!(config.delay_for_retry(2), Duration::from_millis(3_200));
        assert_eq!(config.delay_for_retry(3), Duration::from_millis(6_400));
        assert_eq!(config.delay_for_retry(4), Duration::from_secs(10));
        assert_eq!(config.delay_for_retry(40), Duration::from_secs(10));
    }

    #[test]
    fn default_config_retries_only_transient_conditions() {
        let config = RetryConfig::default();

        assert_eq!(config.attempt_budget(), 3);
        for status in [429, 500, 502, 503, 504] {
            assert!(config.should_retry_status(status), "status {status}");
        }
        for status in [400, 401, 403, 404, 501] {
            assert!(!config.should_retry_status(status), "status {status}");
        }
        assert!(config.should_retry_error(&HttpError::timeout("slow")));
        assert!(config.should_retry_error(&HttpError::connect("refused")));
        assert!(!config.should_retry_error(&HttpError::other("bad body")));
    }

    #[test]
    fn disabled_retry_allows_exactly_one_attempt() {
        assert_eq!(RetryConfig::no_retry().attempt_budget(), 1);
        assert_eq!(RetryConfig::exponential(0).attempt_budget(), 1);
        assert_eq!(
            RetryConfig::fixed(Duration::from_millis(5), 4).delay_for_retry(3),
            Duration::from_millis(5)
        );
    }
}
