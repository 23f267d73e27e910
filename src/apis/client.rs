/// Base HTTP client with rate limiting and bounded retry
use crate::apis::FetchOutcome;
use crate::config::GeckoTerminalConfig;
use crate::errors::{BackfillError, BackfillResult};
use crate::logger::{self, LogTag};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Rate limiter for API clients
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    last_request: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(max_per_minute: usize) -> Self {
        let min_interval = if max_per_minute > 0 {
            Duration::from_secs_f64(60.0 / max_per_minute as f64)
        } else {
            Duration::ZERO
        };

        Self {
            semaphore: Arc::new(Semaphore::new(1)), // Only 1 concurrent request
            last_request: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    /// Wait until we can make a request (respects rate limits)
    pub async fn acquire(&self) -> Result<RateLimitGuard, String> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| format!("Failed to acquire rate limiter permit: {}", e))?;

        if !self.min_interval.is_zero() {
            let mut last = self.last_request.lock().await;
            if let Some(last_time) = *last {
                let elapsed = last_time.elapsed();
                if elapsed < self.min_interval {
                    tokio::time::sleep(self.min_interval - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        Ok(RateLimitGuard { _permit: permit })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// RAII guard returned by [`RateLimiter::acquire`]
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}

/// Attempt budget and backoff schedule for one upstream call
///
/// Attempts are numbered from 0. HTTP 429 waits `2^attempt * 2` units,
/// other transient failures wait `attempt + 1` units. Nothing is slept after
/// the final attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &GeckoTerminalConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_unit: Duration::from_millis(config.backoff_unit_ms),
        }
    }

    pub fn rate_limited_delay(&self, attempt: u32) -> Duration {
        self.backoff_unit * 2u32.saturating_pow(attempt).saturating_mul(2)
    }

    pub fn transient_delay(&self, attempt: u32) -> Duration {
        self.backoff_unit * (attempt + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GeckoTerminalConfig::default())
    }
}

/// Why a single attempt did not produce a body
enum AttemptFailure {
    RateLimited,
    Transient(String),
}

/// HTTP client wrapper with rate limiting, per-call timeout and retry
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(rate_limit_per_minute: usize, retry: RetryPolicy) -> BackfillResult<Self> {
        let builder = Client::builder();
        // test stubs listen on loopback and must not go through an env proxy
        #[cfg(test)]
        let builder = builder.no_proxy();
        let client = builder
            .build()
            .map_err(|e| BackfillError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(rate_limit_per_minute),
            retry,
        })
    }

    /// GET `url` and return the response body
    ///
    /// 404 maps to `NotFound`. 429, 5xx, timeouts and transport errors are
    /// retried within the attempt budget. Any other status fails at once.
    pub async fn get_text(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> FetchOutcome<String> {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_failure = AttemptFailure::Transient("no attempt made".to_string());

        for attempt in 0..attempts {
            let failure = match self.attempt(url, query, timeout).await {
                Ok(outcome) => return outcome,
                Err(failure) => failure,
            };

            let is_last = attempt + 1 == attempts;
            let delay = match &failure {
                AttemptFailure::RateLimited => {
                    logger::warning(
                        LogTag::Api,
                        &format!(
                            "Rate limited on {} (attempt {}/{})",
                            endpoint,
                            attempt + 1,
                            attempts
                        ),
                    );
                    self.retry.rate_limited_delay(attempt)
                }
                AttemptFailure::Transient(message) => {
                    logger::warning(
                        LogTag::Api,
                        &format!(
                            "Transient failure on {} (attempt {}/{}): {}",
                            endpoint,
                            attempt + 1,
                            attempts,
                            message
                        ),
                    );
                    self.retry.transient_delay(attempt)
                }
            };
            last_failure = failure;

            if !is_last {
                logger::debug(
                    LogTag::Api,
                    &format!("Retrying {} in {}ms", endpoint, delay.as_millis()),
                );
                tokio::time::sleep(delay).await;
            }
        }

        match last_failure {
            AttemptFailure::RateLimited => FetchOutcome::RateLimited(attempts),
            AttemptFailure::Transient(message) => FetchOutcome::Failed(format!(
                "{} failed after {} attempts: {}",
                endpoint, attempts, message
            )),
        }
    }

    async fn attempt(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<FetchOutcome<String>, AttemptFailure> {
        let guard = self
            .rate_limiter
            .acquire()
            .await
            .map_err(AttemptFailure::Transient)?;

        let start = Instant::now();
        let result = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await;
        drop(guard);

        let response = result.map_err(|e| {
            if e.is_timeout() {
                AttemptFailure::Transient(format!("timed out after {:?}", timeout))
            } else {
                AttemptFailure::Transient(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        logger::verbose(
            LogTag::Api,
            &format!("GET {} -> {} in {}ms", url, status, start.elapsed().as_millis()),
        );

        if status.is_success() {
            return response
                .text()
                .await
                .map(FetchOutcome::Data)
                .map_err(|e| AttemptFailure::Transient(format!("failed to read body: {}", e)));
        }

        match status {
            StatusCode::NOT_FOUND => Ok(FetchOutcome::NotFound),
            StatusCode::TOO_MANY_REQUESTS => Err(AttemptFailure::RateLimited),
            s if s.is_server_error() => Err(AttemptFailure::Transient(format!("HTTP {}", s))),
            s => {
                let body = response.text().await.unwrap_or_default();
                Ok(FetchOutcome::Failed(format!("HTTP {}: {}", s, body)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        };

        let rate_limited: Vec<u64> = (0..3)
            .map(|a| policy.rate_limited_delay(a).as_secs())
            .collect();
        assert_eq!(rate_limited, vec![2, 4, 8]);

        let transient: Vec<u64> = (0..3).map(|a| policy.transient_delay(a).as_secs()).collect();
        assert_eq!(transient, vec![1, 2, 3]);
    }

    #[test]
    fn test_policy_from_config() {
        let config = GeckoTerminalConfig {
            max_attempts: 0,
            backoff_unit_ms: 5,
            ..Default::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.transient_delay(1), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_rate_limiter_spacing() {
        let limiter = RateLimiter::new(600); // 100ms apart
        assert_eq!(limiter.min_interval(), Duration::from_millis(100));

        let start = Instant::now();
        drop(limiter.acquire().await.unwrap());
        drop(limiter.acquire().await.unwrap());
        assert!(start.elapsed() >= Duration::from_millis(90));

        let unlimited = RateLimiter::new(0);
        assert!(unlimited.min_interval().is_zero());
    }
}
