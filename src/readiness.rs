//! Bounded waiting for external readiness.
//!
//! [`RetryPolicy`] drives a check until it reports success, giving up after a
//! maximum number of attempts or a wall-clock deadline, whichever comes
//! first. Exhaustion is an explicit [`ContainerError::Timeout`].

use crate::container::{ContainerError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Retry policy with exponential backoff and a deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of checks
    pub max_attempts: u32,
    /// Delay after the first failed check, in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound for a single delay, in milliseconds
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Give up once this much time has passed, in seconds
    pub max_wait_secs: u64,
    /// Random extra delay as a fraction of the computed delay (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            max_wait_secs: 60,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Policy used while waiting for an HTTP management endpoint.
    pub fn http_readiness() -> Self {
        Self {
            max_attempts: 12,
            initial_delay_ms: 2_000,
            max_delay_ms: 10_000,
            multiplier: 1.5,
            max_wait_secs: 120,
            jitter: 0.1,
        }
    }

    /// Check the policy can make at least one attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::ConfigError`] for zero attempts, a
    /// multiplier below 1 or a jitter outside `0.0..=1.0`.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ContainerError::ConfigError(format!(
                "{}: max_attempts must be at least 1",
                name
            )));
        }
        if !(self.multiplier >= 1.0) {
            return Err(ContainerError::ConfigError(format!(
                "{}: multiplier must be >= 1.0",
                name
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ContainerError::ConfigError(format!(
                "{}: jitter must be between 0.0 and 1.0",
                name
            )));
        }
        Ok(())
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    /// Backoff delay after failed attempt number `attempt` (1-based), before jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = delay.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let extra = rand::rng().random_range(0.0..=self.jitter);
        delay.mul_f64(1.0 + extra)
    }

    /// Run `check` until it yields `Some`.
    ///
    /// `check` receives the 1-based attempt number. `Ok(None)` means "not yet";
    /// an `Err` aborts the wait immediately.
    ///
    /// # Errors
    ///
    /// Returns the first error from `check`, or [`ContainerError::Timeout`]
    /// once attempts or time run out.
    pub async fn poll<T, F, Fut>(&self, what: &str, mut check: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let started = Instant::now();
        let deadline = started + self.max_wait();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if let Some(value) = check(attempt).await? {
                debug!("{} ready after {} attempt(s)", what, attempt);
                return Ok(value);
            }

            let now = Instant::now();
            if attempt >= self.max_attempts || now >= deadline {
                return Err(ContainerError::Timeout {
                    what: what.to_string(),
                    attempts: attempt,
                    waited: now.duration_since(started),
                });
            }

            let delay = self
                .jittered(self.delay_for(attempt))
                .min(deadline.duration_since(now));
            debug!(
                "{} not ready (attempt {}/{}), retrying in {:?}",
                what, attempt, self.max_attempts, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// HTTP readiness probe: ready means a plain GET answers `200 OK`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: url::Url,
}

impl HttpProbe {
    /// Create a probe for `url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the URL does not parse or the HTTP client cannot be
    /// built.
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self> {
        let url = url::Url::parse(url)
            .map_err(|e| ContainerError::ConfigError(format!("Invalid probe URL {}: {}", url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ContainerError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }

    /// One probe. Connection failures and non-200 answers both read as "not ready".
    pub async fn check(&self) -> bool {
        match self.client.get(self.url.clone()).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => true,
            Ok(response) => {
                debug!("{} answered {}", self.url, response.status());
                false
            }
            Err(e) => {
                debug!("{} unreachable: {}", self.url, e);
                false
            }
        }
    }

    /// Probe under `policy` until the endpoint answers 200.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Timeout`] if the policy is exhausted.
    pub async fn wait_ready(&self, policy: &RetryPolicy) -> Result<u32> {
        let what = format!("HTTP endpoint {}", self.url);
        let attempts = policy
            .poll(&what, |attempt| async move {
                Ok(self.check().await.then_some(attempt))
            })
            .await?;

        info!("{} is ready", self.url);
        Ok(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn fixed(max_attempts: u32, delay_ms: u64, max_wait_secs: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            multiplier: 1.0,
            max_wait_secs,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_delay_for_grows_and_caps() {
        let policy = RetryPolicy {
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2.0,
            ..Default::default()
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1_000));
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate("wait").is_ok());
        assert!(fixed(0, 10, 1).validate("wait").is_err());

        let policy = RetryPolicy {
            multiplier: 0.5,
            ..Default::default()
        };
        assert!(policy.validate("wait").is_err());

        let policy = RetryPolicy {
            jitter: 1.5,
            ..Default::default()
        };
        assert!(policy.validate("wait").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_on_first_success() {
        let calls = AtomicUsize::new(0);
        let policy = fixed(10, 1_000, 600);

        let attempt = policy
            .poll("service", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok((attempt == 3).then_some(attempt)) }
            })
            .await
            .unwrap();

        assert_eq!(attempt, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let policy = fixed(4, 10_000, 600);

        let result: Result<()> = policy
            .poll("service", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            })
            .await;

        match result {
            Err(ContainerError::Timeout { attempts, waited, .. }) => {
                assert_eq!(attempts, 4);
                assert_eq!(waited, Duration::from_secs(30));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_respects_deadline() {
        let policy = fixed(1_000, 1_000, 5);

        let result: Result<()> = policy.poll("service", |_| async { Ok(None) }).await;

        match result {
            Err(ContainerError::Timeout { attempts, waited, .. }) => {
                assert_eq!(attempts, 6);
                assert_eq!(waited, Duration::from_secs(5));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_propagates_check_errors() {
        let calls = AtomicUsize::new(0);
        let policy = fixed(10, 1_000, 600);

        let result: Result<()> = policy
            .poll("service", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ContainerError::Other("engine gone".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(ContainerError::Other(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Serve one response per connection, taking status codes from `statuses`
    /// and answering 200 once they run out.
    async fn serve(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let status = statuses.get(n).copied().unwrap_or(200);
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/pools", addr), hits)
    }

    #[tokio::test]
    async fn test_http_probe_ready_after_unavailable() {
        let (url, hits) = serve(vec![503, 404]).await;
        let probe = HttpProbe::new(&url, Duration::from_secs(5)).unwrap();

        let attempts = probe.wait_ready(&fixed(10, 10, 30)).await.unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_http_probe_times_out_on_non_200() {
        let (url, hits) = serve(vec![500; 10]).await;
        let probe = HttpProbe::new(&url, Duration::from_secs(5)).unwrap();

        let result = probe.wait_ready(&fixed(3, 10, 30)).await;

        assert!(matches!(
            result,
            Err(ContainerError::Timeout { attempts: 3, .. })
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_http_probe_connection_refused_is_not_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(&format!("http://{}/pools", addr), Duration::from_secs(2))
            .unwrap();
        assert!(!probe.check().await);

        let result = probe.wait_ready(&fixed(2, 10, 30)).await;
        assert!(matches!(result, Err(ContainerError::Timeout { .. })));
    }

    #[test]
    fn test_http_probe_rejects_bad_url() {
        let result = HttpProbe::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(ContainerError::ConfigError(_))));
    }
}
