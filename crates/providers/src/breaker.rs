//! Circuit breaker: per-service failure isolation.
//!
//! One breaker guards one downstream service (the primary provider, the
//! fallback provider). It has three states:
//!
//! ```text
//!   CLOSED ──(failure_threshold consecutive failures)──► OPEN
//!   OPEN ──(timeout elapsed, next call let through)──► HALF_OPEN
//!   HALF_OPEN ──(any failure)──► OPEN
//!   HALF_OPEN ──(success_threshold consecutive successes)──► CLOSED
//! ```
//!
//! While OPEN, calls fail fast with [`ProviderError::CircuitOpen`] without
//! invoking the wrapped future.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use crewforge_core::error::ProviderError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        };
        f.write_str(s)
    }
}

/// Thresholds for a breaker.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    /// Consecutive failures that trip CLOSED to OPEN
    pub failure_threshold: u32,
    /// Consecutive successes that close a HALF_OPEN breaker
    pub success_threshold: u32,
    /// How long OPEN rejects calls before probing again
    pub timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&crewforge_config::BreakerConfig> for BreakerSettings {
    fn from(c: &crewforge_config::BreakerConfig) -> Self {
        Self {
            failure_threshold: c.failure_threshold.max(1),
            success_threshold: c.success_threshold.max(1),
            timeout: Duration::from_millis(c.timeout_ms),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    next_attempt: Option<Instant>,
}

/// A circuit breaker bound to one downstream service.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            service: service.into(),
            settings,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                next_attempt: None,
            }),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `f` under the breaker.
    ///
    /// The state lock is never held across the await.
    pub async fn execute<T, F, Fut>(&self, f: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.admit()?;
        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(e)
            }
        }
    }

    /// Force the breaker back to CLOSED.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.successes = 0;
        inner.next_attempt = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn admit(&self) -> Result<(), ProviderError> {
        let mut inner = self.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let now = Instant::now();
        match inner.next_attempt {
            Some(at) if now < at => Err(ProviderError::CircuitOpen {
                service: self.service.clone(),
                retry_in_ms: (at - now).as_millis() as u64,
            }),
            _ => {
                inner.state = CircuitState::HalfOpen;
                inner.successes = 0;
                info!(service = %self.service, state = %inner.state, "Circuit probing");
                Ok(())
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.settings.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                    inner.next_attempt = None;
                    info!(service = %self.service, state = %inner.state, "Circuit closed");
                }
            }
            _ => inner.failures = 0,
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => self.trip(&mut inner),
            CircuitState::Closed => {
                inner.failures += 1;
                debug!(
                    service = %self.service,
                    failures = inner.failures,
                    "Circuit failure recorded"
                );
                if inner.failures >= self.settings.failure_threshold {
                    self.trip(&mut inner);
                }
            }
            // A call admitted before another caller tripped the breaker.
            CircuitState::Open => {}
        }
    }

    fn trip(&self, inner: &mut Inner) {
        inner.state = CircuitState::Open;
        inner.successes = 0;
        inner.next_attempt = Some(Instant::now() + self.settings.timeout);
        warn!(
            service = %self.service,
            state = %inner.state,
            timeout_ms = self.settings.timeout.as_millis() as u64,
            "Circuit opened"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(failures: u32, successes: u32, timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "primary",
            BreakerSettings {
                failure_threshold: failures,
                success_threshold: successes,
                timeout: Duration::from_millis(timeout_ms),
            },
        )
    }

    async fn fail(b: &CircuitBreaker, calls: &AtomicUsize) -> Result<(), ProviderError> {
        b.execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ProviderError::Network("down".into()))
        })
        .await
    }

    async fn succeed(b: &CircuitBreaker, calls: &AtomicUsize) -> Result<(), ProviderError> {
        b.execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_and_rejects_without_calling() {
        let b = breaker(3, 2, 1000);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            assert!(fail(&b, &calls).await.is_err());
        }
        assert_eq!(b.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let err = succeed(&b, &calls).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::CircuitOpen { ref service, .. } if service == "primary"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_after_timeout_then_closes() {
        let b = breaker(2, 2, 1000);
        let calls = AtomicUsize::new(0);
        fail(&b, &calls).await.unwrap_err();
        fail(&b, &calls).await.unwrap_err();
        assert_eq!(b.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1001)).await;

        // The trial call observes HALF_OPEN while it runs.
        let seen = b
            .execute(|| async { Ok::<_, ProviderError>(b.state()) })
            .await
            .unwrap();
        assert_eq!(seen, CircuitState::HalfOpen);
        assert_eq!(b.state(), CircuitState::HalfOpen);

        succeed(&b, &calls).await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let b = breaker(1, 2, 500);
        let calls = AtomicUsize::new(0);
        fail(&b, &calls).await.unwrap_err();
        assert_eq!(b.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(600)).await;
        fail(&b, &calls).await.unwrap_err();
        assert_eq!(b.state(), CircuitState::Open);

        // Deadline was rescheduled from the second failure.
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(matches!(
            succeed(&b, &calls).await,
            Err(ProviderError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn success_resets_failure_count_when_closed() {
        let b = breaker(3, 1, 1000);
        let calls = AtomicUsize::new(0);
        fail(&b, &calls).await.unwrap_err();
        fail(&b, &calls).await.unwrap_err();
        succeed(&b, &calls).await.unwrap();
        fail(&b, &calls).await.unwrap_err();
        fail(&b, &calls).await.unwrap_err();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn reset_closes() {
        let b = breaker(1, 1, 60_000);
        let calls = AtomicUsize::new(0);
        fail(&b, &calls).await.unwrap_err();
        assert_eq!(b.state(), CircuitState::Open);
        b.reset();
        assert_eq!(b.state(), CircuitState::Closed);
        succeed(&b, &calls).await.unwrap();
    }

    #[test]
    fn settings_from_config() {
        let cfg = crewforge_config::BreakerConfig::default();
        let s = BreakerSettings::from(&cfg);
        assert_eq!(s.failure_threshold, 5);
        assert_eq!(s.success_threshold, 2);
        assert_eq!(s.timeout, Duration::from_secs(60));
    }
}
