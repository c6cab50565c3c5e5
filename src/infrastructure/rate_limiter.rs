use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tokio_retry::RetryIf;

use crate::domain::config::RateLimitConfig;
use crate::domain::errors::BcClientError;
use crate::domain::models::{DetailMode, RawTransaction, SignatureInfo};

use super::bc_client::BcClient;

const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Default)]
struct Schedule {
    last_dispatch: Option<Instant>,
    cooldown_until: Option<Instant>,
    last_failure: Option<Instant>,
}

#[derive(Debug, Default)]
struct LimiterState {
    // Callers queue on this lock in arrival order and hold it until their slot.
    schedule: Mutex<Schedule>,
    consecutive_errors: AtomicU32,
}

/// Backoff delays derived from the shared consecutive-error counter, so the
/// delay keeps growing across logical requests while the remote is throttling.
struct SharedBackoff {
    initial: Duration,
    state: Arc<LimiterState>,
}

impl Iterator for SharedBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let errors = self.state.consecutive_errors.load(Ordering::SeqCst);
        let exponent = errors.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        Some(self.initial.saturating_mul(1 << exponent))
    }
}

/// Wraps a [`BcClient`] so that every call goes through one ordered queue that
/// dispatches at most `requests_per_second`, retrying retryable failures with
/// exponential backoff and cooling down after repeated failures.
pub struct RateLimitedClient<C> {
    inner: C,
    config: RateLimitConfig,
    state: Arc<LimiterState>,
}

impl<C> RateLimitedClient<C> {
    pub fn new(inner: C, config: RateLimitConfig) -> Self {
        Self {
            inner,
            config,
            state: Arc::new(LimiterState::default()),
        }
    }

    #[cfg(test)]
    fn consecutive_errors(&self) -> u32 {
        self.state.consecutive_errors.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    async fn last_failure(&self) -> Option<Instant> {
        self.state.schedule.lock().await.last_failure
    }

    /// Runs one logical request, retrying it while it fails with a retryable error.
    pub async fn send<T, F, Fut>(&self, request: F) -> Result<T, BcClientError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BcClientError>>,
    {
        self.send_before(None, request).await
    }

    /// Like [`RateLimitedClient::send`], but no attempt is dispatched once its slot
    /// falls at or after `deadline`; the call then fails with `DeadlineReached`.
    pub async fn send_before<T, F, Fut>(
        &self,
        deadline: Option<Instant>,
        request: F,
    ) -> Result<T, BcClientError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BcClientError>>,
    {
        let strategy = SharedBackoff {
            initial: self.config.initial_backoff,
            state: self.state.clone(),
        }
        .take(self.config.max_retries);
        let request = &request;

        RetryIf::spawn(
            strategy,
            move || self.dispatch(deadline, request),
            BcClientError::is_retryable,
        )
        .await
    }

    async fn dispatch<T, F, Fut>(
        &self,
        deadline: Option<Instant>,
        request: &F,
    ) -> Result<T, BcClientError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BcClientError>>,
    {
        self.acquire(deadline).await?;
        let result = request().await;
        match &result {
            Ok(_) => {
                self.state.consecutive_errors.store(0, Ordering::SeqCst);
            }
            Err(e) if e.is_retryable() => self.record_failure(e).await,
            Err(_) => {}
        }
        result
    }

    /// Waits for the next free slot and claims it, unless the slot is at or past `deadline`.
    async fn acquire(&self, deadline: Option<Instant>) -> Result<(), BcClientError> {
        let mut schedule = self.state.schedule.lock().await;
        let now = Instant::now();
        let mut ready = schedule
            .last_dispatch
            .and_then(|last| last.checked_add(self.config.min_interval()))
            .unwrap_or(now);
        if let Some(until) = schedule.cooldown_until {
            ready = ready.max(until);
        }
        if deadline.is_some_and(|deadline| ready >= deadline) {
            return Err(BcClientError::DeadlineReached);
        }
        if ready > now {
            time::sleep_until(ready).await;
        }
        schedule.last_dispatch = Some(Instant::now());
        Ok(())
    }

    async fn record_failure(&self, error: &BcClientError) {
        let errors = self.state.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1;
        let mut schedule = self.state.schedule.lock().await;
        let now = Instant::now();
        let since_previous = schedule.last_failure.replace(now).map(|at| now - at);
        if errors >= self.config.cooldown_after {
            schedule.cooldown_until = now.checked_add(self.config.cooldown);
            tracing::warn!(
                "{} consecutive remote failures, cooling down for {:?}: {}",
                errors,
                self.config.cooldown,
                error
            );
        } else {
            tracing::debug!(
                "Remote failure #{} ({:?} after the previous one): {}",
                errors,
                since_previous,
                error
            );
        }
    }
}

#[async_trait::async_trait]
impl<C> BcClient for RateLimitedClient<C>
where
    C: BcClient + Send + Sync,
{
    async fn get_signatures_for_address(
        &self,
        address: &str,
        before: Option<String>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, BcClientError> {
        self.send(|| {
            self.inner
                .get_signatures_for_address(address, before.clone(), limit)
        })
        .await
    }

    async fn get_transaction(
        &self,
        signature: &str,
        mode: DetailMode,
    ) -> Result<RawTransaction, BcClientError> {
        self.send(|| self.inner.get_transaction(signature, mode))
            .await
    }

    async fn get_transaction_before(
        &self,
        signature: &str,
        mode: DetailMode,
        deadline: Instant,
    ) -> Result<RawTransaction, BcClientError> {
        self.send_before(Some(deadline), || self.inner.get_transaction(signature, mode))
            .await
    }
}
