use super::errors::AggregatorError;
use super::models::DetailMode;
use std::time::Duration;
use typed_builder::TypedBuilder;

/// Largest page the signature index serves.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Slowest accepted request rate: one request every 1000s.
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.001;

/// Longest accepted invocation budget and item delay.
pub const MAX_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

/// Throttling and retry policy for every remote call.
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
pub struct RateLimitConfig {
    /// Ceiling on dispatched requests per second
    #[builder(default = 1.0)]
    pub requests_per_second: f64,
    /// First retry delay, doubled for every consecutive failure
    #[builder(default = Duration::from_millis(500))]
    pub initial_backoff: Duration,
    /// Retries allowed per logical request before the error surfaces
    #[builder(default = 5)]
    pub max_retries: usize,
    /// Consecutive failures before the client goes into cooldown
    #[builder(default = 3)]
    pub cooldown_after: u32,
    #[builder(default = Duration::from_secs(10))]
    pub cooldown: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RateLimitConfig {
    /// Minimum spacing between two dispatches, capped at the spacing of the
    /// slowest accepted rate.
    pub fn min_interval(&self) -> Duration {
        let longest = Duration::from_secs_f64(1.0 / MIN_REQUESTS_PER_SECOND);
        Duration::try_from_secs_f64(1.0 / self.requests_per_second)
            .map_or(longest, |interval| interval.min(longest))
    }

    pub fn validate(&self) -> Result<(), AggregatorError> {
        if !self.requests_per_second.is_finite()
            || self.requests_per_second < MIN_REQUESTS_PER_SECOND
        {
            return Err(AggregatorError::InvalidConfig(format!(
                "requests_per_second must be a number of at least {MIN_REQUESTS_PER_SECOND}, got {}",
                self.requests_per_second
            )));
        }
        Ok(())
    }
}

/// Everything one ingestion invocation is parameterized by.
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
pub struct PipelineConfig {
    /// Signatures requested per page
    #[builder(default = 20)]
    pub batch_size: usize,
    /// Pages walked per invocation at most
    #[builder(default = 10)]
    pub max_batches: usize,
    /// Wall-clock budget of one invocation
    #[builder(default = Duration::from_secs(50))]
    pub deadline: Duration,
    /// Age of the last fetch after which stats trigger a new run
    #[builder(default = Duration::from_secs(300))]
    pub staleness_window: Duration,
    /// Pause before each detail fetch after the first one in a batch
    #[builder(default = Duration::from_millis(250))]
    pub item_delay: Duration,
    /// Detail fetches in flight at once within a batch
    #[builder(default = 1)]
    pub detail_concurrency: usize,
    #[builder(default)]
    pub detail_mode: DetailMode,
    /// Minimum time between two physical writes
    #[builder(default = Duration::from_secs(2))]
    pub save_debounce: Duration,
    #[builder(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl PipelineConfig {
    /// Long-running host: generous budget, full detail.
    pub fn standard() -> Self {
        Self::builder().build()
    }

    /// Serverless host: tight wall-clock budget and degraded detail.
    pub fn serverless() -> Self {
        Self::builder()
            .batch_size(10)
            .max_batches(3)
            .deadline(Duration::from_secs(8))
            .item_delay(Duration::ZERO)
            .detail_mode(DetailMode::Fast)
            .save_debounce(Duration::from_secs(1))
            .rate_limit(
                RateLimitConfig::builder()
                    .requests_per_second(2.0)
                    .initial_backoff(Duration::from_millis(250))
                    .max_retries(2)
                    .cooldown(Duration::from_secs(2))
                    .build(),
            )
            .build()
    }

    pub fn validate(&self) -> Result<(), AggregatorError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(AggregatorError::InvalidConfig(format!(
                "batch_size must be within 1..={MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.max_batches == 0 {
            return Err(AggregatorError::InvalidConfig(
                "max_batches must be at least 1".to_string(),
            ));
        }
        if self.deadline.is_zero() || self.deadline > MAX_DEADLINE {
            return Err(AggregatorError::InvalidConfig(format!(
                "deadline must be positive and at most {}s, got {:?}",
                MAX_DEADLINE.as_secs(),
                self.deadline
            )));
        }
        if self.item_delay > MAX_DEADLINE {
            return Err(AggregatorError::InvalidConfig(format!(
                "item_delay must not exceed {}s, got {:?}",
                MAX_DEADLINE.as_secs(),
                self.item_delay
            )));
        }
        if self.detail_concurrency == 0 {
            return Err(AggregatorError::InvalidConfig(
                "detail_concurrency must be at least 1".to_string(),
            ));
        }
        self.rate_limit.validate()
    }
}
