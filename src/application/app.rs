use super::ledger::WalletLedger;
use super::orchestrator::IngestionReport;
use super::stats::{MergeResult, StatsSnapshot};
use super::Aggregator;
use crate::domain::errors::AggregatorError;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

#[async_trait::async_trait]
pub trait Application {
    /// Statistics with the `limit` most recent records, refreshed first when stale.
    async fn stats(&self, limit: usize) -> Result<StatsSnapshot, AggregatorError>;

    /// Forces an ingestion run; `reset` drops all stored history first.
    async fn refresh(&self, reset: bool) -> Result<MergeResult, AggregatorError>;
}

/// Serves statistics for one wallet and decides when ingestion runs.
///
/// Only one ingestion runs at a time. While it runs, stats callers are answered
/// from the last ledger instead of waiting.
pub struct App<A> {
    aggregator: A,
    staleness_window: Duration,
    ledger: RwLock<Option<WalletLedger>>,
    run_lock: Mutex<()>,
}

impl<A> App<A>
where
    A: Aggregator + Send + Sync,
{
    pub fn new(aggregator: A, staleness_window: Duration) -> Self {
        Self {
            aggregator,
            staleness_window,
            ledger: RwLock::new(None),
            run_lock: Mutex::new(()),
        }
    }

    async fn current_ledger(&self) -> WalletLedger {
        if let Some(ledger) = self.ledger.read().await.as_ref() {
            return ledger.clone();
        }
        let loaded = self.aggregator.load().await;
        *self.ledger.write().await = Some(loaded.clone());
        loaded
    }

    async fn ingest(&self, ledger: WalletLedger) -> Result<IngestionReport, AggregatorError> {
        let report = self.aggregator.ingest(ledger).await?;
        *self.ledger.write().await = Some(report.ledger.clone());
        Ok(report)
    }
}

#[async_trait::async_trait]
impl<A> Application for App<A>
where
    A: Aggregator + Send + Sync,
{
    async fn stats(&self, limit: usize) -> Result<StatsSnapshot, AggregatorError> {
        let ledger = self.current_ledger().await;
        if !ledger.is_stale(self.staleness_window, Utc::now()) {
            return Ok(ledger.snapshot(limit, self.staleness_window));
        }

        let _running = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) if !ledger.is_pristine() => {
                tracing::info!("Ingestion already running, serving cached stats");
                return Ok(ledger.snapshot(limit, self.staleness_window));
            }
            Err(_) => self.run_lock.lock().await,
        };

        // a run that finished while we waited may have made this one unnecessary
        let ledger = self.current_ledger().await;
        if !ledger.is_stale(self.staleness_window, Utc::now()) {
            return Ok(ledger.snapshot(limit, self.staleness_window));
        }

        tracing::info!("Stats for {} are stale, ingesting", ledger.address);
        let report = self.ingest(ledger).await?;
        Ok(report.ledger.snapshot(limit, self.staleness_window))
    }

    async fn refresh(&self, reset: bool) -> Result<MergeResult, AggregatorError> {
        let _running = self.run_lock.lock().await;
        let mut ledger = self.current_ledger().await;
        if reset {
            self.aggregator.clear().await?;
            ledger.records.clear();
            ledger.last_fetch_timestamp = None;
            // storage is empty now, whatever the ingestion below does
            *self.ledger.write().await = Some(ledger.clone());
        }

        let report = self.ingest(ledger).await?;
        Ok(MergeResult {
            added_count: report.added,
            total_count: report.ledger.records.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::orchestrator::StopReason;
    use crate::domain::models::{Direction, TransactionRecord};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingAggregator {
        ingests: AtomicUsize,
        clears: AtomicUsize,
        remote_down: AtomicBool,
    }

    #[async_trait::async_trait]
    impl Aggregator for CountingAggregator {
        async fn load(&self) -> WalletLedger {
            WalletLedger::new("wallet")
        }

        async fn ingest(
            &self,
            mut ledger: WalletLedger,
        ) -> Result<IngestionReport, AggregatorError> {
            if self.remote_down.load(Ordering::SeqCst) {
                return Err(AggregatorError::NoDataAvailable(
                    "connection refused".to_string(),
                ));
            }
            let n = self.ingests.fetch_add(1, Ordering::SeqCst);
            let added = ledger.records.merge(vec![TransactionRecord::new(
                format!("sig-{n}"),
                Some(n as i64),
                n as u64,
                Direction::Received,
                1_000_000_000,
                None,
            )]);
            ledger.last_fetch_timestamp = Some(Utc::now());
            Ok(IngestionReport {
                ledger,
                stop_reason: StopReason::EndOfHistory,
                added,
                batches: 1,
                details_fetched: 1,
                excluded: 0,
                failed: 0,
                checkpoints: 1,
                final_save: None,
                elapsed: Duration::ZERO,
            })
        }

        async fn clear(&self) -> Result<(), AggregatorError> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn fresh_stats_do_not_ingest_again() {
        let app = App::new(CountingAggregator::default(), Duration::from_secs(300));

        let first = app.stats(10).await.unwrap();
        let second = app.stats(10).await.unwrap();

        assert_eq!(app.aggregator.ingests.load(Ordering::SeqCst), 1);
        assert_eq!(first.stats.total_count, 1);
        assert_eq!(second, first);
        assert!(!second.stale);
    }

    #[tokio::test]
    async fn zero_window_ingests_every_time() {
        let app = App::new(CountingAggregator::default(), Duration::ZERO);

        app.stats(10).await.unwrap();
        let snapshot = app.stats(1).await.unwrap();

        assert_eq!(app.aggregator.ingests.load(Ordering::SeqCst), 2);
        assert_eq!(snapshot.stats.total_count, 2);
        assert_eq!(snapshot.recent.len(), 1);
    }

    #[tokio::test]
    async fn reset_refresh_clears_history() {
        let app = App::new(CountingAggregator::default(), Duration::from_secs(300));

        let first = app.refresh(false).await.unwrap();
        let second = app.refresh(false).await.unwrap();
        assert_eq!(first, MergeResult { added_count: 1, total_count: 1 });
        assert_eq!(second, MergeResult { added_count: 1, total_count: 2 });

        let reset = app.refresh(true).await.unwrap();
        assert_eq!(reset, MergeResult { added_count: 1, total_count: 1 });
        assert_eq!(app.aggregator.clears.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_ingest_after_reset_keeps_cache_cleared() {
        let app = App::new(CountingAggregator::default(), Duration::from_secs(300));
        app.refresh(false).await.unwrap();

        app.aggregator.remote_down.store(true, Ordering::SeqCst);
        assert!(matches!(
            app.refresh(true).await,
            Err(AggregatorError::NoDataAvailable(_))
        ));
        assert_eq!(app.aggregator.clears.load(Ordering::SeqCst), 1);

        let cached = app.ledger.read().await.clone().unwrap();
        assert!(cached.is_pristine());
        // nothing fresh to serve, so stats go back to the remote instead of the old history
        assert!(app.stats(10).await.is_err());
    }
}
