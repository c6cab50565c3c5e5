use super::classifier::TransactionClassifier;
use super::gateway::PersistenceGateway;
use super::ledger::WalletLedger;
use super::pager::SignaturePager;
use super::Aggregator;
use crate::domain::config::{PipelineConfig, MAX_DEADLINE};
use crate::domain::errors::{AggregatorError, BcClientError};
use crate::domain::models::{DataStorage, SaveOutcome, SignatureInfo, TransactionRecord};
use crate::infrastructure::bc_client::BcClient;
use chrono::Utc;
use futures::{stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use typed_builder::TypedBuilder;

/// Phases of one ingestion invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Paging,
    Detailing,
    Merging,
    Saving,
    Stopped,
}

/// Why an invocation stopped, in priority order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "reason", content = "detail")]
pub enum StopReason {
    /// Wall-clock budget used up; partial progress was kept
    DeadlineReached,
    /// A page reached signatures that are already stored
    CaughtUp,
    /// The remote has no older signatures
    EndOfHistory,
    /// Safety valve against runaway pagination
    MaxBatches,
    /// A signature page could not be fetched
    RemoteUnavailable(String),
}

/// What one invocation did, along with the resulting ledger.
#[derive(Clone, Debug)]
pub struct IngestionReport {
    pub ledger: WalletLedger,
    pub stop_reason: StopReason,
    pub added: usize,
    pub batches: usize,
    pub details_fetched: usize,
    pub excluded: usize,
    pub failed: usize,
    /// Debounced checkpoint saves that were committed
    pub checkpoints: usize,
    /// Outcome of the save attempted on the way out, if one was needed
    pub final_save: Option<SaveOutcome>,
    pub elapsed: Duration,
}

enum DetailOutcome {
    Classified(TransactionRecord),
    Excluded,
    Failed,
    OutOfTime,
}

#[derive(Default)]
struct DetailBatch {
    records: Vec<TransactionRecord>,
    fetched: usize,
    excluded: usize,
    failed: usize,
    deadline_reached: bool,
}

/// Drives paging, detail retrieval, merging and saving under a wall-clock budget.
#[derive(TypedBuilder)]
pub struct BudgetedOrchestrator<C, D> {
    client: Arc<C>,
    gateway: Arc<PersistenceGateway<D>>,
    #[builder(default)]
    config: PipelineConfig,
}

impl<C, D> BudgetedOrchestrator<C, D>
where
    C: BcClient + Send + Sync,
    D: DataStorage + Send + Sync,
{
    fn enter(&self, phase: Phase) {
        tracing::debug!("[{}] -> {:?}", self.gateway.address(), phase);
    }

    async fn detail_batch(
        &self,
        classifier: &TransactionClassifier,
        pending: Vec<SignatureInfo>,
        deadline: Instant,
    ) -> DetailBatch {
        let mut outcomes = stream::iter(pending.into_iter().enumerate())
            .map(|(position, info)| self.detail_one(classifier, position, info, deadline))
            .buffered(self.config.detail_concurrency);

        // Drained to the end so in-flight fetches complete; late ones are never dispatched.
        let mut batch = DetailBatch::default();
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                DetailOutcome::Classified(record) => {
                    batch.fetched += 1;
                    batch.records.push(record);
                }
                DetailOutcome::Excluded => batch.excluded += 1,
                DetailOutcome::Failed => batch.failed += 1,
                DetailOutcome::OutOfTime => batch.deadline_reached = true,
            }
        }
        batch
    }

    async fn detail_one(
        &self,
        classifier: &TransactionClassifier,
        position: usize,
        info: SignatureInfo,
        deadline: Instant,
    ) -> DetailOutcome {
        if let Some(err) = &info.err {
            tracing::debug!("Excluding failed transaction {}: {}", info.signature, err);
            return DetailOutcome::Excluded;
        }
        if position > 0 && !self.config.item_delay.is_zero() {
            let wake = Instant::now()
                .checked_add(self.config.item_delay)
                .map_or(deadline, |at| at.min(deadline));
            time::sleep_until(wake).await;
        }
        if Instant::now() >= deadline {
            return DetailOutcome::OutOfTime;
        }

        match self
            .client
            .get_transaction_before(&info.signature, self.config.detail_mode, deadline)
            .await
        {
            Ok(raw) => match classifier.classify(&info.signature, &raw) {
                Some(mut record) => {
                    if record.block_time.is_none() {
                        record.block_time = info.block_time;
                    }
                    DetailOutcome::Classified(record)
                }
                None => DetailOutcome::Excluded,
            },
            Err(BcClientError::DeadlineReached) => DetailOutcome::OutOfTime,
            Err(e) => {
                tracing::warn!("Skipping transaction {}: {}", info.signature, e);
                DetailOutcome::Failed
            }
        }
    }
}

#[async_trait::async_trait]
impl<C, D> Aggregator for BudgetedOrchestrator<C, D>
where
    C: BcClient + Send + Sync,
    D: DataStorage + Send + Sync,
{
    async fn load(&self) -> WalletLedger {
        self.enter(Phase::Loading);
        WalletLedger::from_stored(self.gateway.address(), self.gateway.load().await)
    }

    async fn ingest(&self, mut ledger: WalletLedger) -> Result<IngestionReport, AggregatorError> {
        let started = Instant::now();
        let deadline = started + self.config.deadline.min(MAX_DEADLINE);
        let pager = SignaturePager::new(self.client.clone(), ledger.address.clone());
        let classifier = TransactionClassifier::new(ledger.address.clone());
        let pristine = ledger.is_pristine();

        let mut cursor: Option<String> = None;
        let mut batches = 0;
        let mut added = 0;
        let mut details_fetched = 0;
        let mut excluded = 0;
        let mut failed = 0;
        let mut checkpoints = 0;
        let mut unsaved = false;

        let stop_reason = loop {
            if Instant::now() >= deadline {
                break StopReason::DeadlineReached;
            }
            if batches >= self.config.max_batches {
                break StopReason::MaxBatches;
            }

            self.enter(Phase::Paging);
            let page = match pager.next_batch(cursor.clone(), self.config.batch_size).await {
                Ok(page) => page,
                Err(e) if pristine && batches == 0 => {
                    return Err(AggregatorError::NoDataAvailable(e.to_string()));
                }
                Err(e) => {
                    tracing::warn!("Signature page for {} failed: {}", ledger.address, e);
                    break StopReason::RemoteUnavailable(e.to_string());
                }
            };
            batches += 1;
            if page.exhausted {
                break StopReason::EndOfHistory;
            }

            let (known, fresh): (Vec<SignatureInfo>, Vec<SignatureInfo>) = page
                .signatures
                .into_iter()
                .partition(|info| ledger.records.contains(&info.signature));
            tracing::info!(
                "Batch {} for {}: {} new, {} already stored",
                batches,
                ledger.address,
                fresh.len(),
                known.len()
            );
            if fresh.is_empty() {
                break StopReason::CaughtUp;
            }

            self.enter(Phase::Detailing);
            let batch = self.detail_batch(&classifier, fresh, deadline).await;
            details_fetched += batch.fetched;
            excluded += batch.excluded;
            failed += batch.failed;

            self.enter(Phase::Merging);
            let merged = ledger.records.merge(batch.records);
            added += merged;
            if merged > 0 {
                unsaved = true;
                self.enter(Phase::Saving);
                ledger.last_fetch_timestamp = Some(Utc::now());
                if self.gateway.save(&ledger.to_stored()).await == SaveOutcome::Committed {
                    unsaved = false;
                    checkpoints += 1;
                }
            }

            if batch.deadline_reached {
                break StopReason::DeadlineReached;
            }
            // anything older than a stored signature was seen on an earlier run
            if !known.is_empty() {
                break StopReason::CaughtUp;
            }
            cursor = page.next_cursor;
        };

        self.enter(Phase::Stopped);
        if batches > 0 && !matches!(stop_reason, StopReason::RemoteUnavailable(_)) {
            ledger.last_fetch_timestamp = Some(Utc::now());
            unsaved = true;
        }
        let final_save = if unsaved {
            Some(self.gateway.flush(&ledger.to_stored()).await)
        } else {
            None
        };

        let elapsed = started.elapsed();
        tracing::info!(
            "Ingestion for {} stopped ({:?}) after {} batches in {:?}: {} added, {} total",
            ledger.address,
            stop_reason,
            batches,
            elapsed,
            added,
            ledger.records.len()
        );

        Ok(IngestionReport {
            ledger,
            stop_reason,
            added,
            batches,
            details_fetched,
            excluded,
            failed,
            checkpoints,
            final_save,
            elapsed,
        })
    }

    async fn clear(&self) -> Result<(), AggregatorError> {
        self.gateway.clear().await?;
        Ok(())
    }
}
