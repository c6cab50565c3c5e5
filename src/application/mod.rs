use crate::domain::errors::AggregatorError;
use ledger::WalletLedger;
use orchestrator::IngestionReport;

pub mod app;
pub mod classifier;
pub mod gateway;
pub mod ledger;
pub mod merger;
pub mod orchestrator;
pub mod pager;
pub mod stats;

/// The `Aggregator` trait defines the core functionality for incremental ingestion.
///
/// Implementors load a wallet's stored history, bring it up to date with the
/// remote within their budget, and persist the result.
///
/// # Examples
///
/// ```no_run
/// use wallet_tx_tracker::application::Aggregator;
///
/// async fn catch_up(aggregator: &(impl Aggregator + Sync)) {
///     match aggregator.run().await {
///         Ok(report) => println!("{} new records", report.added),
///         Err(e) => eprintln!("ingestion failed: {e}"),
///     }
/// }
/// ```
///
/// # Errors
///
/// `ingest` only fails when there is no stored history to fall back on and the
/// remote cannot be reached; every other failure yields a partial report.
#[async_trait::async_trait]
pub trait Aggregator {
    /// Loads the stored ledger, empty when nothing usable is stored.
    async fn load(&self) -> WalletLedger;

    /// Brings `ledger` up to date with the remote and persists it.
    async fn ingest(&self, ledger: WalletLedger) -> Result<IngestionReport, AggregatorError>;

    /// Removes all stored history.
    async fn clear(&self) -> Result<(), AggregatorError>;

    async fn run(&self) -> Result<IngestionReport, AggregatorError> {
        let ledger = self.load().await;
        self.ingest(ledger).await
    }
}
