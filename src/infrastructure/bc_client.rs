use crate::domain::errors::BcClientError;
use crate::domain::models::{DetailMode, RawTransaction, SignatureInfo};
use std::sync::Arc;
use tokio::time::Instant;

/// A trait representing a blockchain client for reading a wallet's history.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BcClient {
    /// Retrieves up to `limit` signatures touching `address`, newest first.
    ///
    /// # Arguments
    ///
    /// * `address` - The wallet address whose history is walked.
    /// * `before` - Only signatures older than this one; `None` starts from the most recent.
    /// * `limit` - Maximum number of entries in the page.
    ///
    /// # Returns
    ///
    /// * `Result<Vec<SignatureInfo>, BcClientError>` - The page in remote order, empty at the end of history.
    async fn get_signatures_for_address(
        &self,
        address: &str,
        before: Option<String>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, BcClientError>;

    /// Retrieves the balance-level details of one transaction.
    ///
    /// # Arguments
    ///
    /// * `signature` - The transaction signature.
    /// * `mode` - How much detail the remote should encode.
    ///
    /// # Returns
    ///
    /// * `Result<RawTransaction, BcClientError>` - The transaction if the remote knows it.
    async fn get_transaction(
        &self,
        signature: &str,
        mode: DetailMode,
    ) -> Result<RawTransaction, BcClientError>;

    /// Like [`BcClient::get_transaction`], but never sends the request at or after `deadline`.
    ///
    /// # Returns
    ///
    /// * `Err(BcClientError::DeadlineReached)` - The request was not sent in time.
    async fn get_transaction_before(
        &self,
        signature: &str,
        mode: DetailMode,
        deadline: Instant,
    ) -> Result<RawTransaction, BcClientError> {
        if Instant::now() >= deadline {
            return Err(BcClientError::DeadlineReached);
        }
        self.get_transaction(signature, mode).await
    }
}

#[async_trait::async_trait]
impl<T> BcClient for Arc<T>
where
    T: BcClient + Send + Sync + ?Sized,
{
    async fn get_signatures_for_address(
        &self,
        address: &str,
        before: Option<String>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, BcClientError> {
        (**self)
            .get_signatures_for_address(address, before, limit)
            .await
    }

    async fn get_transaction(
        &self,
        signature: &str,
        mode: DetailMode,
    ) -> Result<RawTransaction, BcClientError> {
        (**self).get_transaction(signature, mode).await
    }

    async fn get_transaction_before(
        &self,
        signature: &str,
        mode: DetailMode,
        deadline: Instant,
    ) -> Result<RawTransaction, BcClientError> {
        (**self)
            .get_transaction_before(signature, mode, deadline)
            .await
    }
}
