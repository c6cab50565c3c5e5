use crate::domain::errors::BcClientError;
use crate::domain::models::SignatureInfo;
use crate::infrastructure::bc_client::BcClient;
use std::sync::Arc;

/// One page of the signature index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignaturePage {
    /// Entries in remote order, newest first
    pub signatures: Vec<SignatureInfo>,
    /// Cursor for the following, older page
    pub next_cursor: Option<String>,
    /// The remote returned nothing: absolute end of history
    pub exhausted: bool,
}

/// Walks a wallet's signature index backward in time.
///
/// Storage agnostic: deciding when history is caught up is left to the caller.
#[derive(Clone)]
pub struct SignaturePager<C> {
    client: Arc<C>,
    address: String,
}

impl<C> SignaturePager<C>
where
    C: BcClient + Send + Sync,
{
    pub fn new(client: Arc<C>, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }

    /// Fetches up to `batch_size` signatures older than `before` with a single request.
    pub async fn next_batch(
        &self,
        before: Option<String>,
        batch_size: usize,
    ) -> Result<SignaturePage, BcClientError> {
        let signatures = self
            .client
            .get_signatures_for_address(&self.address, before.clone(), batch_size)
            .await?;
        tracing::debug!(
            "Fetched {} signatures for {} before {:?}",
            signatures.len(),
            self.address,
            before
        );

        let exhausted = signatures.is_empty();
        let next_cursor = signatures
            .last()
            .map(|info| info.signature.clone())
            .or(before);

        Ok(SignaturePage {
            signatures,
            next_cursor,
            exhausted,
        })
    }
}
