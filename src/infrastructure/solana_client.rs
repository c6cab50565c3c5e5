use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_client::GetConfirmedSignaturesForAddress2Config,
    rpc_config::RpcTransactionConfig,
    rpc_request::RpcError,
};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};
use solana_transaction_status::{
    option_serializer::OptionSerializer, EncodedConfirmedTransactionWithStatusMeta,
    EncodedTransaction, UiMessage, UiTransactionEncoding, UiTransactionStatusMeta,
};
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::errors::BcClientError;
use crate::domain::models::{DetailMode, RawMeta, RawTransaction, SignatureInfo};

use super::bc_client::BcClient;

/// A client for reading wallet history from the Solana blockchain.
///
/// Performs exactly one remote call per method; throttling and retries are
/// layered on top by [`super::rate_limiter::RateLimitedClient`].
#[derive(Clone)]
pub struct SolanaClient {
    rpc_client: Arc<RpcClient>,
}

impl SolanaClient {
    /// Creates a new `SolanaClient` instance from the given RPC URL.
    ///
    /// # Arguments
    ///
    /// * `rpc_url` - The URL of the Solana RPC endpoint.
    ///
    /// # Returns
    ///
    /// A new `SolanaClient` instance.
    pub fn from_url(rpc_url: &str) -> Self {
        Self {
            rpc_client: Arc::new(RpcClient::new_with_commitment(
                rpc_url.to_string(),
                CommitmentConfig::confirmed(),
            )),
        }
    }
}

#[async_trait::async_trait]
impl BcClient for SolanaClient {
    async fn get_signatures_for_address(
        &self,
        address: &str,
        before: Option<String>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, BcClientError> {
        let address = Pubkey::from_str(address)
            .map_err(|e| BcClientError::InvalidInput(format!("address {address}: {e}")))?;
        let before = before
            .map(|sig| {
                Signature::from_str(&sig)
                    .map_err(|e| BcClientError::InvalidInput(format!("cursor {sig}: {e}")))
            })
            .transpose()?;

        let statuses = self
            .rpc_client
            .get_signatures_for_address_with_config(
                &address,
                GetConfirmedSignaturesForAddress2Config {
                    before,
                    until: None,
                    limit: Some(limit),
                    commitment: Some(CommitmentConfig::confirmed()),
                },
            )
            .await
            .map_err(map_client_error)?;

        Ok(statuses
            .into_iter()
            .map(|status| SignatureInfo {
                signature: status.signature,
                slot: status.slot,
                block_time: status.block_time,
                err: status.err.map(|e| e.to_string()),
            })
            .collect())
    }

    async fn get_transaction(
        &self,
        signature: &str,
        mode: DetailMode,
    ) -> Result<RawTransaction, BcClientError> {
        let parsed = Signature::from_str(signature)
            .map_err(|e| BcClientError::InvalidInput(format!("signature {signature}: {e}")))?;
        let encoding = match mode {
            DetailMode::Full => UiTransactionEncoding::JsonParsed,
            DetailMode::Fast => UiTransactionEncoding::Json,
        };

        let tx = self
            .rpc_client
            .get_transaction_with_config(
                &parsed,
                RpcTransactionConfig {
                    encoding: Some(encoding),
                    commitment: Some(CommitmentConfig::confirmed()),
                    max_supported_transaction_version: Some(0),
                },
            )
            .await
            .map_err(map_client_error)?;

        Ok(into_raw_transaction(tx))
    }
}

fn into_raw_transaction(tx: EncodedConfirmedTransactionWithStatusMeta) -> RawTransaction {
    let EncodedConfirmedTransactionWithStatusMeta {
        slot,
        transaction,
        block_time,
    } = tx;

    let mut account_keys = Vec::new();
    let mut keys_include_loaded = false;
    match &transaction.transaction {
        EncodedTransaction::Json(ui) => match &ui.message {
            UiMessage::Parsed(message) => {
                keys_include_loaded = true;
                account_keys.extend(message.account_keys.iter().map(|k| k.pubkey.clone()));
            }
            UiMessage::Raw(message) => account_keys.extend(message.account_keys.iter().cloned()),
        },
        encoded => {
            if let Some(decoded) = encoded.decode() {
                account_keys.extend(
                    decoded
                        .message
                        .static_account_keys()
                        .iter()
                        .map(|k| k.to_string()),
                );
            }
        }
    }

    if let Some(meta) = &transaction.meta {
        if !keys_include_loaded {
            append_loaded_addresses(&mut account_keys, meta);
        }
    }

    RawTransaction {
        slot,
        block_time,
        account_keys,
        meta: transaction.meta.map(|meta| RawMeta {
            err: meta.err.map(|e| e.to_string()),
            pre_balances: meta.pre_balances,
            post_balances: meta.post_balances,
        }),
    }
}

// v0 transactions list lookup-table accounts after the static keys.
fn append_loaded_addresses(account_keys: &mut Vec<String>, meta: &UiTransactionStatusMeta) {
    if let OptionSerializer::Some(loaded) = &meta.loaded_addresses {
        account_keys.extend(loaded.writable.iter().cloned());
        account_keys.extend(loaded.readonly.iter().cloned());
    }
}

fn map_client_error(err: ClientError) -> BcClientError {
    let message = err.to_string();
    match err.kind() {
        ClientErrorKind::Reqwest(e) => {
            let status = e.status();
            if status.map(|s| s.as_u16()) == Some(429) {
                BcClientError::RateLimited(message)
            } else if e.is_timeout() || status.is_some_and(|s| s.is_server_error()) {
                BcClientError::Transient(message)
            } else {
                BcClientError::Rpc(message)
            }
        }
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. }) if *code == 429 => {
            BcClientError::RateLimited(message)
        }
        _ if message.contains("429") || message.contains("Too Many Requests") => {
            BcClientError::RateLimited(message)
        }
        _ => BcClientError::Rpc(message),
    }
}
