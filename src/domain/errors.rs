use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Failed solana rpc client: {0}")]
    FailedSolanaRpcClient(#[from] BcClientError),
    #[error("No stored history and remote unavailable: {0}")]
    NoDataAvailable(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Storage failure: {0}")]
    Storage(#[from] DataStorageError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BcClientError {
    #[error("Rate limited by remote: {0}")]
    RateLimited(String),
    #[error("Transient remote failure: {0}")]
    Transient(String),
    #[error("Remote rpc error: {0}")]
    Rpc(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Deadline reached before the request could be sent")]
    DeadlineReached,
}

impl BcClientError {
    /// Rate limits, timeouts and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Transient(_))
    }
}

#[derive(Error, Debug)]
pub enum DataStorageError {
    #[error("Storage io failure")]
    Io(#[from] std::io::Error),
    #[error("Failed to (de)serialize record set")]
    Serialization(#[from] serde_json::Error),
    #[error("Stored record set is corrupt: {0}")]
    Corrupt(String),
}
