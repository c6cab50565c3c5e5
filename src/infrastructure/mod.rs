pub mod bc_client;
pub mod file_store;
pub mod memory;
pub mod rate_limiter;
pub mod shutdown;
pub mod solana_client;
