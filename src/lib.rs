//! Incremental ingestion of a Solana wallet's native transfer history.
//!
//! Signatures are paged newest first until stored history is reached, each new
//! transaction is fetched through a rate-limited client and classified from its
//! balance deltas, and the merged record set is persisted under a wall-clock
//! budget suited to short-lived hosts.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod service;
pub mod settings;
