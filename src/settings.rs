//! Configuration surface: an optional TOML file, overridden field by field from
//! the command line or environment.

use crate::domain::config::PipelineConfig;
use crate::domain::errors::AggregatorError;
use crate::domain::models::DetailMode;
use anyhow::Context;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_LISTEN_PORT: u16 = 3000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Long-running host
    #[default]
    Standard,
    /// Short-lived invocation with a tight budget
    Serverless,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// One JSON document per wallet under the data directory
    #[default]
    File,
    /// Process memory only
    Memory,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, clap::Args)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// RPC endpoint
    #[arg(short, long, env = "WALLET_TRACKER_RPC_ENDPOINT")]
    pub rpc_endpoint: Option<String>,

    /// Wallet address to track
    #[arg(short, long, env = "WALLET_TRACKER_ADDRESS")]
    pub wallet_address: Option<String>,

    #[arg(long, value_enum)]
    pub storage: Option<StorageKind>,

    /// Directory for stored record sets
    #[arg(long, env = "WALLET_TRACKER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Listen port REST API
    #[arg(short, long)]
    pub listen_port: Option<u16>,

    /// Base profile the remaining options override
    #[arg(long, value_enum)]
    pub profile: Option<Profile>,

    #[arg(long)]
    pub requests_per_second: Option<f64>,

    /// Number of retries
    #[arg(long)]
    pub max_retries: Option<usize>,

    #[arg(long)]
    pub initial_backoff_ms: Option<u64>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub max_batches: Option<usize>,

    #[arg(long)]
    pub deadline_secs: Option<u64>,

    #[arg(long)]
    pub staleness_secs: Option<u64>,

    #[arg(long)]
    pub item_delay_ms: Option<u64>,

    #[arg(long)]
    pub detail_concurrency: Option<usize>,

    #[arg(long, value_parser = parse_detail_mode)]
    pub detail_mode: Option<DetailMode>,

    #[arg(long)]
    pub save_debounce_ms: Option<u64>,
}

fn parse_detail_mode(value: &str) -> Result<DetailMode, String> {
    match value {
        "full" => Ok(DetailMode::Full),
        "fast" => Ok(DetailMode::Fast),
        other => Err(format!("unknown detail mode `{other}`, expected full or fast")),
    }
}

impl Settings {
    /// Reads the TOML file at `path`, or returns empty settings without one.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Fields set in `overrides` win.
    pub fn overlay(self, overrides: Settings) -> Self {
        Self {
            rpc_endpoint: overrides.rpc_endpoint.or(self.rpc_endpoint),
            wallet_address: overrides.wallet_address.or(self.wallet_address),
            storage: overrides.storage.or(self.storage),
            data_dir: overrides.data_dir.or(self.data_dir),
            listen_port: overrides.listen_port.or(self.listen_port),
            profile: overrides.profile.or(self.profile),
            requests_per_second: overrides.requests_per_second.or(self.requests_per_second),
            max_retries: overrides.max_retries.or(self.max_retries),
            initial_backoff_ms: overrides.initial_backoff_ms.or(self.initial_backoff_ms),
            batch_size: overrides.batch_size.or(self.batch_size),
            max_batches: overrides.max_batches.or(self.max_batches),
            deadline_secs: overrides.deadline_secs.or(self.deadline_secs),
            staleness_secs: overrides.staleness_secs.or(self.staleness_secs),
            item_delay_ms: overrides.item_delay_ms.or(self.item_delay_ms),
            detail_concurrency: overrides.detail_concurrency.or(self.detail_concurrency),
            detail_mode: overrides.detail_mode.or(self.detail_mode),
            save_debounce_ms: overrides.save_debounce_ms.or(self.save_debounce_ms),
        }
    }

    pub fn rpc_endpoint(&self) -> anyhow::Result<&str> {
        self.rpc_endpoint
            .as_deref()
            .context("no RPC endpoint configured (--rpc-endpoint or rpc_endpoint in the config file)")
    }

    pub fn wallet_address(&self) -> anyhow::Result<&str> {
        let address = self
            .wallet_address
            .as_deref()
            .context("no wallet configured (--wallet-address or wallet_address in the config file)")?;
        Pubkey::from_str(address).with_context(|| format!("invalid wallet address {address}"))?;
        Ok(address)
    }

    pub fn storage(&self) -> StorageKind {
        self.storage.unwrap_or_default()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port.unwrap_or(DEFAULT_LISTEN_PORT)
    }

    /// The selected profile with every explicitly set option applied, validated.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, AggregatorError> {
        let mut config = match self.profile.unwrap_or_default() {
            Profile::Standard => PipelineConfig::standard(),
            Profile::Serverless => PipelineConfig::serverless(),
        };

        if let Some(rps) = self.requests_per_second {
            config.rate_limit.requests_per_second = rps;
        }
        if let Some(retries) = self.max_retries {
            config.rate_limit.max_retries = retries;
        }
        if let Some(ms) = self.initial_backoff_ms {
            config.rate_limit.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        if let Some(batches) = self.max_batches {
            config.max_batches = batches;
        }
        if let Some(secs) = self.deadline_secs {
            config.deadline = Duration::from_secs(secs);
        }
        if let Some(secs) = self.staleness_secs {
            config.staleness_window = Duration::from_secs(secs);
        }
        if let Some(ms) = self.item_delay_ms {
            config.item_delay = Duration::from_millis(ms);
        }
        if let Some(concurrency) = self.detail_concurrency {
            config.detail_concurrency = concurrency;
        }
        if let Some(mode) = self.detail_mode {
            config.detail_mode = mode;
        }
        if let Some(ms) = self.save_debounce_ms {
            config.save_debounce = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_are_overridden_by_cli() {
        let file: Settings = toml::from_str(
            r#"
            rpc_endpoint = "https://file.example"
            profile = "serverless"
            batch_size = 50
            detail_mode = "full"
            "#,
        )
        .unwrap();
        let cli = Settings {
            batch_size: Some(5),
            ..Settings::default()
        };

        let settings = file.overlay(cli);
        assert_eq!(settings.rpc_endpoint().unwrap(), "https://file.example");

        let config = settings.pipeline_config().unwrap();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.detail_mode, DetailMode::Full);
        assert_eq!(config.max_batches, PipelineConfig::serverless().max_batches);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Settings>("batchsize = 3").is_err());
    }

    #[test]
    fn invalid_overrides_fail_validation() {
        for rps in [-1.0, 1e-30] {
            let settings = Settings {
                requests_per_second: Some(rps),
                ..Settings::default()
            };
            assert!(settings.pipeline_config().is_err());
        }

        let settings = Settings {
            deadline_secs: Some(u64::MAX),
            ..Settings::default()
        };
        assert!(settings.pipeline_config().is_err());
    }

    #[test]
    fn wallet_address_must_be_a_pubkey() {
        let settings = Settings {
            wallet_address: Some("not-a-key".to_string()),
            ..Settings::default()
        };
        assert!(settings.wallet_address().is_err());

        let settings = Settings {
            wallet_address: Some(Pubkey::new_unique().to_string()),
            ..Settings::default()
        };
        assert!(settings.wallet_address().is_ok());
    }

    #[test]
    fn defaults_apply_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.listen_port(), DEFAULT_LISTEN_PORT);
        assert_eq!(settings.storage(), StorageKind::File);
        assert_eq!(settings.pipeline_config().unwrap(), PipelineConfig::standard());
    }
}
