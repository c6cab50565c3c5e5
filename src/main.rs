use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use wallet_tx_tracker::application::app::{App, Application};
use wallet_tx_tracker::application::gateway::PersistenceGateway;
use wallet_tx_tracker::application::orchestrator::BudgetedOrchestrator;
use wallet_tx_tracker::domain::models::DataStorage;
use wallet_tx_tracker::infrastructure::file_store::FileStore;
use wallet_tx_tracker::infrastructure::memory::InMemoryDatabase;
use wallet_tx_tracker::infrastructure::rate_limiter::RateLimitedClient;
use wallet_tx_tracker::infrastructure::shutdown::ShutdownChannel;
use wallet_tx_tracker::infrastructure::solana_client::SolanaClient;
use wallet_tx_tracker::service;
use wallet_tx_tracker::settings::{Settings, StorageKind};

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Incremental Solana wallet transfer tracker with REST API"
)]
struct TrackerProgram {
    /// TOML config file; command line options override its values
    #[arg(short, long, env = "WALLET_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve wallet statistics over HTTP
    Serve,
    /// Run one bounded ingestion and print the merge result
    Refresh {
        /// Drop all stored history first
        #[arg(long)]
        reset: bool,
    },
    /// Print statistics, ingesting first when they are stale
    Stats {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = TrackerProgram::parse();
    let settings = Settings::load(args.config.as_deref())?.overlay(args.settings);

    match settings.storage() {
        StorageKind::File => {
            let storage = Arc::new(FileStore::new(settings.data_dir()));
            run(args.command, &settings, storage).await
        }
        StorageKind::Memory => {
            let storage = Arc::new(InMemoryDatabase::default());
            run(args.command, &settings, storage).await
        }
    }
}

async fn run<D>(command: Command, settings: &Settings, storage: Arc<D>) -> Result<()>
where
    D: DataStorage + Send + Sync + 'static,
{
    let config = settings.pipeline_config()?;
    let wallet = settings.wallet_address()?;
    let client = Arc::new(RateLimitedClient::new(
        SolanaClient::from_url(settings.rpc_endpoint()?),
        config.rate_limit.clone(),
    ));
    let gateway = Arc::new(PersistenceGateway::new(storage, wallet, config.save_debounce));
    let staleness_window = config.staleness_window;
    let orchestrator = BudgetedOrchestrator::builder()
        .client(client)
        .gateway(gateway)
        .config(config)
        .build();
    let app = Arc::new(App::new(orchestrator, staleness_window));

    match command {
        Command::Serve => serve(app, settings.listen_port()).await,
        Command::Refresh { reset } => {
            let result = app.refresh(reset).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Stats { limit } => {
            let snapshot = app.stats(limit).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}

async fn serve(app: Arc<impl Application + Send + Sync + 'static>, listen_port: u16) -> Result<()> {
    let shutdown = ShutdownChannel::default();

    // Start the API server
    let server_handle = tokio::spawn(service::api::start_server(
        shutdown.clone(),
        app,
        listen_port,
    ));

    signal::ctrl_c().await?;
    tracing::warn!("Received Ctrl+C, shutting down...");
    shutdown.trigger();

    if let Err(e) = server_handle.await? {
        tracing::error!("API server error: {:?}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
