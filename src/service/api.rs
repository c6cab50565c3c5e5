use crate::{
    application::{
        app::Application,
        stats::{MergeResult, StatsSnapshot},
    },
    domain::errors::AggregatorError,
    infrastructure::shutdown::Shutdown,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

const DEFAULT_RECENT_LIMIT: usize = 10;
const MAX_RECENT_LIMIT: usize = 100;

pub fn router(app: Arc<impl Application + Send + Sync + 'static>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(get_stats))
        .route("/refresh", post(post_refresh))
        .with_state(app)
        .layer(CorsLayer::permissive())
}

pub async fn start_server(
    shutdown: impl Shutdown,
    app: Arc<impl Application + Send + Sync + 'static>,
    listen_port: u16,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", listen_port)).await?;
    let server = axum::serve(listener, router(app));

    tracing::info!("API server started on port {}", listen_port);

    let mut shutdown_rx = shutdown.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => {
            tracing::warn!("API server received shutdown signal");
        }
        result = server => {
            tracing::warn!("API server stopped unexpectedly: {:?}", result);
        }
    }

    Ok(())
}

#[derive(Deserialize)]
struct StatsQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct RefreshQuery {
    #[serde(default)]
    reset: bool,
}

async fn health() -> &'static str {
    "ok"
}

async fn get_stats(
    State(app_state): State<Arc<impl Application>>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<StatsSnapshot>, StatusCode> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .min(MAX_RECENT_LIMIT);
    app_state
        .stats(limit)
        .await
        .map(Json)
        .map_err(to_status)
}

async fn post_refresh(
    State(app_state): State<Arc<impl Application>>,
    Query(params): Query<RefreshQuery>,
) -> Result<Json<MergeResult>, StatusCode> {
    app_state
        .refresh(params.reset)
        .await
        .map(Json)
        .map_err(to_status)
}

fn to_status(err: AggregatorError) -> StatusCode {
    tracing::error!("Request failed: {}", err);
    match err {
        AggregatorError::NoDataAvailable(_) | AggregatorError::FailedSolanaRpcClient(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
