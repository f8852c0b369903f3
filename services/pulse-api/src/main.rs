//! GreenPulse API service.
//!
//! Polls WAQI station feeds for the configured cities, aggregates live
//! snapshots, and serves them over HTTP, SSE, and WebSocket alongside a
//! RAG-backed policy chat.

use anyhow::Result;
use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pulse_api::config::{CitiesConfig, EnvConfig};
use pulse_api::handlers::{self, api::DashboardHtml};
use pulse_api::poller::Poller;
use pulse_api::state::AppState;
use waqi_client::WaqiClient;

#[derive(Parser, Debug)]
#[command(name = "pulse-api")]
#[command(about = "GreenPulse air quality monitoring server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory holding cities.yaml (built-in roster when absent)
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Directory holding the dashboard page (bundled page when absent)
    #[arg(long, default_value = "static")]
    static_dir: PathBuf,

    /// Poll interval in seconds (overrides REFRESH_INTERVAL)
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Serve API only, without the background poller
    #[arg(long)]
    no_poller: bool,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main(args))?;
    Ok(())
}

async fn async_main(args: Args) -> Result<()> {
    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    info!("Starting GreenPulse API server");

    let env = EnvConfig::from_env();
    if env.google_api_key.is_none() {
        warn!("GOOGLE_API_KEY not set, chat runs in degraded placeholder mode");
    }

    let cities = CitiesConfig::load_from_dir(&args.config_dir)?;
    let state = Arc::new(AppState::new(cities, env.google_api_key.clone()));

    // Build the policy index in the background so first chat is fast
    state.rag.ensure_started();

    let poll_interval = args
        .poll_interval
        .map(Duration::from_secs)
        .unwrap_or(env.refresh_interval);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut poller_handle = None;
    if args.no_poller {
        warn!("Poller disabled, /api/snapshot will stay empty");
    } else {
        let client = WaqiClient::new(env.waqi_token.clone())?;
        let poller = Poller::new(state.clone(), client, poll_interval);
        poller_handle = Some(tokio::spawn(poller.run(shutdown_tx.subscribe())));
    }

    let dashboard = Arc::new(load_dashboard(&args.static_dir));

    // Build router
    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/app", get(handlers::api::app_page))
        // Snapshot API
        .route("/api/snapshot", get(handlers::api::snapshot))
        .route("/api/cities", get(handlers::api::cities))
        .route("/api/cities/select", post(handlers::api::select_cities))
        // Chat API
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/chat/stream", post(handlers::chat::chat_stream))
        .route("/api/rag/status", get(handlers::chat::rag_status))
        .route("/api/rag/preload", post(handlers::chat::rag_preload))
        // Live updates
        .route("/ws/stream", get(handlers::ws::ws_stream))
        // Health and metrics
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Layer extensions
        .layer(Extension(state))
        .layer(Extension(dashboard))
        .layer(Extension(prometheus_handle))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    // Parse listen address
    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    // Start server with graceful shutdown on ctrl-c
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, signalling background tasks");
    let _ = shutdown_tx.send(());
    if let Some(handle) = poller_handle {
        let _ = handle.await;
    }

    Ok(())
}

/// Resolve the dashboard page, preferring an on-disk override.
fn load_dashboard(static_dir: &std::path::Path) -> DashboardHtml {
    let path = static_dir.join("index.html");
    match std::fs::read_to_string(&path) {
        Ok(page) => {
            info!(path = %path.display(), "Serving dashboard from disk");
            DashboardHtml(page)
        }
        Err(_) => DashboardHtml(include_str!("../static/index.html").to_string()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
