//! CodeDiff API Server
//!
//! REST API for contract source comparison
//!
//! Usage:
//!   cargo run --bin codediff_api
//!
//! Environment:
//!   CODEDIFF_PORT      - Server port (default: 8080, PORT also honored)
//!   CODEDIFF_HOST      - Server host (default: 0.0.0.0)
//!   CODEDIFF_CACHE_DIR - Persist the cache on disk (default: in memory)
//!   ETHERSCAN_API_KEY / ETHERSCAN_FALLBACK_KEYS - explorer key pool

use codediff::api::{create_router, handlers::AppState, start_cleanup_task};
use codediff::{ExplorerConfig, FileStore, KeyValueStore, MemoryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    let config = ExplorerConfig::from_env()?;
    if config.configured_keys().is_empty() {
        warn!("⚠️ No explorer keys configured; requests must carry apiKey");
    }

    let store: Arc<dyn KeyValueStore> = match std::env::var("CODEDIFF_CACHE_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            info!("💾 Cache directory: {}", dir);
            Arc::new(FileStore::open(dir.trim())?)
        }
        _ => Arc::new(MemoryStore::new()),
    };

    let state = Arc::new(AppState::new(&config, store)?);
    let shutdown = state.shutdown.clone();

    start_cleanup_task();
    info!("🧹 Background cleanup task started");

    let app = create_router(state.clone());

    let host = std::env::var("CODEDIFF_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("CODEDIFF_PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("🚀 CodeDiff API starting on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /v1/compare  - Compare two contract implementations");
    info!("  GET  /v1/chains   - Supported chains");
    info!("  GET  /v1/health   - Health check");
    info!("Press Ctrl+C for graceful shutdown");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        // Stop in-flight comparisons waiting on backoff
        shutdown.cancel();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    let stats = state.cache.stats();
    info!("🛑 Shutdown complete");
    info!(
        "   Cache: {} hits, {} misses ({:.1}% hit rate), {} write failures",
        stats.hits, stats.misses, stats.hit_rate, stats.write_failures
    );

    Ok(())
}
