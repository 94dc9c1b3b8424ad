use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tollgate::config::{StorageBackend, TollgateConfig};
use tollgate::health::HealthChecker;
use tollgate::http::{AppState, HttpServer};
use tollgate::ratelimit::{
    FailOpen, FixedWindowRateLimiter, InMemoryCounterStore, RateLimiter, RedisCounterStore,
};

/// Upper bound on how long expired in-memory counters linger.
const MAX_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Fixed-window rate limiting service backed by a shared counter store.
#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!("Starting Tollgate Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TollgateConfig::load(cli.config.as_deref())?;
    let limits = config.rate_limit.to_limit_config()?;
    info!(
        addr = %config.server.addr(),
        limit = limits.limit(),
        window = %limits.window(),
        backend = ?config.storage.backend,
        "Configuration loaded"
    );

    let timeout = config.storage.timeout();
    let health = HealthChecker::new(timeout);
    let (limiter, health): (Arc<dyn RateLimiter>, HealthChecker) = match config.storage.backend {
        StorageBackend::Redis => {
            let store = Arc::new(RedisCounterStore::new(&config.storage.redis_url)?);
            let limiter: Arc<dyn RateLimiter> = Arc::new(FixedWindowRateLimiter::new(
                limits,
                FailOpen::with_timeout(store.clone(), timeout),
            ));
            (limiter, health.with_probe("redis", store))
        }
        StorageBackend::Memory => {
            let store = Arc::new(InMemoryCounterStore::new());
            let purge_every = limits.window().to_std().min(MAX_PURGE_INTERVAL);
            InMemoryCounterStore::spawn_purger(&store, purge_every);
            let limiter: Arc<dyn RateLimiter> = Arc::new(FixedWindowRateLimiter::new(
                limits,
                FailOpen::with_timeout(store.clone(), timeout),
            ));
            (limiter, health.with_probe("memory", store))
        }
    };
    info!("Rate limiter initialized");

    let server = HttpServer::new(config.server.addr(), AppState::new(limiter, Arc::new(health)));
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Tollgate Rate Limiting Service stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
