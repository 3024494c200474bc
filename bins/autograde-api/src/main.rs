mod handlers;
mod language_config;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use autograde_common::config::EngineConfig;
use autograde_common::redis::RedisJobStore;
use autograde_common::store::{JobStore, MemoryJobStore};
use autograde_engine::{BackendRouter, GradingAggregator, JobTracker, TestRunner};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct AppState {
    pub config: EngineConfig,
    pub router: BackendRouter,
    pub tracker: JobTracker,
}

impl AppState {
    pub fn new(config: EngineConfig, router: BackendRouter, store: Arc<dyn JobStore>) -> Self {
        let aggregator = GradingAggregator::new(TestRunner::new(router.clone(), config.clone()));
        Self {
            config,
            router,
            tracker: JobTracker::new(aggregator, store),
        }
    }
}

async fn job_store() -> Result<Arc<dyn JobStore>> {
    match std::env::var("REDIS_URL") {
        Ok(url) => {
            let store = RedisJobStore::connect(&url)
                .await
                .with_context(|| format!("Failed to connect to Redis at {}", url))?;
            info!("Connected to Redis: {}", url);
            Ok(Arc::new(store))
        }
        Err(_) => {
            warn!("REDIS_URL not set, sandbox jobs are kept in memory only");
            Ok(Arc::new(MemoryJobStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Autograde API booting...");

    let config = EngineConfig::from_env();
    info!(
        remote = config.remote_enabled,
        remote_url = %config.remote_url,
        sandbox_dir = %config.sandbox_dir.display(),
        default_timeout_secs = config.default_timeout_secs,
        "Engine configuration loaded"
    );

    let router = BackendRouter::from_config(&config)?;
    let state = Arc::new(AppState::new(config, router, job_store().await?));

    let app = routes::routes().with_state(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);
    info!("Ready to grade submissions");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
