//! AI news digest service: binary entrypoint.
//! Wires config, storage, the fetch pipeline, its scheduler and the HTTP router.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_news_digest::ingest::providers::RssProvider;
use ai_news_digest::metrics::Metrics;
use ai_news_digest::{router, spawn_news_scheduler, AppConfig, AppState, FetchPipeline, SqliteStore};

const DEFAULT_LOG_FILTER: &str = "ai_news_digest=info,ingest=info,pipeline=info,store=info,warn";

/// Compact logs by default, JSON lines when `LOG_FORMAT=json`.
/// The runtime may already have installed a subscriber; that one wins.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    tracing::info!(
        feeds = cfg.feeds.len(),
        db = %cfg.db_path,
        interval_hours = cfg.fetch.interval_hours,
        "configuration loaded"
    );

    let store = SqliteStore::connect(&cfg.db_path)
        .await
        .with_context(|| format!("open news database at {}", cfg.db_path))?;
    let retriever = RssProvider::from_config(&cfg)?;
    let pipeline = Arc::new(FetchPipeline::from_config(
        &cfg,
        Arc::new(retriever),
        Arc::new(store),
    ));

    // Recorder first, so the immediate startup cycle is counted.
    let metrics = Metrics::init(cfg.fetch.interval_hours, cfg.fetch.deadline_secs)?;

    // Runs for the life of the process.
    let _scheduler = spawn_news_scheduler(
        Arc::clone(&pipeline),
        Duration::from_secs(cfg.fetch.interval_hours * 3600),
    );

    let app = router(AppState::new(pipeline)).merge(metrics.router());

    Ok(app.into())
}
