/// Weather dashboard service entry point
mod clients;
mod config;
mod domain;
mod errors;
mod handlers;
mod model;
mod repo;
mod routes;
mod services;
mod utils;

use crate::clients::{GeoClient, NotificationDispatcher, WeatherClient};
use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::model::{ForecastSynthesizer, WeatherCache};
use crate::repo::{init_db, UserKvRepo};
use crate::routes::build_router;
use crate::services::{AlertService, HistoryService, WeatherService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("Configuration loaded successfully");

    // Per-user storage
    let kv_repo = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            info!("Database connection pool established");
            init_db(&pool).await?;
            info!("Database schema initialized");
            UserKvRepo::postgres(pool)
        }
        None => {
            warn!("DATABASE_URL not set; alerts, notifications and history are kept in memory");
            UserKvRepo::in_memory()
        }
    };

    // Initialize clients
    let weather_client =
        WeatherClient::new(config.weather_api_url.clone(), config.weather_api_key.clone())?;
    let geo_client = GeoClient::new(
        config.geolocation.url.clone(),
        config.geolocation.enabled,
        Duration::from_secs(config.geolocation.timeout_seconds),
    )?;
    let dispatcher = NotificationDispatcher::new(
        config.alerts.notification_permission,
        config.alerts.webhook_url.clone(),
    )?;

    // Initialize model components
    let cache = WeatherCache::new(config.cache.dedup_window(), config.cache.max_age());
    let synthesizer = match config.forecast_seed {
        Some(seed) => {
            info!("Forecast synthesis seeded with {}", seed);
            ForecastSynthesizer::seeded(seed)
        }
        None => ForecastSynthesizer::from_entropy(),
    };

    // Initialize services
    let weather_service = Arc::new(WeatherService::new(
        weather_client,
        geo_client,
        cache,
        synthesizer,
    ));
    let alert_service = Arc::new(AlertService::new(
        kv_repo.clone(),
        dispatcher,
        config.alerts.debounce(),
    ));
    let history_service = Arc::new(HistoryService::new(kv_repo, config.history_limit));

    // Initialize application state
    let state = AppState {
        weather_service: weather_service.clone(),
        alert_service,
        history_service,
    };

    // Start background tasks
    start_cache_cleanup(config.cache.cleanup_every_seconds, weather_service);

    // Build router
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("weather_dash service listening on {}", config.bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Periodically purge weather cache entries past their max age
fn start_cache_cleanup(interval: u64, weather_service: Arc<WeatherService>) {
    tokio::spawn(async move {
        info!("Starting cache cleanup task (interval: {}s)", interval);
        loop {
            tokio::time::sleep(Duration::from_secs(interval.max(1))).await;
            weather_service.cleanup_cache();
        }
    });
}
