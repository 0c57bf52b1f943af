use anyhow::{Context, Result};
use std::sync::Arc;
use storefront_translate::cache::{CacheStore, MemoryCacheStore, SqliteCacheStore};
use storefront_translate::config::{CacheBackend, Config};
use storefront_translate::provider::GoogleTranslateProvider;
use storefront_translate::scheduler;
use storefront_translate::server::{create_router, AppState, TranslationService};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storefront_translate=info".parse()?),
        )
        .init();

    info!("Starting storefront translation service");

    let config = Config::from_env()?;

    let store: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Sqlite => Arc::new(SqliteCacheStore::connect(&config.database_url).await?),
        CacheBackend::Memory => {
            warn!("Using in-memory translation cache; entries are lost on restart");
            Arc::new(MemoryCacheStore::new())
        }
    };

    let provider = GoogleTranslateProvider::new(&config.provider_url, config.provider_timeout)
        .context("Failed to build translation provider client")?;

    let service = TranslationService::new(Arc::clone(&store), Arc::new(provider))
        .with_ttl(config.cache_ttl);

    if config.api_key.is_none() {
        warn!("API_KEY not set, /metrics is unauthenticated");
    }

    let state = AppState {
        service: Arc::new(service),
        api_key: config.api_key.clone(),
    };

    // Keep the scheduler alive for the lifetime of the server
    let _scheduler = scheduler::start_scheduler(store).await?;

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {}", addr);
    axum::serve(listener, create_router(state))
        .await
        .context("Server error")?;

    Ok(())
}
