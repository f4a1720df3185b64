use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ootd_api::{
    api::{create_router, state::Backends, AppState},
    config::{Config, ExposureBackend},
    db::{
        create_pool, create_redis_client, Cache, CacheWriterHandle, ClosetRepository,
        HyperparamStore, InMemoryClosetRepository, InMemoryHyperparamStore,
        InMemoryRecommendationHistory, PostgresClosetRepository, PostgresHyperparamStore,
        PostgresRecommendationHistory, RecommendationHistory,
    },
    services::{
        exposure::{
            ExposureHistory, InMemoryExposureHistory, PostgresExposureHistory,
            RedisExposureHistory,
        },
        providers::{CachedEmbedder, ClipEmbedder, Embedder, MlScorer},
        RecommenderSettings,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ootd_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let (state, cache_writer) = build_state(&config).await?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn build_state(config: &Config) -> anyhow::Result<(AppState, Option<CacheWriterHandle>)> {
    let upstream_timeout = Duration::from_millis(config.upstream_timeout_ms);
    let image_timeout = Duration::from_millis(config.image_encode_timeout_ms);
    let exposure_config = config.exposure();

    let pool = match &config.database_url {
        Some(url) => Some(create_pool(url).await.context("Failed to connect to Postgres")?),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            None
        }
    };
    let redis = match &config.redis_url {
        Some(url) => Some(create_redis_client(url)?),
        None => None,
    };

    let closet: Arc<dyn ClosetRepository> = match &pool {
        Some(pool) => Arc::new(PostgresClosetRepository::new(pool.clone())),
        None => Arc::new(InMemoryClosetRepository::new()),
    };
    let hyperparams: Arc<dyn HyperparamStore> = match &pool {
        Some(pool) => Arc::new(PostgresHyperparamStore::new(pool.clone())),
        None => Arc::new(InMemoryHyperparamStore::new()),
    };
    let history: Arc<dyn RecommendationHistory> = match &pool {
        Some(pool) => Arc::new(PostgresRecommendationHistory::new(pool.clone())),
        None => Arc::new(InMemoryRecommendationHistory::new()),
    };

    let exposure: Arc<dyn ExposureHistory> = match config.exposure_backend {
        ExposureBackend::Memory => Arc::new(InMemoryExposureHistory::new(exposure_config.lookback)),
        ExposureBackend::Redis => {
            let client = redis
                .clone()
                .context("EXPOSURE_BACKEND=redis requires REDIS_URL")?;
            Arc::new(RedisExposureHistory::new(client, exposure_config.lookback))
        }
        ExposureBackend::Postgres => {
            let pool = pool
                .clone()
                .context("EXPOSURE_BACKEND=postgres requires DATABASE_URL")?;
            Arc::new(PostgresExposureHistory::new(pool))
        }
    };
    tracing::info!(backend = ?config.exposure_backend, "Exposure history configured");

    let clip = ClipEmbedder::new(config.embedder_url.clone(), upstream_timeout, image_timeout)?;
    let mut cache_writer = None;
    let embedder: Arc<dyn Embedder> = match redis {
        Some(client) => {
            let (cache, handle) = Cache::new(client).await;
            cache_writer = Some(handle);
            Arc::new(CachedEmbedder::new(clip, cache))
        }
        None => Arc::new(clip),
    };

    let scorer = Arc::new(MlScorer::new(config.scorer_url.clone(), upstream_timeout)?);

    let settings = RecommenderSettings {
        retrieval_top_k: config.retrieval_top_k,
        scorer_top_k: config.scorer_top_k,
        upstream_timeout,
        exposure: exposure_config,
    };

    let backends = Backends {
        closet,
        hyperparams,
        history,
        exposure,
        scorer,
        embedder,
    };
    Ok((AppState::new(backends, settings, config.sampler_seed), cache_writer))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
