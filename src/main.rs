//! Switchboard server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use switchboard::auth::SqliteKeyStore;
use switchboard::cache::{ExactCache, RedisExactCache, SemanticCache, SemanticCacheConfig};
use switchboard::config::{GatewayConfig, Settings};
use switchboard::dlp::{PiiDetector, RegexDetector};
use switchboard::embedding::{EmbedderConfig, TextEmbedder};
use switchboard::gateway::{AppState, SERVICE_NAME, create_router};
use switchboard::providers::ProviderRegistry;
use switchboard::ratelimit::{RateLimitPolicy, RateLimiter};
use switchboard::vectordb::QdrantIndex;
use switchboard::{metrics, vectordb};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = Settings::from_env()?;

    tracing::info!(
        bind_addr = %settings.bind_addr,
        port = settings.port,
        "{} starting",
        SERVICE_NAME
    );

    // Missing routing table is fatal: the gateway cannot resolve anything.
    let routing = GatewayConfig::load(&settings.config_path)?;
    tracing::info!(
        providers = routing.providers.len(),
        config = %settings.config_path.display(),
        "provider routing table loaded"
    );

    metrics::init()?;

    let key_store = Arc::new(SqliteKeyStore::connect(&settings.database_url).await?);

    let exact_backend = RedisExactCache::connect(&settings.redis_url()).await?;
    let exact_cache = ExactCache::new(
        exact_backend,
        std::time::Duration::from_secs(settings.cache_ttl_secs),
    );

    let embedder_config = match &settings.model_dir {
        Some(dir) => EmbedderConfig::new(dir.clone()),
        None => {
            tracing::warn!("no SWITCHBOARD_MODEL_DIR configured, running embedder in stub mode");
            EmbedderConfig::stub()
        }
    };
    let embedder = Arc::new(TextEmbedder::load(embedder_config)?);

    let index = QdrantIndex::connect(&settings.qdrant_url)?;
    let semantic_config = SemanticCacheConfig::default()
        .similarity_threshold(settings.similarity_threshold);
    let semantic_cache = SemanticCache::new(embedder, index, semantic_config)?;
    semantic_cache.ensure_collection().await?;
    tracing::info!(
        collection = vectordb::SEMANTIC_COLLECTION_NAME,
        "semantic index ready"
    );

    let registry = ProviderRegistry::new(routing);
    let detector: Arc<dyn PiiDetector> = Arc::new(RegexDetector::new()?);
    let limiter = RateLimiter::new(RateLimitPolicy::per_minute(settings.rate_limit_per_minute));

    let state = AppState::new(
        exact_cache,
        semantic_cache,
        key_store,
        registry,
        detector,
        limiter,
    );

    let app = create_router(state);
    let addr: SocketAddr = settings.socket_addr().parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("{} shutdown complete", SERVICE_NAME);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}
