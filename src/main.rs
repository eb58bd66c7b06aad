use std::{net::SocketAddr, sync::Arc};

use boardgame_api::{
    config::Config,
    db::{self, Cache, PostgresLoader},
    routes::{create_router, AppState},
    services::{Engine, SnapshotLoader},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardgame_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        embeddings_path = %config.embeddings_path.display(),
        cache_enabled = config.redis_url.is_some(),
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database connection pool created");

    if config.run_migrations {
        db::run_migrations(&pool).await?;
    }

    let loader: Arc<dyn SnapshotLoader> =
        Arc::new(PostgresLoader::new(pool, config.embeddings_path.clone()));
    let engine = Engine::load(
        loader.as_ref(),
        config.query_limits(),
        config.embedding_dimension,
    )
    .await?;

    let (cache, cache_writer) = match &config.redis_url {
        Some(url) => {
            let client = db::create_redis_client(url)?;
            let (cache, handle) = Cache::new(client);
            tracing::info!("Redis cache enabled");
            (Some(cache), Some(handle))
        }
        None => (None, None),
    };

    let state = Arc::new(AppState {
        engine: Arc::new(engine),
        loader,
        cache,
        cache_ttl: config.recommendation_cache_ttl,
    });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
