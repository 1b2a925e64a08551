//! Ironwake authority server entry point.

use std::error::Error;
use std::sync::Arc;

use ironwake_api::config::ServerConfig;
use ironwake_api::routes;
use ironwake_api::state::AppState;
use ironwake_api::telemetry;
use ironwake_core::repository::SnapshotRepository;
use ironwake_core::rng::{DeterministicRng, SeededRng};
use ironwake_core::time::SystemTimeSource;
use ironwake_session::application::actor::spawn_authority;
use ironwake_session::application::authority::Authority;
use ironwake_session::application::persistence::{flush, restore};
use ironwake_snapshot_store::memory::InMemorySnapshotRepository;
use ironwake_snapshot_store::pg_snapshot_repository::PgSnapshotRepository;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = ServerConfig::from_env()?;
    let telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Ironwake authority server");

    let rules = Arc::new(config.load_rules()?);

    let repository: Arc<dyn SnapshotRepository> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await?;
            let repository = PgSnapshotRepository::new(pool);
            repository.ensure_schema().await?;
            Arc::new(repository)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, snapshots are kept in memory only");
            Arc::new(InMemorySnapshotRepository::new())
        }
    };

    let store = restore(repository.as_ref()).await?.unwrap_or_default();
    let rng: Box<dyn DeterministicRng> = match config.rng_seed {
        Some(seed) => Box::new(SeededRng::from_seed(seed)),
        None => Box::new(SeededRng::from_entropy()),
    };
    let authority = Authority::new(
        store,
        rules,
        Arc::new(SystemTimeSource),
        rng,
        config.broadcast_capacity,
    );
    let (handle, _authority_task) = spawn_authority(authority);
    let app_state = AppState::new(handle.clone(), Arc::clone(&repository));

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr = config.addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Persist whatever is still pending before exiting.
    if let Err(e) = flush(&handle, repository.as_ref()).await {
        tracing::error!(error = %e, "final flush failed");
    }
    telemetry.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
