use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use actix_web::{web, HttpServer};

use tl_api::{config, create_app, telemetry, AppState};
use tl_core::domain::entities::principal::Principal;
use tl_core::repositories::{
    InMemoryPrincipalDirectory, InMemorySessionStore, PrincipalDirectory, SessionRepository,
};
use tl_core::services::{
    Clock, SystemClock, TokenCleanupConfig, TokenCleanupService, TokenLifecycleManager,
};
use tl_infra::database::{DatabasePool, MySqlPrincipalDirectory, MySqlSessionStore};
use tl_shared::config::SessionStoreKind;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load()?;
    telemetry::init(&config.logging);

    info!(environment = %config.environment, "Starting Tokenline API server");
    if config.auth.token.is_using_default_secret() {
        warn!("Signing with the built-in development secret; set AUTH_SIGNING_SECRET");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (sessions, directory, database): (
        Arc<dyn SessionRepository>,
        Arc<dyn PrincipalDirectory>,
        Option<DatabasePool>,
    ) = match config.auth.session_store {
        SessionStoreKind::Memory => {
            warn!("Using the in-memory session store; sessions are lost on restart");
            let directory = InMemoryPrincipalDirectory::new();
            if config.environment.is_development() {
                directory
                    .insert(Principal::new("demo", "demo@example.com", "member"))
                    .await;
                info!("Seeded development principal 'demo'");
            }
            (
                Arc::new(InMemorySessionStore::with_clock(clock.clone())),
                Arc::new(directory),
                None,
            )
        }
        SessionStoreKind::MySql => {
            let pool = DatabasePool::new(config.database.clone())
                .await
                .context("Failed to connect to the session database")?;
            let store = MySqlSessionStore::with_clock(pool.get_pool().clone(), clock.clone());
            store
                .ensure_schema()
                .await
                .context("Failed to prepare the token_families table")?;
            let directory = MySqlPrincipalDirectory::new(pool.get_pool().clone());
            info!("{}", pool.get_statistics());
            (Arc::new(store), Arc::new(directory), Some(pool))
        }
    };

    let lifecycle = Arc::new(
        TokenLifecycleManager::from_config(sessions.clone(), &config.auth.token, clock.clone())
            .context("Failed to initialize the signing key ring")?,
    );
    info!(
        algorithm = ?lifecycle.keys().algorithm(),
        keys = ?lifecycle.keys().key_ids(),
        "Signing key ring ready"
    );

    let cleanup = Arc::new(TokenCleanupService::new(
        sessions,
        clock,
        TokenCleanupConfig {
            interval_seconds: config.auth.cleanup_interval_seconds,
            refresh_token_ttl: chrono::Duration::seconds(config.auth.token.refresh_token_ttl),
            enabled: config.auth.cleanup_interval_seconds > 0,
            ..TokenCleanupConfig::default()
        },
    ));
    let _cleanup_task = cleanup.start_background_task();

    let mut state = AppState::new(lifecycle, directory)
        .with_json_limit(config.server.max_payload_size);
    if let Some(pool) = database.clone() {
        state = state.with_database(pool);
    }
    let state = web::Data::new(state);

    let bind_address = config.server.bind_address();
    info!("Server will bind to: {}", bind_address);

    let mut server = HttpServer::new(move || create_app(state.clone()))
        .keep_alive(std::time::Duration::from_secs(config.server.keep_alive));
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run()
        .await?;

    if let Some(pool) = database {
        pool.close().await;
    }

    Ok(())
}
