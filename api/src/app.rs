//! Application state and factory
//!
//! This module holds the shared application state and provides the factory
//! for creating the Actix-web application.

use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    web, App, Error, HttpResponse,
};
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

use tl_core::repositories::{PrincipalDirectory, SessionRepository};
use tl_core::services::TokenLifecycleManager;
use tl_infra::database::DatabasePool;
use tl_shared::errors::{error_codes, ErrorResponse};

use crate::handlers::json_error_handler;
use crate::middleware::AccessVerifier;
use crate::routes;

const DEFAULT_JSON_LIMIT: usize = 16 * 1024;

/// State shared by all workers
pub struct AppState {
    /// Token lifecycle manager over the configured session store
    pub lifecycle: Arc<TokenLifecycleManager<dyn SessionRepository>>,
    /// Resolves principal ids at issuance
    pub directory: Arc<dyn PrincipalDirectory>,
    /// Present when sessions live in MySQL; checked by `/health`
    pub database: Option<DatabasePool>,
    /// Maximum accepted JSON body size in bytes
    pub json_limit: usize,
}

impl AppState {
    pub fn new(
        lifecycle: Arc<TokenLifecycleManager<dyn SessionRepository>>,
        directory: Arc<dyn PrincipalDirectory>,
    ) -> Self {
        Self {
            lifecycle,
            directory,
            database: None,
            json_limit: DEFAULT_JSON_LIMIT,
        }
    }

    pub fn with_database(mut self, database: DatabasePool) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_json_limit(mut self, limit: usize) -> Self {
        self.json_limit = limit;
        self
    }
}

/// Create and configure the application with all dependencies
pub fn create_app(
    app_state: web::Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    let verifier: Arc<dyn AccessVerifier> = app_state.lifecycle.clone();
    let json_config = web::JsonConfig::default()
        .limit(app_state.json_limit)
        .error_handler(json_error_handler);

    App::new()
        .app_data(app_state)
        .app_data(json_config)
        .wrap(TracingLogger::default())
        .route("/health", web::get().to(health_check))
        .configure(|cfg| routes::auth::configure(cfg, verifier))
        .default_service(web::route().to(not_found))
}

/// Health check endpoint handler
///
/// Reports 503 when the session database cannot be reached.
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let (healthy, session_store) = match &state.database {
        Some(pool) => match pool.health_check().await {
            Ok(true) => (true, "mysql"),
            _ => (false, "mysql"),
        },
        None => (true, "memory"),
    };

    let body = serde_json::json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "service": "tokenline-api",
        "version": env!("CARGO_PKG_VERSION"),
        "session_store": session_store,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    if healthy {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Default 404 handler
async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::new(
        error_codes::NOT_FOUND,
        "The requested resource was not found",
    ))
}
