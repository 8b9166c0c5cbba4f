//! Shared fixtures for HTTP tests

use actix_web::web;
use chrono::Utc;
use std::sync::Arc;

use tl_api::AppState;
use tl_core::domain::entities::principal::Principal;
use tl_core::repositories::{InMemoryPrincipalDirectory, InMemorySessionStore, SessionRepository};
use tl_core::services::{Clock, ManualClock, TokenLifecycleManager};
use tl_shared::config::TokenConfig;

pub const TEST_SECRET: &str = "api-test-secret-with-enough-entropy";

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub clock: Arc<ManualClock>,
}

pub fn alice() -> Principal {
    Principal::new("alice", "alice@example.com", "admin")
}

pub fn context() -> TestContext {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let dyn_clock: Arc<dyn Clock> = clock.clone();

    let sessions: Arc<dyn SessionRepository> =
        Arc::new(InMemorySessionStore::with_clock(dyn_clock.clone()));
    let lifecycle = TokenLifecycleManager::from_config(
        sessions,
        &TokenConfig::new(TEST_SECRET),
        dyn_clock,
    )
    .expect("valid token config");

    let directory = InMemoryPrincipalDirectory::with_principals([alice()]);
    let state = AppState::new(Arc::new(lifecycle), Arc::new(directory));

    TestContext {
        state: web::Data::new(state),
        clock,
    }
}
