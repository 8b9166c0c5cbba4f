//! Tests for the token lifecycle

mod service_tests;

use chrono::{TimeZone, Utc};
use jsonwebtoken::Algorithm;
use std::sync::Arc;

use crate::domain::entities::Principal;
use crate::repositories::InMemorySessionStore;
use crate::services::clock::ManualClock;
use crate::services::token::{JwtCodec, KeyManager, TokenLifecycleManager, TokenServiceConfig};

pub(crate) const TEST_SECRET: &str = "lifecycle-test-signing-secret";

/// Lifecycle manager over an in-memory store with a manual clock
pub(crate) struct Fixture {
    pub manager: TokenLifecycleManager<InMemorySessionStore>,
    pub store: Arc<InMemorySessionStore>,
    pub keys: Arc<KeyManager>,
    pub clock: Arc<ManualClock>,
}

pub(crate) fn principal(id: &str) -> Principal {
    Principal::new(id, format!("{}@example.com", id), "member")
}

pub(crate) fn fixture() -> Fixture {
    fixture_with(TokenServiceConfig::default())
}

pub(crate) fn fixture_with(config: TokenServiceConfig) -> Fixture {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()));
    let keys = Arc::new(
        KeyManager::new(
            None,
            TEST_SECRET,
            Algorithm::HS256,
            config.key_retention(),
            clock.clone(),
        )
        .unwrap(),
    );
    let codec = Arc::new(JwtCodec::new(
        keys.clone(),
        clock.clone(),
        config.issuer.clone(),
        config.leeway,
    ));
    let store = Arc::new(InMemorySessionStore::with_clock(clock.clone()));
    let manager =
        TokenLifecycleManager::new(store.clone(), keys.clone(), codec, clock.clone(), config);

    Fixture {
        manager,
        store,
        keys,
        clock,
    }
}
