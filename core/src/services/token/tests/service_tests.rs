//! Unit tests for the token lifecycle manager

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::{fixture, fixture_with, principal};
use crate::domain::entities::{Claims, SessionRecord};
use crate::errors::{DomainError, SessionError, TokenError};
use crate::repositories::{InMemorySessionStore, SessionRepository};
use crate::services::clock::{Clock, ManualClock, SystemClock};
use crate::services::token::{
    JwtCodec, KeyManager, RetryPolicy, TokenCodec, TokenLifecycleManager, TokenServiceConfig,
};

fn token_error(result: Result<impl std::fmt::Debug, DomainError>) -> TokenError {
    match result {
        Err(DomainError::Token(err)) => err,
        other => panic!("expected token error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_issue_then_verify_returns_identity_unchanged() {
    let fx = fixture();
    for id in ["u1", "u2", "admin-7"] {
        let p = principal(id);
        let pair = fx.manager.issue(&p).await.unwrap();

        let verified = fx.manager.verify_access(&pair.access_token).await.unwrap();
        assert_eq!(verified, p);
        assert_eq!(pair.sequence, 0);
        assert_eq!(pair.access_expires_in, 900);
        assert_eq!(pair.refresh_expires_in, 604800);
    }
}

#[tokio::test]
async fn test_issue_creates_lineage_at_sequence_zero() {
    let fx = fixture();
    let pair = fx.manager.issue(&principal("u1")).await.unwrap();

    let record = fx.manager.session(pair.family_id).await.unwrap().unwrap();
    assert_eq!(record.principal_id, "u1");
    assert_eq!(record.current_sequence, 0);
    assert!(record.is_active());
}

#[tokio::test]
async fn test_refresh_rotates_within_same_family() {
    let fx = fixture();
    let first = fx.manager.issue(&principal("u1")).await.unwrap();

    let second = fx.manager.refresh(&first.refresh_token).await.unwrap();

    assert_eq!(second.family_id, first.family_id);
    assert_eq!(second.sequence, 1);
    assert_ne!(second.refresh_token, first.refresh_token);
    assert_eq!(
        fx.manager.verify_access(&second.access_token).await.unwrap(),
        principal("u1")
    );
}

#[tokio::test]
async fn test_sequence_equals_number_of_refreshes() {
    let fx = fixture();
    let mut pair = fx.manager.issue(&principal("u1")).await.unwrap();

    for expected in 1..=5u64 {
        pair = fx.manager.refresh(&pair.refresh_token).await.unwrap();
        assert_eq!(pair.sequence, expected);
    }

    let record = fx.store.find(pair.family_id).await.unwrap().unwrap();
    assert_eq!(record.current_sequence, 5);
}

#[tokio::test]
async fn test_replayed_refresh_token_revokes_whole_lineage() {
    let fx = fixture();
    let original = fx.manager.issue(&principal("u1")).await.unwrap();
    let rotated = fx.manager.refresh(&original.refresh_token).await.unwrap();
    assert_eq!(rotated.sequence, 1);

    let replay = fx.manager.refresh(&original.refresh_token).await;
    assert_eq!(token_error(replay), TokenError::ReuseDetected);

    // Even the newest tokens of the lineage are dead now.
    assert_eq!(
        token_error(fx.manager.verify_access(&rotated.access_token).await),
        TokenError::Revoked
    );
    assert_eq!(
        token_error(fx.manager.refresh(&rotated.refresh_token).await),
        TokenError::Revoked
    );
    assert!(!fx.store.is_active(original.family_id).await.unwrap());
}

#[tokio::test]
async fn test_reuse_does_not_touch_other_lineages() {
    let fx = fixture();
    let victim = fx.manager.issue(&principal("u1")).await.unwrap();
    let other = fx.manager.issue(&principal("u1")).await.unwrap();

    fx.manager.refresh(&victim.refresh_token).await.unwrap();
    let _ = fx.manager.refresh(&victim.refresh_token).await;

    assert!(fx.manager.verify_access(&other.access_token).await.is_ok());
    assert!(fx.manager.refresh(&other.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_access_token_rejected_by_refresh() {
    let fx = fixture();
    let pair = fx.manager.issue(&principal("u1")).await.unwrap();

    assert_eq!(
        token_error(fx.manager.refresh(&pair.access_token).await),
        TokenError::WrongType
    );
    // A wrong-type attempt must not consume the lineage.
    assert!(fx.manager.refresh(&pair.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_refresh_token_rejected_by_verify_access() {
    let fx = fixture();
    let pair = fx.manager.issue(&principal("u1")).await.unwrap();

    assert_eq!(
        token_error(fx.manager.verify_access(&pair.refresh_token).await),
        TokenError::WrongType
    );
}

#[tokio::test]
async fn test_expired_access_token() {
    let fx = fixture();
    let pair = fx.manager.issue(&principal("u1")).await.unwrap();

    fx.clock.advance(Duration::minutes(15));

    assert_eq!(
        token_error(fx.manager.verify_access(&pair.access_token).await),
        TokenError::Expired
    );
    // The refresh token outlives the access token.
    assert!(fx.manager.refresh(&pair.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_expired_refresh_token() {
    let fx = fixture();
    let pair = fx.manager.issue(&principal("u1")).await.unwrap();

    fx.clock.advance(Duration::days(7));

    assert_eq!(
        token_error(fx.manager.refresh(&pair.refresh_token).await),
        TokenError::Expired
    );
}

#[tokio::test]
async fn test_leeway_tolerates_skew() {
    let config = TokenServiceConfig {
        leeway: 30,
        ..TokenServiceConfig::default()
    };
    let fx = fixture_with(config);
    let pair = fx.manager.issue(&principal("u1")).await.unwrap();

    fx.clock.advance(Duration::minutes(15) + Duration::seconds(20));
    assert!(fx.manager.verify_access(&pair.access_token).await.is_ok());

    fx.clock.advance(Duration::seconds(10));
    assert_eq!(
        token_error(fx.manager.verify_access(&pair.access_token).await),
        TokenError::Expired
    );
}

#[tokio::test]
async fn test_garbage_and_foreign_tokens() {
    let fx = fixture();
    let other = fixture();
    let foreign = other.manager.issue(&principal("u1")).await.unwrap();

    assert_eq!(
        token_error(fx.manager.verify_access("garbage").await),
        TokenError::Malformed
    );
    // Same secret, so the signature checks out, but the lineage is unknown here.
    assert_eq!(
        token_error(fx.manager.refresh(&foreign.refresh_token).await),
        TokenError::Revoked
    );
}

#[tokio::test]
async fn test_revoke_is_idempotent() {
    let fx = fixture();
    let pair = fx.manager.issue(&principal("u1")).await.unwrap();

    fx.manager.revoke(&pair.refresh_token).await.unwrap();
    let after_first = fx.store.find(pair.family_id).await.unwrap();

    fx.manager.revoke(&pair.refresh_token).await.unwrap();
    let after_second = fx.store.find(pair.family_id).await.unwrap();

    assert_eq!(after_first, after_second);
    assert!(!after_second.unwrap().is_active());
    assert_eq!(
        token_error(fx.manager.refresh(&pair.refresh_token).await),
        TokenError::Revoked
    );
    assert_eq!(
        token_error(fx.manager.verify_access(&pair.access_token).await),
        TokenError::Revoked
    );
}

#[tokio::test]
async fn test_revoke_unknown_family_succeeds() {
    let fx = fixture();
    let other = fixture();
    let foreign = other.manager.issue(&principal("u1")).await.unwrap();

    assert!(fx.manager.revoke(&foreign.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_revoke_rejects_undecodable_token() {
    let fx = fixture();
    assert_eq!(
        token_error(fx.manager.revoke("not-a-token").await),
        TokenError::Malformed
    );
}

#[tokio::test]
async fn test_revoke_principal_logs_out_everywhere() {
    let fx = fixture();
    let phone = fx.manager.issue(&principal("u1")).await.unwrap();
    let laptop = fx.manager.issue(&principal("u1")).await.unwrap();
    let someone_else = fx.manager.issue(&principal("u2")).await.unwrap();

    assert_eq!(fx.manager.revoke_principal("u1").await.unwrap(), 2);

    for pair in [&phone, &laptop] {
        assert_eq!(
            token_error(fx.manager.verify_access(&pair.access_token).await),
            TokenError::Revoked
        );
    }
    assert!(fx.manager.verify_access(&someone_else.access_token).await.is_ok());
}

#[tokio::test]
async fn test_key_rotation_keeps_old_tokens_valid_within_retention() {
    let fx = fixture();
    let before = fx.manager.issue(&principal("u1")).await.unwrap();

    fx.keys.rotate("lifecycle-test-signing-secret-2").unwrap();
    let after = fx.manager.issue(&principal("u1")).await.unwrap();

    assert!(fx.manager.verify_access(&before.access_token).await.is_ok());
    assert!(fx.manager.verify_access(&after.access_token).await.is_ok());
    assert!(fx.manager.refresh(&before.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_tokens_signed_with_aged_out_key_are_rejected() {
    let fx = fixture();
    let before = fx.manager.issue(&principal("u1")).await.unwrap();

    fx.keys.rotate("lifecycle-test-signing-secret-2").unwrap();
    fx.clock
        .advance(fx.keys.retention() + Duration::seconds(1));

    assert_eq!(
        token_error(fx.manager.refresh(&before.refresh_token).await),
        TokenError::SignatureInvalid
    );
}

/// Codec that can be switched into failing to sign
struct FlakyCodec {
    inner: JwtCodec,
    fail_encode: AtomicBool,
}

impl TokenCodec for FlakyCodec {
    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        if self.fail_encode.load(Ordering::SeqCst) {
            return Err(TokenError::GenerationFailed);
        }
        self.inner.encode(claims)
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.inner.decode(token)
    }
}

fn flaky_manager() -> (
    TokenLifecycleManager<InMemorySessionStore>,
    Arc<InMemorySessionStore>,
    Arc<FlakyCodec>,
) {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
    let config = TokenServiceConfig::default();
    let keys = Arc::new(
        KeyManager::new(
            None,
            super::TEST_SECRET,
            jsonwebtoken::Algorithm::HS256,
            config.key_retention(),
            clock.clone(),
        )
        .unwrap(),
    );
    let codec = Arc::new(FlakyCodec {
        inner: JwtCodec::new(keys.clone(), clock.clone(), config.issuer.clone(), 0),
        fail_encode: AtomicBool::new(false),
    });
    let store = Arc::new(InMemorySessionStore::with_clock(clock.clone()));
    let manager = TokenLifecycleManager::new(store.clone(), keys, codec.clone(), clock, config);
    (manager, store, codec)
}

#[tokio::test]
async fn test_generation_failure_on_issue_revokes_fresh_lineage() {
    let (manager, store, codec) = flaky_manager();
    codec.fail_encode.store(true, Ordering::SeqCst);

    assert_eq!(
        token_error(manager.issue(&principal("u1")).await),
        TokenError::GenerationFailed
    );
    assert_eq!(store.len(), 1);
    assert_eq!(store.revoke_principal("u1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_unrepresentable_expiry_fails_generation_without_panicking() {
    let f = fixture_with(TokenServiceConfig {
        refresh_token_ttl: Duration::seconds(100_000_000_000_000),
        ..TokenServiceConfig::default()
    });

    assert_eq!(
        token_error(f.manager.issue(&principal("u1")).await),
        TokenError::GenerationFailed
    );
    assert_eq!(f.store.len(), 1);
    assert_eq!(f.store.revoke_principal("u1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_generation_failure_after_advance_forces_relogin() {
    let (manager, store, codec) = flaky_manager();
    let pair = manager.issue(&principal("u1")).await.unwrap();

    codec.fail_encode.store(true, Ordering::SeqCst);
    assert_eq!(
        token_error(manager.refresh(&pair.refresh_token).await),
        TokenError::GenerationFailed
    );

    // The advance stuck, so the old token now reads as a replay.
    codec.fail_encode.store(false, Ordering::SeqCst);
    assert_eq!(store.find(pair.family_id).await.unwrap().unwrap().current_sequence, 1);
    assert_eq!(
        token_error(manager.refresh(&pair.refresh_token).await),
        TokenError::ReuseDetected
    );
}

/// Store whose `advance` reports contention a fixed number of times
struct ContendedStore {
    inner: InMemorySessionStore,
    contended_advances: AtomicU32,
    storage_down: AtomicBool,
}

impl ContendedStore {
    fn new(contended_advances: u32) -> Self {
        Self {
            inner: InMemorySessionStore::new(),
            contended_advances: AtomicU32::new(contended_advances),
            storage_down: AtomicBool::new(false),
        }
    }

    fn check(&self) -> Result<(), SessionError> {
        if self.storage_down.load(Ordering::SeqCst) {
            return Err(SessionError::Storage {
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for ContendedStore {
    async fn create_family(&self, principal_id: &str) -> Result<Uuid, SessionError> {
        self.check()?;
        self.inner.create_family(principal_id).await
    }

    async fn advance(&self, family_id: Uuid, expected_sequence: u64) -> Result<u64, SessionError> {
        self.check()?;
        let remaining = self.contended_advances.load(Ordering::SeqCst);
        if remaining > 0 {
            self.contended_advances.store(remaining - 1, Ordering::SeqCst);
            return Err(SessionError::Contention);
        }
        self.inner.advance(family_id, expected_sequence).await
    }

    async fn revoke(&self, family_id: Uuid) -> Result<bool, SessionError> {
        self.check()?;
        self.inner.revoke(family_id).await
    }

    async fn find(&self, family_id: Uuid) -> Result<Option<SessionRecord>, SessionError> {
        self.check()?;
        self.inner.find(family_id).await
    }

    async fn revoke_principal(&self, principal_id: &str) -> Result<usize, SessionError> {
        self.check()?;
        self.inner.revoke_principal(principal_id).await
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, SessionError> {
        self.check()?;
        self.inner.purge_stale(cutoff).await
    }
}

fn contended_manager(
    contended_advances: u32,
) -> (TokenLifecycleManager<ContendedStore>, Arc<ContendedStore>) {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let config = TokenServiceConfig {
        retry: RetryPolicy {
            max_attempts: 4,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(2),
        },
        ..TokenServiceConfig::default()
    };
    let keys = Arc::new(
        KeyManager::new(
            None,
            super::TEST_SECRET,
            jsonwebtoken::Algorithm::HS256,
            config.key_retention(),
            clock.clone(),
        )
        .unwrap(),
    );
    let codec = Arc::new(JwtCodec::new(keys.clone(), clock.clone(), config.issuer.clone(), 0));
    let store = Arc::new(ContendedStore::new(contended_advances));
    let manager = TokenLifecycleManager::new(store.clone(), keys, codec, clock, config);
    (manager, store)
}

#[tokio::test]
async fn test_contention_is_retried_transparently() {
    let (manager, _) = contended_manager(3);
    let pair = manager.issue(&principal("u1")).await.unwrap();

    let rotated = manager.refresh(&pair.refresh_token).await.unwrap();
    assert_eq!(rotated.sequence, 1);
}

#[tokio::test]
async fn test_exhausted_contention_is_unavailable_not_reuse() {
    let (manager, store) = contended_manager(10);
    let pair = manager.issue(&principal("u1")).await.unwrap();

    assert_eq!(
        token_error(manager.refresh(&pair.refresh_token).await),
        TokenError::Unavailable
    );
    // The lineage survives and the same token still works once contention clears.
    assert!(store.is_active(pair.family_id).await.unwrap());
    store.contended_advances.store(0, Ordering::SeqCst);
    assert!(manager.refresh(&pair.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_storage_failure_is_unavailable() {
    let (manager, store) = contended_manager(0);
    let pair = manager.issue(&principal("u1")).await.unwrap();
    store.storage_down.store(true, Ordering::SeqCst);

    assert_eq!(
        token_error(manager.verify_access(&pair.access_token).await),
        TokenError::Unavailable
    );
    assert_eq!(
        token_error(manager.issue(&principal("u2")).await),
        TokenError::Unavailable
    );
}

#[tokio::test]
async fn test_from_config_bounds_oversized_lifetimes() {
    let mut config = tl_shared::config::TokenConfig::new("oversized-lifetime-secret");
    config.refresh_token_ttl = 100_000_000_000_000;
    assert!(config.validate().is_err());

    let manager = TokenLifecycleManager::from_config(
        Arc::new(InMemorySessionStore::new()),
        &config,
        Arc::new(SystemClock),
    )
    .unwrap();
    let pair = manager.issue(&principal("u1")).await.unwrap();

    assert_eq!(
        pair.refresh_expires_in,
        tl_shared::config::MAX_LIFETIME_SECONDS
    );
    assert!(manager.refresh(&pair.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_from_config_honours_previous_secret() {
    let clock: Arc<ManualClock> = Arc::new(ManualClock::new(Utc::now()));
    let old_config = tl_shared::config::TokenConfig::new("old-deployment-signing-secret");
    let old = TokenLifecycleManager::from_config(
        Arc::new(InMemorySessionStore::new()),
        &old_config,
        clock.clone(),
    )
    .unwrap();
    let pair = old.issue(&principal("u1")).await.unwrap();

    let new_config = tl_shared::config::TokenConfig::new("new-deployment-signing-secret")
        .with_previous_secret("old-deployment-signing-secret");
    let store = Arc::new(InMemorySessionStore::new());
    let new = TokenLifecycleManager::from_config(store, &new_config, clock.clone()).unwrap();

    // Signature verifies under the retired key; the lineage lived in the old store.
    assert_eq!(
        token_error(new.verify_access(&pair.access_token).await),
        TokenError::Revoked
    );
    assert_eq!(new.keys().key_ids().len(), 2);

    let without_previous = TokenLifecycleManager::from_config(
        Arc::new(InMemorySessionStore::new()),
        &tl_shared::config::TokenConfig::new("new-deployment-signing-secret"),
        clock,
    )
    .unwrap();
    assert_eq!(
        token_error(without_previous.verify_access(&pair.access_token).await),
        TokenError::SignatureInvalid
    );
}

/// Store whose `revoke` waits until the test opens the gate
struct GatedRevokeStore {
    inner: InMemorySessionStore,
    gate: tokio::sync::Notify,
}

#[async_trait]
impl SessionRepository for GatedRevokeStore {
    async fn create_family(&self, principal_id: &str) -> Result<Uuid, SessionError> {
        self.inner.create_family(principal_id).await
    }

    async fn advance(&self, family_id: Uuid, expected_sequence: u64) -> Result<u64, SessionError> {
        self.inner.advance(family_id, expected_sequence).await
    }

    async fn revoke(&self, family_id: Uuid) -> Result<bool, SessionError> {
        self.gate.notified().await;
        self.inner.revoke(family_id).await
    }

    async fn find(&self, family_id: Uuid) -> Result<Option<SessionRecord>, SessionError> {
        self.inner.find(family_id).await
    }

    async fn revoke_principal(&self, principal_id: &str) -> Result<usize, SessionError> {
        self.inner.revoke_principal(principal_id).await
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, SessionError> {
        self.inner.purge_stale(cutoff).await
    }
}

#[tokio::test]
async fn test_reuse_revocation_survives_dropped_request() {
    let store = Arc::new(GatedRevokeStore {
        inner: InMemorySessionStore::new(),
        gate: tokio::sync::Notify::new(),
    });
    let manager = TokenLifecycleManager::from_config(
        store.clone(),
        &tl_shared::config::TokenConfig::new("gated-revoke-signing-secret"),
        Arc::new(SystemClock),
    )
    .unwrap();
    let original = manager.issue(&principal("u1")).await.unwrap();
    let rotated = manager.refresh(&original.refresh_token).await.unwrap();

    // The client gives up while the revocation is still pending.
    let replay = tokio::time::timeout(
        std::time::Duration::from_millis(20),
        manager.refresh(&original.refresh_token),
    )
    .await;
    assert!(replay.is_err());
    assert!(store.is_active(original.family_id).await.unwrap());

    store.gate.notify_one();
    for _ in 0..100 {
        if !store.is_active(original.family_id).await.unwrap() {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert!(!store.is_active(original.family_id).await.unwrap());
    assert_eq!(
        token_error(manager.refresh(&rotated.refresh_token).await),
        TokenError::Revoked
    );
}
