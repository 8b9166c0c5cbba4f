//! Session repository trait defining the interface for refresh token lineages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::entities::session::SessionRecord;
use crate::errors::SessionError;

/// Repository trait for refresh token lineage (token family) persistence
///
/// The store is the single source of truth for revocation and replay
/// detection. Only lineages are tracked; individual tokens are never stored.
///
/// # Concurrency
/// `advance` must be an atomic compare-and-increment for a given family.
/// Implementations must not serialize unrelated families behind one lock.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new active lineage at sequence 0
    ///
    /// # Returns
    /// * `Ok(Uuid)` - The new family id
    /// * `Err(SessionError)` - Storage failure
    async fn create_family(&self, principal_id: &str) -> Result<Uuid, SessionError>;

    /// Atomically advance the lineage sequence if it equals `expected_sequence`
    ///
    /// # Returns
    /// * `Ok(u64)` - The new current sequence
    /// * `Err(SessionError::SequenceMismatch)` - A superseded token was presented
    /// * `Err(SessionError::FamilyRevoked)` - The lineage is revoked
    /// * `Err(SessionError::NotFound)` - Unknown lineage
    /// * `Err(SessionError::Contention)` - Transient conflict, safe to retry
    ///
    /// # Example
    /// ```no_run
    /// # use tl_core::repositories::SessionRepository;
    /// # async fn example(
    /// #     store: &impl SessionRepository,
    /// # ) -> Result<(), Box<dyn std::error::Error>> {
    /// let family = store.create_family("u1").await?;
    /// assert_eq!(store.advance(family, 0).await?, 1);
    /// assert!(store.advance(family, 0).await.is_err());
    /// # Ok(())
    /// # }
    /// ```
    async fn advance(&self, family_id: Uuid, expected_sequence: u64) -> Result<u64, SessionError>;

    /// Revoke a lineage
    ///
    /// Idempotent: revoking an unknown or already revoked lineage succeeds.
    ///
    /// # Returns
    /// * `Ok(true)` - The lineage was active and is now revoked
    /// * `Ok(false)` - Nothing changed
    async fn revoke(&self, family_id: Uuid) -> Result<bool, SessionError>;

    /// Whether the lineage exists and is active
    async fn is_active(&self, family_id: Uuid) -> Result<bool, SessionError> {
        Ok(self
            .find(family_id)
            .await?
            .map(|record| record.is_active())
            .unwrap_or(false))
    }

    /// Find a lineage record
    async fn find(&self, family_id: Uuid) -> Result<Option<SessionRecord>, SessionError>;

    /// Revoke every active lineage of a principal
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of lineages revoked
    async fn revoke_principal(&self, principal_id: &str) -> Result<usize, SessionError>;

    /// Delete lineages that have not rotated since `cutoff`
    ///
    /// Every refresh token of such a lineage has expired, so the record no
    /// longer guards anything.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of lineages deleted
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, SessionError>;
}

#[async_trait]
impl<T: SessionRepository + ?Sized> SessionRepository for Arc<T> {
    async fn create_family(&self, principal_id: &str) -> Result<Uuid, SessionError> {
        (**self).create_family(principal_id).await
    }

    async fn advance(&self, family_id: Uuid, expected_sequence: u64) -> Result<u64, SessionError> {
        (**self).advance(family_id, expected_sequence).await
    }

    async fn revoke(&self, family_id: Uuid) -> Result<bool, SessionError> {
        (**self).revoke(family_id).await
    }

    async fn is_active(&self, family_id: Uuid) -> Result<bool, SessionError> {
        (**self).is_active(family_id).await
    }

    async fn find(&self, family_id: Uuid) -> Result<Option<SessionRecord>, SessionError> {
        (**self).find(family_id).await
    }

    async fn revoke_principal(&self, principal_id: &str) -> Result<usize, SessionError> {
        (**self).revoke_principal(principal_id).await
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, SessionError> {
        (**self).purge_stale(cutoff).await
    }
}
