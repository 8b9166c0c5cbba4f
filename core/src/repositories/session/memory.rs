//! In-memory session store backed by a concurrent map.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::r#trait::SessionRepository;
use crate::domain::entities::session::SessionRecord;
use crate::errors::SessionError;
use crate::services::clock::{Clock, SystemClock};

/// Session store keeping lineages in process memory
///
/// Each family lives in its own shard entry, so `advance` on one family only
/// locks that entry and never blocks unrelated families for long.
pub struct InMemorySessionStore {
    families: DashMap<Uuid, SessionRecord>,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store stamping records with `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            families: DashMap::new(),
            clock,
        }
    }

    /// Number of tracked lineages, revoked ones included
    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionStore {
    async fn create_family(&self, principal_id: &str) -> Result<Uuid, SessionError> {
        let family_id = Uuid::new_v4();
        let record = SessionRecord::new(family_id, principal_id, self.clock.now());
        self.families.insert(family_id, record);
        Ok(family_id)
    }

    async fn advance(&self, family_id: Uuid, expected_sequence: u64) -> Result<u64, SessionError> {
        let now = self.clock.now();
        // The entry guard holds the shard write lock across the compare and the increment.
        let mut record = self
            .families
            .get_mut(&family_id)
            .ok_or(SessionError::NotFound)?;
        record.try_advance(expected_sequence, now)
    }

    async fn revoke(&self, family_id: Uuid) -> Result<bool, SessionError> {
        let now = self.clock.now();
        Ok(self
            .families
            .get_mut(&family_id)
            .map(|mut record| record.revoke(now))
            .unwrap_or(false))
    }

    async fn is_active(&self, family_id: Uuid) -> Result<bool, SessionError> {
        Ok(self
            .families
            .get(&family_id)
            .map(|record| record.is_active())
            .unwrap_or(false))
    }

    async fn find(&self, family_id: Uuid) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self.families.get(&family_id).map(|record| record.clone()))
    }

    async fn revoke_principal(&self, principal_id: &str) -> Result<usize, SessionError> {
        let now = self.clock.now();
        let mut revoked = 0;
        for mut entry in self.families.iter_mut() {
            if entry.principal_id == principal_id && entry.revoke(now) {
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, SessionError> {
        let before = self.families.len();
        self.families.retain(|_, record| record.last_rotated_at >= cutoff);
        Ok(before.saturating_sub(self.families.len()))
    }
}
