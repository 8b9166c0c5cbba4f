//! Refresh token lineage records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::SessionError;

/// Lineage status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Revoked,
}

impl SessionStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Revoked => "revoked",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "revoked" => Ok(SessionStatus::Revoked),
            _ => Err(format!("Invalid session status: {}", s)),
        }
    }
}

/// One rotation lineage of refresh tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Lineage identifier shared by every refresh token in the family
    pub family_id: Uuid,

    /// Principal the lineage was issued to
    pub principal_id: String,

    /// Sequence of the only refresh token currently accepted
    pub current_sequence: u64,

    /// Active or revoked
    pub status: SessionStatus,

    /// When the lineage was created
    pub created_at: DateTime<Utc>,

    /// When the sequence last advanced (creation time until the first refresh)
    pub last_rotated_at: DateTime<Utc>,

    /// When the lineage was revoked
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Creates a new active lineage at sequence 0
    pub fn new(family_id: Uuid, principal_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            family_id,
            principal_id: principal_id.into(),
            current_sequence: 0,
            status: SessionStatus::Active,
            created_at: now,
            last_rotated_at: now,
            revoked_at: None,
        }
    }

    /// Whether refresh tokens of this lineage are still accepted
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Compare-and-increment of the lineage sequence
    ///
    /// Callers must hold exclusive access to the record for the duration of
    /// the call.
    pub fn try_advance(
        &mut self,
        expected_sequence: u64,
        now: DateTime<Utc>,
    ) -> Result<u64, SessionError> {
        if !self.is_active() {
            return Err(SessionError::FamilyRevoked);
        }
        if self.current_sequence != expected_sequence {
            return Err(SessionError::SequenceMismatch);
        }
        self.current_sequence += 1;
        self.last_rotated_at = now;
        Ok(self.current_sequence)
    }

    /// Revokes the lineage, returning whether the status changed
    pub fn revoke(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_active() {
            self.status = SessionStatus::Revoked;
            self.revoked_at = Some(now);
            true
        } else {
            false
        }
    }
}
