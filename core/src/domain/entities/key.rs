//! Signing key material held by the key ring.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::Algorithm;
use sha2::{Digest, Sha256};

/// One signing secret together with its validity window
///
/// A key is active while `not_after` is unset. Once rotated out it keeps
/// verifying tokens until `not_after + retention`.
#[derive(Clone)]
pub struct KeyMaterial {
    /// Identifier written into the token header
    pub key_id: String,

    secret: Vec<u8>,

    /// Algorithm the key signs with
    pub algorithm: Algorithm,

    /// When the key became the active signing key
    pub not_before: DateTime<Utc>,

    /// When the key stopped signing new tokens
    pub not_after: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish()
    }
}

impl KeyMaterial {
    /// Creates a new active key
    pub fn new(
        key_id: impl Into<String>,
        secret: impl AsRef<[u8]>,
        algorithm: Algorithm,
        not_before: DateTime<Utc>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.as_ref().to_vec(),
            algorithm,
            not_before,
            not_after: None,
        }
    }

    /// Derives a stable key id from a secret
    ///
    /// Deterministic so that restarts keep verifying tokens signed before them.
    pub fn derive_key_id(secret: impl AsRef<[u8]>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"tokenline-kid:");
        hasher.update(secret.as_ref());
        let digest = hex::encode(hasher.finalize());
        digest[..16].to_string()
    }

    /// Raw secret bytes used for signing and verification
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Whether the key signs new tokens
    pub fn is_active(&self) -> bool {
        self.not_after.is_none()
    }

    /// Whether the key has the same secret as `other`
    pub fn same_secret(&self, other: &[u8]) -> bool {
        self.secret.as_slice() == other
    }

    /// End of the verification window, `None` while the key is active
    pub fn retained_until(&self, retention: Duration) -> Option<DateTime<Utc>> {
        self.not_after.map(|retired| {
            retired
                .checked_add_signed(retention)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }

    /// Whether tokens signed with this key are still verifiable at `now`
    pub fn is_usable_at(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        match self.retained_until(retention) {
            None => true,
            Some(until) => now <= until,
        }
    }

    /// Marks the key as retired at `at`
    pub fn retire(&mut self, at: DateTime<Utc>) {
        if self.not_after.is_none() {
            self.not_after = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_key_id_is_stable() {
        let first = KeyMaterial::derive_key_id("secret-a");
        let second = KeyMaterial::derive_key_id("secret-a");
        let other = KeyMaterial::derive_key_id("secret-b");

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.len(), 16);
    }

    #[test]
    fn test_retention_window() {
        let start = Utc::now();
        let mut key = KeyMaterial::new("k1", "secret", Algorithm::HS256, start);
        assert!(key.is_active());
        assert!(key.is_usable_at(start + Duration::days(365), Duration::zero()));

        key.retire(start);
        assert!(!key.is_active());
        assert!(key.is_usable_at(start + Duration::minutes(5), Duration::minutes(10)));
        assert!(!key.is_usable_at(start + Duration::minutes(11), Duration::minutes(10)));
    }

    #[test]
    fn test_retention_past_calendar_end_saturates() {
        let start = Utc::now();
        let mut key = KeyMaterial::new("k1", "secret", Algorithm::HS256, start);
        key.retire(start);

        let forever = Duration::seconds(100_000_000_000_000);
        assert_eq!(key.retained_until(forever), Some(DateTime::<Utc>::MAX_UTC));
        assert!(key.is_usable_at(start + Duration::days(365), forever));
    }

    #[test]
    fn test_retire_keeps_first_timestamp() {
        let start = Utc::now();
        let mut key = KeyMaterial::new("k1", "secret", Algorithm::HS256, start);
        key.retire(start);
        key.retire(start + Duration::hours(1));
        assert_eq!(key.not_after, Some(start));
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = KeyMaterial::new("k1", "very-secret-value", Algorithm::HS256, Utc::now());
        assert!(!format!("{:?}", key).contains("very-secret-value"));
    }
}
