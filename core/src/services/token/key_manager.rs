//! Signing key ring supporting rotation without invalidating in-flight tokens

use chrono::Duration;
use jsonwebtoken::Algorithm;
use std::sync::{Arc, PoisonError, RwLock};
use tl_shared::config::TokenConfig;
use tracing::info;

use crate::domain::entities::key::KeyMaterial;
use crate::errors::KeyError;
use crate::services::clock::Clock;

use super::config::TokenServiceConfig;

/// Keys ordered by `not_before`; every key before `active` is retired
struct KeyRing {
    keys: Vec<KeyMaterial>,
    active: usize,
}

impl KeyRing {
    fn active(&self) -> &KeyMaterial {
        &self.keys[self.active]
    }
}

/// Holder of the active signing key and the retired keys still verifying tokens
///
/// There is exactly one active key at any instant. `rotate` installs the new
/// key and retires the old one under the same write lock, so readers never
/// observe a ring without an active key.
pub struct KeyManager {
    ring: RwLock<KeyRing>,
    algorithm: Algorithm,
    retention: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("key_ids", &self.key_ids())
            .field("algorithm", &self.algorithm)
            .field("retention", &self.retention)
            .finish()
    }
}

/// Parses a configured HMAC algorithm name
pub fn parse_algorithm(name: &str) -> Result<Algorithm, KeyError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        _ => Err(KeyError::UnsupportedAlgorithm {
            algorithm: name.to_string(),
        }),
    }
}

fn check_secret(secret: &[u8]) -> Result<(), KeyError> {
    if secret.is_empty() {
        return Err(KeyError::InvalidKey {
            reason: "secret must not be empty".to_string(),
        });
    }
    Ok(())
}

impl KeyManager {
    /// Creates a key ring with a single active key
    ///
    /// # Arguments
    ///
    /// * `key_id` - Explicit key id, derived from the secret when `None`
    /// * `secret` - Signing secret
    /// * `algorithm` - HMAC algorithm used by every key in the ring
    /// * `retention` - How long a retired key keeps verifying tokens
    /// * `clock` - Time source for key validity windows
    pub fn new(
        key_id: Option<String>,
        secret: impl AsRef<[u8]>,
        algorithm: Algorithm,
        retention: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, KeyError> {
        let secret = secret.as_ref();
        check_secret(secret)?;

        let key_id = key_id.unwrap_or_else(|| KeyMaterial::derive_key_id(secret));
        let key = KeyMaterial::new(key_id, secret, algorithm, clock.now());

        Ok(Self {
            ring: RwLock::new(KeyRing {
                keys: vec![key],
                active: 0,
            }),
            algorithm,
            retention,
            clock,
        })
    }

    /// Builds the ring from configuration
    ///
    /// The previous secret, when configured, is installed as already retired
    /// at startup so tokens signed before a redeploy keep verifying for one
    /// retention window.
    ///
    /// # Returns
    ///
    /// * `Ok(KeyManager)` - Ring seeded with the configured keys
    /// * `Err(KeyError)` - Empty or duplicate secret, or unsupported algorithm
    pub fn from_config(config: &TokenConfig, clock: Arc<dyn Clock>) -> Result<Self, KeyError> {
        let algorithm = parse_algorithm(&config.algorithm)?;
        let retention = TokenServiceConfig::from(config).key_retention();
        let now = clock.now();

        let active_secret = config.signing_secret.as_bytes();
        check_secret(active_secret)?;
        let active_id = config
            .signing_key_id
            .clone()
            .unwrap_or_else(|| KeyMaterial::derive_key_id(active_secret));

        let mut keys = Vec::with_capacity(2);
        if let Some(previous) = config.previous_secret.as_deref() {
            let previous = previous.as_bytes();
            check_secret(previous)?;
            if previous == active_secret {
                return Err(KeyError::InvalidKey {
                    reason: "previous secret equals the active secret".to_string(),
                });
            }
            let previous_id = config
                .previous_key_id
                .clone()
                .unwrap_or_else(|| KeyMaterial::derive_key_id(previous));
            if previous_id == active_id {
                return Err(KeyError::InvalidKey {
                    reason: format!("duplicate key id {}", previous_id),
                });
            }
            let mut key = KeyMaterial::new(previous_id, previous, algorithm, now);
            key.retire(now);
            keys.push(key);
        }
        keys.push(KeyMaterial::new(active_id, active_secret, algorithm, now));

        let active = keys.len() - 1;
        Ok(Self {
            ring: RwLock::new(KeyRing { keys, active }),
            algorithm,
            retention,
            clock,
        })
    }

    /// The key new tokens are signed with
    pub fn active_key(&self) -> KeyMaterial {
        let ring = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        ring.active().clone()
    }

    /// Looks up a key able to verify tokens at the current time
    ///
    /// Retired keys whose retention window has elapsed are reported as
    /// `NotFound` even before they are pruned.
    pub fn key_by_id(&self, key_id: &str) -> Result<KeyMaterial, KeyError> {
        let now = self.clock.now();
        let ring = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        ring.keys
            .iter()
            .find(|key| key.key_id == key_id && key.is_usable_at(now, self.retention))
            .cloned()
            .ok_or_else(|| KeyError::NotFound {
                key_id: key_id.to_string(),
            })
    }

    /// Installs `new_secret` as the active key, deriving its id
    pub fn rotate(&self, new_secret: impl AsRef<[u8]>) -> Result<KeyMaterial, KeyError> {
        let new_secret = new_secret.as_ref();
        self.rotate_with_key_id(KeyMaterial::derive_key_id(new_secret), new_secret)
    }

    /// Installs `new_secret` under `key_id` as the active key
    ///
    /// The previous active key is retired now and kept for the retention
    /// window. Keys whose window has fully elapsed are pruned.
    ///
    /// # Returns
    ///
    /// * `Ok(KeyMaterial)` - The new active key
    /// * `Err(KeyError::InvalidKey)` - Empty secret, or secret/id already in the ring
    pub fn rotate_with_key_id(
        &self,
        key_id: impl Into<String>,
        new_secret: impl AsRef<[u8]>,
    ) -> Result<KeyMaterial, KeyError> {
        let key_id = key_id.into();
        let new_secret = new_secret.as_ref();
        check_secret(new_secret)?;

        let now = self.clock.now();
        let mut ring = self.ring.write().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut ring, now);

        if ring.keys.iter().any(|key| key.same_secret(new_secret)) {
            return Err(KeyError::InvalidKey {
                reason: "secret duplicates a retained key".to_string(),
            });
        }
        if ring.keys.iter().any(|key| key.key_id == key_id) {
            return Err(KeyError::InvalidKey {
                reason: format!("duplicate key id {}", key_id),
            });
        }

        let active = ring.active;
        let retired_id = ring.keys[active].key_id.clone();
        ring.keys[active].retire(now);

        let key = KeyMaterial::new(key_id, new_secret, self.algorithm, now);
        ring.keys.push(key.clone());
        ring.active = ring.keys.len() - 1;

        info!(
            key_id = %key.key_id,
            retired_key_id = %retired_id,
            retained_keys = ring.keys.len(),
            "Signing key rotated"
        );

        Ok(key)
    }

    /// Drops retired keys past their retention window
    ///
    /// Retirement times grow with position, so aged keys form a prefix.
    fn prune(&self, ring: &mut KeyRing, now: chrono::DateTime<chrono::Utc>) {
        let aged = ring.keys[..ring.active]
            .iter()
            .take_while(|key| !key.is_usable_at(now, self.retention))
            .count();
        if aged > 0 {
            ring.keys.drain(..aged);
            ring.active -= aged;
        }
    }

    /// Ids of every key currently held, oldest first
    pub fn key_ids(&self) -> Vec<String> {
        let ring = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        ring.keys.iter().map(|key| key.key_id.clone()).collect()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// How long retired keys keep verifying tokens
    pub fn retention(&self) -> Duration {
        self.retention
    }
}
