//! Token lifecycle manager: issuance, verification, rotation and revocation

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tl_shared::config::TokenConfig;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::entities::principal::Principal;
use crate::domain::entities::session::SessionRecord;
use crate::domain::entities::token::{Claims, TokenPair, TokenType};
use crate::errors::{DomainError, SessionError, TokenError};
use crate::repositories::SessionRepository;
use crate::services::clock::Clock;

use super::codec::{JwtCodec, TokenCodec};
use super::config::TokenServiceConfig;
use super::key_manager::KeyManager;

/// Orchestrates the token lifecycle over a session store
///
/// Refresh tokens are single use: every refresh advances the lineage
/// sequence, and presenting a superseded token revokes the whole lineage.
/// Access tokens are never stored but carry their lineage id, so revoking a
/// lineage also rejects its outstanding access tokens.
pub struct TokenLifecycleManager<S: ?Sized> {
    sessions: Arc<S>,
    keys: Arc<KeyManager>,
    codec: Arc<dyn TokenCodec>,
    clock: Arc<dyn Clock>,
    config: TokenServiceConfig,
}

/// Translates store failures that are not business outcomes
fn store_failure(err: SessionError) -> DomainError {
    error!(error = %err, "Session store unavailable");
    TokenError::Unavailable.into()
}

impl<S: SessionRepository + ?Sized + 'static> TokenLifecycleManager<S> {
    /// Creates a lifecycle manager from explicit parts
    ///
    /// # Arguments
    ///
    /// * `sessions` - Session store holding refresh lineages
    /// * `keys` - Signing key ring
    /// * `codec` - Token codec, normally a [`JwtCodec`] over `keys`
    /// * `clock` - Time source for issuance
    /// * `config` - Lifetimes, issuer and retry policy
    pub fn new(
        sessions: Arc<S>,
        keys: Arc<KeyManager>,
        codec: Arc<dyn TokenCodec>,
        clock: Arc<dyn Clock>,
        config: TokenServiceConfig,
    ) -> Self {
        Self {
            sessions,
            keys,
            codec,
            clock,
            config,
        }
    }

    /// Creates a lifecycle manager with a JWT codec over a key ring built from `config`
    ///
    /// # Returns
    ///
    /// * `Ok(TokenLifecycleManager)` - Ready to issue tokens
    /// * `Err(DomainError::Key)` - The configured secrets or algorithm are unusable
    pub fn from_config(
        sessions: Arc<S>,
        config: &TokenConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DomainError> {
        let keys = Arc::new(KeyManager::from_config(config, clock.clone())?);
        let codec = Arc::new(JwtCodec::new(
            keys.clone(),
            clock.clone(),
            config.issuer.clone(),
            config.leeway,
        ));

        Ok(Self::new(
            sessions,
            keys,
            codec,
            clock,
            TokenServiceConfig::from(config),
        ))
    }

    /// The signing key ring, for rotation
    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn sessions(&self) -> &Arc<S> {
        &self.sessions
    }

    pub fn config(&self) -> &TokenServiceConfig {
        &self.config
    }

    /// Issues a fresh token pair starting a new lineage
    ///
    /// # Returns
    ///
    /// * `Ok(TokenPair)` - Access token and refresh token at sequence 0
    /// * `Err(TokenError::GenerationFailed)` - Signing failed; the new lineage is revoked
    /// * `Err(TokenError::Unavailable)` - The session store could not be reached
    pub async fn issue(&self, principal: &Principal) -> Result<TokenPair, DomainError> {
        let family_id = self
            .config
            .retry
            .run(|| self.sessions.create_family(&principal.id))
            .await
            .map_err(store_failure)?;

        match self.mint_pair(principal, family_id, 0, self.clock.now()) {
            Ok(pair) => {
                info!(principal_id = %principal.id, family_id = %family_id, "Token pair issued");
                Ok(pair)
            }
            Err(err) => {
                // Do not leave a lineage behind that no token can ever advance.
                if let Err(revoke_err) = self.sessions.revoke(family_id).await {
                    error!(
                        family_id = %family_id,
                        error = %revoke_err,
                        "Failed to revoke lineage after generation failure"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Verifies an access token and returns the identity it carries
    ///
    /// # Returns
    ///
    /// * `Ok(Principal)` - Snapshot embedded at issuance
    /// * `Err(TokenError::WrongType)` - A refresh token was presented
    /// * `Err(TokenError::Revoked)` - The token's lineage has been revoked
    /// * `Err(TokenError::Expired | SignatureInvalid | Malformed)` - Decoding failed
    pub async fn verify_access(&self, token: &str) -> Result<Principal, DomainError> {
        let claims = self.codec.decode(token)?;
        if claims.token_type != TokenType::Access {
            return Err(TokenError::WrongType.into());
        }

        let active = self
            .config
            .retry
            .run(|| self.sessions.is_active(claims.family_id))
            .await
            .map_err(store_failure)?;
        if !active {
            return Err(TokenError::Revoked.into());
        }

        Ok(claims.principal())
    }

    /// Exchanges a refresh token for a new pair in the same lineage
    ///
    /// The presented token is consumed: only its exact sequence is accepted,
    /// once. Presenting any other sequence of a live lineage is treated as
    /// theft and revokes the lineage.
    ///
    /// If signing fails after the sequence advanced, the advance is kept and
    /// the client has to log in again.
    ///
    /// Once the store reports a superseded sequence, the revocation completes
    /// even if this future is dropped. A request dropped before the store
    /// answered has neither revoked nor responded, and the replayed token
    /// trips detection again when presented.
    ///
    /// # Returns
    ///
    /// * `Ok(TokenPair)` - New pair carrying the advanced sequence
    /// * `Err(TokenError::ReuseDetected)` - A superseded token was presented; lineage revoked
    /// * `Err(TokenError::Revoked)` - The lineage is revoked or unknown
    /// * `Err(TokenError::WrongType)` - An access token was presented
    /// * `Err(TokenError::Expired | SignatureInvalid | Malformed)` - Decoding failed
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, DomainError> {
        let claims = self.codec.decode(refresh_token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(TokenError::WrongType.into());
        }
        let family_id = claims.family_id;

        let advanced = self
            .config
            .retry
            .run(|| self.sessions.advance(family_id, claims.sequence))
            .await;

        match advanced {
            Ok(sequence) => {
                let principal = claims.principal();
                self.mint_pair(&principal, family_id, sequence, self.clock.now())
                    .map_err(|err| {
                        error!(
                            principal_id = %principal.id,
                            family_id = %family_id,
                            sequence,
                            "Lineage advanced but token generation failed"
                        );
                        DomainError::from(err)
                    })
            }
            Err(SessionError::SequenceMismatch) => {
                warn!(
                    target: "security",
                    principal_id = %claims.sub,
                    family_id = %family_id,
                    "Refresh token reuse detected, revoking lineage"
                );
                self.revoke_detached(family_id).await;
                Err(TokenError::ReuseDetected.into())
            }
            Err(SessionError::FamilyRevoked) | Err(SessionError::NotFound) => {
                Err(TokenError::Revoked.into())
            }
            Err(err) => Err(store_failure(err)),
        }
    }

    /// Revokes the lineage of a token
    ///
    /// Either token type may be presented. Revoking an already revoked or
    /// unknown lineage succeeds.
    pub async fn revoke(&self, token: &str) -> Result<(), DomainError> {
        let claims = self.codec.decode(token)?;
        let revoked = self
            .config
            .retry
            .run(|| self.sessions.revoke(claims.family_id))
            .await
            .map_err(store_failure)?;

        if revoked {
            info!(principal_id = %claims.sub, family_id = %claims.family_id, "Lineage revoked");
        }
        Ok(())
    }

    /// Revokes every lineage of a principal
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of lineages revoked
    pub async fn revoke_principal(&self, principal_id: &str) -> Result<usize, DomainError> {
        let count = self
            .config
            .retry
            .run(|| self.sessions.revoke_principal(principal_id))
            .await
            .map_err(store_failure)?;

        info!(principal_id = %principal_id, count, "Revoked all lineages of principal");
        Ok(count)
    }

    /// Looks up a lineage
    pub async fn session(&self, family_id: Uuid) -> Result<Option<SessionRecord>, DomainError> {
        self.config
            .retry
            .run(|| self.sessions.find(family_id))
            .await
            .map_err(store_failure)
    }

    /// Revokes a lineage on a spawned task
    ///
    /// The revocation runs to completion even when the request that detected
    /// the reuse is dropped, e.g. because the client disconnected.
    async fn revoke_detached(&self, family_id: Uuid) {
        let sessions = Arc::clone(&self.sessions);
        let retry = self.config.retry;
        let task = tokio::spawn(async move { retry.run(|| sessions.revoke(family_id)).await });

        match task.await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                error!(
                    family_id = %family_id,
                    error = %err,
                    "Failed to revoke lineage after reuse"
                );
            }
            Err(err) => {
                error!(family_id = %family_id, error = %err, "Lineage revocation task failed");
            }
        }
    }

    /// Signs an access and refresh token for one position in a lineage
    ///
    /// Expiries that overflow the calendar fail with `GenerationFailed`.
    fn mint_pair(
        &self,
        principal: &Principal,
        family_id: Uuid,
        sequence: u64,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        let access_claims = Claims::new(
            principal,
            TokenType::Access,
            family_id,
            sequence,
            &self.config.issuer,
            now,
            self.config.access_token_ttl,
        )
        .ok_or(TokenError::GenerationFailed)?;
        let refresh_claims = Claims::new(
            principal,
            TokenType::Refresh,
            family_id,
            sequence,
            &self.config.issuer,
            now,
            self.config.refresh_token_ttl,
        )
        .ok_or(TokenError::GenerationFailed)?;

        Ok(TokenPair {
            access_token: self.codec.encode(&access_claims)?,
            refresh_token: self.codec.encode(&refresh_claims)?,
            access_expires_in: self.config.access_token_ttl.num_seconds(),
            refresh_expires_in: self.config.refresh_token_ttl.num_seconds(),
            family_id,
            sequence,
        })
    }
}
