//! Encoding and decoding of signed token payloads

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use tracing::{error, warn};

use crate::domain::entities::token::Claims;
use crate::errors::TokenError;
use crate::services::clock::Clock;

use super::key_manager::KeyManager;

/// Signs and verifies token payloads
///
/// Implementations hold no per-token state. `decode` must verify the
/// signature before reporting expiry, so that a forged token is never
/// answered with `Expired`.
pub trait TokenCodec: Send + Sync {
    /// Signs `claims` with the active key
    fn encode(&self, claims: &Claims) -> Result<String, TokenError>;

    /// Verifies and parses a token
    ///
    /// # Returns
    ///
    /// * `Ok(Claims)` - Signature, issuer and time window are valid
    /// * `Err(TokenError::Malformed)` - Not a parseable token
    /// * `Err(TokenError::SignatureInvalid)` - Unknown key, bad signature or foreign issuer
    /// * `Err(TokenError::Expired)` - Authentic but past its expiry
    fn decode(&self, token: &str) -> Result<Claims, TokenError>;
}

/// JWT codec over the HMAC keys held by a [`KeyManager`]
pub struct JwtCodec {
    keys: Arc<KeyManager>,
    clock: Arc<dyn Clock>,
    issuer: String,
    leeway: i64,
}

impl JwtCodec {
    pub fn new(
        keys: Arc<KeyManager>,
        clock: Arc<dyn Clock>,
        issuer: impl Into<String>,
        leeway: i64,
    ) -> Self {
        Self {
            keys,
            clock,
            issuer: issuer.into(),
            leeway,
        }
    }
}

fn classify(err: &jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidIssuer | ErrorKind::InvalidAlgorithm => {
            TokenError::SignatureInvalid
        }
        _ => TokenError::Malformed,
    }
}

impl TokenCodec for JwtCodec {
    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        let key = self.keys.active_key();
        let mut header = Header::new(key.algorithm);
        header.kid = Some(key.key_id.clone());

        encode(&header, claims, &EncodingKey::from_secret(key.secret())).map_err(|e| {
            error!(key_id = %key.key_id, error = %e, "Failed to sign token");
            TokenError::GenerationFailed
        })
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let header = decode_header(token).map_err(|_| TokenError::Malformed)?;
        let key_id = header.kid.ok_or(TokenError::Malformed)?;

        let key = self.keys.key_by_id(&key_id).map_err(|_| {
            warn!(
                target: "security",
                key_id = %key_id,
                "Token signed with unknown or aged-out key"
            );
            TokenError::SignatureInvalid
        })?;
        if header.alg != key.algorithm {
            warn!(
                target: "security",
                key_id = %key_id,
                alg = ?header.alg,
                "Token algorithm does not match its key"
            );
            return Err(TokenError::SignatureInvalid);
        }

        let mut validation = Validation::new(key.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<Claims>(token, &DecodingKey::from_secret(key.secret()), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let kind = classify(&e);
                if kind == TokenError::SignatureInvalid {
                    warn!(
                        target: "security",
                        key_id = %key_id,
                        error = %e,
                        "Token failed signature or issuer check"
                    );
                }
                kind
            })?;

        let now = self.clock.now();
        if claims.is_issued_in_future(now, self.leeway) {
            return Err(TokenError::Malformed);
        }
        if claims.is_expired_at(now, self.leeway) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
