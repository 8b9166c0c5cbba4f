//! Token entities for JWT-based authentication.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::principal::Principal;

/// Token type reported to clients alongside a token pair
pub const BEARER_TOKEN_TYPE: &str = "Bearer";

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived credential for resource access
    Access,
    /// Long-lived credential used only to obtain a new pair
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims structure for JWT payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal id)
    pub sub: String,

    /// Principal email at issuance
    pub email: String,

    /// Principal role at issuance
    pub role: String,

    /// Issuer
    pub iss: String,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,

    /// JWT ID (unique identifier for the token)
    pub jti: String,

    /// Access or refresh
    #[serde(rename = "typ")]
    pub token_type: TokenType,

    /// Rotation lineage this token belongs to
    #[serde(rename = "fam")]
    pub family_id: Uuid,

    /// Position within the lineage
    #[serde(rename = "seq")]
    pub sequence: u64,
}

impl Claims {
    /// Creates claims for `principal` valid from `issued_at` for `ttl`
    ///
    /// Returns `None` when the expiry is not representable.
    pub fn new(
        principal: &Principal,
        token_type: TokenType,
        family_id: Uuid,
        sequence: u64,
        issuer: &str,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Option<Self> {
        let expires_at = issued_at.checked_add_signed(ttl)?;
        Some(Self {
            sub: principal.id.clone(),
            email: principal.email.clone(),
            role: principal.role.clone(),
            iss: issuer.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
            family_id,
            sequence,
        })
    }

    /// The identity snapshot carried by the token
    pub fn principal(&self) -> Principal {
        Principal::new(self.sub.clone(), self.email.clone(), self.role.clone())
    }

    /// Whether the token has expired at `now`, allowing `leeway` seconds of skew
    pub fn is_expired_at(&self, now: DateTime<Utc>, leeway: i64) -> bool {
        now.timestamp() >= self.exp.saturating_add(leeway)
    }

    /// Whether the token claims to be issued after `now` beyond `leeway` seconds
    pub fn is_issued_in_future(&self, now: DateTime<Utc>, leeway: i64) -> bool {
        self.iat > now.timestamp().saturating_add(leeway)
    }
}

/// Token pair returned to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// JWT access token
    pub access_token: String,

    /// JWT refresh token
    pub refresh_token: String,

    /// Access token lifetime in seconds
    pub access_expires_in: i64,

    /// Refresh token lifetime in seconds
    pub refresh_expires_in: i64,

    /// Lineage the refresh token belongs to
    pub family_id: Uuid,

    /// Sequence of the refresh token within its lineage
    pub sequence: u64,
}
