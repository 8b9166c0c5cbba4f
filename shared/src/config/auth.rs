//! Token signing and session lineage configuration

use serde::{Deserialize, Serialize};

use super::{env_opt, env_or};

const DEFAULT_SECRET: &str = "development-secret-please-change-in-production";

/// Upper bound for token lifetimes and clock skew leeway (ten years)
pub const MAX_LIFETIME_SECONDS: i64 = 10 * 365 * 86400;

/// Signing keys and token lifetimes
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Secret used to sign new tokens
    pub signing_secret: String,

    /// Explicit key id for the signing secret (derived from the secret when absent)
    #[serde(default)]
    pub signing_key_id: Option<String>,

    /// Secret retired by the last rotation, still accepted during its grace period
    #[serde(default)]
    pub previous_secret: Option<String>,

    /// Explicit key id for the previous secret
    #[serde(default)]
    pub previous_key_id: Option<String>,

    /// Signing algorithm (HS256, HS384 or HS512)
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Access token lifetime in seconds
    pub access_token_ttl: i64,

    /// Refresh token lifetime in seconds
    pub refresh_token_ttl: i64,

    /// Clock skew tolerance in seconds applied to expiry and issued-at checks
    #[serde(default)]
    pub leeway: i64,

    /// Issuer claim stamped into and required from every token
    pub issuer: String,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("signing_secret", &"<redacted>")
            .field("signing_key_id", &self.signing_key_id)
            .field("previous_secret", &self.previous_secret.as_ref().map(|_| "<redacted>"))
            .field("previous_key_id", &self.previous_key_id)
            .field("algorithm", &self.algorithm)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("leeway", &self.leeway)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            signing_secret: DEFAULT_SECRET.to_string(),
            signing_key_id: None,
            previous_secret: None,
            previous_key_id: None,
            algorithm: default_algorithm(),
            access_token_ttl: 900,     // 15 minutes
            refresh_token_ttl: 604800, // 7 days
            leeway: 0,
            issuer: String::from("tokenline"),
        }
    }
}

impl TokenConfig {
    /// Create a token configuration with the given signing secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            signing_secret: secret.into(),
            ..Default::default()
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            signing_secret: env_opt("AUTH_SIGNING_SECRET").unwrap_or(defaults.signing_secret),
            signing_key_id: env_opt("AUTH_SIGNING_KEY_ID"),
            previous_secret: env_opt("AUTH_PREVIOUS_SECRET"),
            previous_key_id: env_opt("AUTH_PREVIOUS_KEY_ID"),
            algorithm: env_opt("AUTH_ALGORITHM").unwrap_or(defaults.algorithm),
            access_token_ttl: env_or("AUTH_ACCESS_TOKEN_TTL", defaults.access_token_ttl),
            refresh_token_ttl: env_or("AUTH_REFRESH_TOKEN_TTL", defaults.refresh_token_ttl),
            leeway: env_or("AUTH_CLOCK_SKEW_LEEWAY", defaults.leeway),
            issuer: env_opt("AUTH_ISSUER").unwrap_or(defaults.issuer),
        }
    }

    /// Set the previous (grace period) secret
    pub fn with_previous_secret(mut self, secret: impl Into<String>) -> Self {
        self.previous_secret = Some(secret.into());
        self
    }

    /// Set access token lifetime in minutes
    pub fn with_access_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_token_ttl = minutes * 60;
        self
    }

    /// Set refresh token lifetime in days
    pub fn with_refresh_ttl_days(mut self, days: i64) -> Self {
        self.refresh_token_ttl = days * 86400;
        self
    }

    /// Set the clock skew leeway in seconds
    pub fn with_leeway(mut self, seconds: i64) -> Self {
        self.leeway = seconds;
        self
    }

    /// Longest lifetime of any token this deployment issues
    pub fn longest_token_ttl(&self) -> i64 {
        self.access_token_ttl.max(self.refresh_token_ttl)
    }

    /// Check if using the built-in development secret
    pub fn is_using_default_secret(&self) -> bool {
        self.signing_secret == DEFAULT_SECRET
    }

    /// Check lifetimes and secrets for obviously broken values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        if self.signing_secret.is_empty() {
            problems.push("signing secret must not be empty".to_string());
        }
        if self.previous_secret.as_deref() == Some(self.signing_secret.as_str()) {
            problems.push("previous secret must differ from the signing secret".to_string());
        }
        if self.access_token_ttl <= 0 {
            problems.push("access token ttl must be positive".to_string());
        }
        if self.refresh_token_ttl <= 0 {
            problems.push("refresh token ttl must be positive".to_string());
        }
        if self.leeway < 0 {
            problems.push("clock skew leeway must not be negative".to_string());
        }
        for (name, value) in [
            ("access token ttl", self.access_token_ttl),
            ("refresh token ttl", self.refresh_token_ttl),
            ("clock skew leeway", self.leeway),
        ] {
            if value > MAX_LIFETIME_SECONDS {
                problems.push(format!("{} must not exceed {} seconds", name, MAX_LIFETIME_SECONDS));
            }
        }
        if self.issuer.is_empty() {
            problems.push("issuer must not be empty".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// Which backend holds refresh token lineages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    /// Process-local store, lost on restart
    Memory,
    /// MySQL-backed store
    MySql,
}

impl Default for SessionStoreKind {
    fn default() -> Self {
        SessionStoreKind::Memory
    }
}

impl std::str::FromStr for SessionStoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(SessionStoreKind::Memory),
            "mysql" => Ok(SessionStoreKind::MySql),
            _ => Err(format!("Invalid session store: {}", s)),
        }
    }
}

/// Complete authentication configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Token configuration
    pub token: TokenConfig,

    /// Session store backend
    #[serde(default)]
    pub session_store: SessionStoreKind,

    /// How often stale lineages are purged, in seconds (0 disables cleanup)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

impl AuthConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        Self {
            token: TokenConfig::from_env(),
            session_store: env_or("SESSION_STORE", SessionStoreKind::Memory),
            cleanup_interval_seconds: env_or(
                "CLEANUP_INTERVAL_SECONDS",
                default_cleanup_interval(),
            ),
        }
    }
}

fn default_algorithm() -> String {
    String::from("HS256")
}

fn default_cleanup_interval() -> u64 {
    3600
}
