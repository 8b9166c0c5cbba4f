//! Configuration for the token lifecycle manager

use chrono::Duration;
use tl_shared::config::{TokenConfig, MAX_LIFETIME_SECONDS};

use super::retry::RetryPolicy;

/// Configuration for the token lifecycle manager
#[derive(Debug, Clone)]
pub struct TokenServiceConfig {
    /// Issuer written into and required from every token
    pub issuer: String,
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,
    /// Clock skew tolerance in seconds
    pub leeway: i64,
    /// Backoff applied when the session store reports contention
    pub retry: RetryPolicy,
}

impl Default for TokenServiceConfig {
    fn default() -> Self {
        Self {
            issuer: "tokenline".to_string(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            leeway: 0,
            retry: RetryPolicy::default(),
        }
    }
}

impl TokenServiceConfig {
    /// How long a retired signing key must keep verifying tokens
    ///
    /// The longest token lifetime plus the clock skew leeway.
    pub fn key_retention(&self) -> Duration {
        let longest = std::cmp::max(self.access_token_ttl, self.refresh_token_ttl);
        longest + Duration::seconds(self.leeway)
    }
}

/// Seconds clamped to `[0, MAX_LIFETIME_SECONDS]`.
///
/// `TokenConfig::validate` rejects values outside that range.
fn bounded_seconds(seconds: i64) -> i64 {
    seconds.clamp(0, MAX_LIFETIME_SECONDS)
}

impl From<&TokenConfig> for TokenServiceConfig {
    fn from(config: &TokenConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            access_token_ttl: Duration::seconds(bounded_seconds(config.access_token_ttl)),
            refresh_token_ttl: Duration::seconds(bounded_seconds(config.refresh_token_ttl)),
            leeway: bounded_seconds(config.leeway),
            retry: RetryPolicy::default(),
        }
    }
}
