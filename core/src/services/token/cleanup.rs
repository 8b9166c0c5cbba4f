//! Session cleanup service for periodic maintenance of refresh lineages
//!
//! Lineages whose newest refresh token has expired can no longer be advanced
//! or reused, so their records are deleted after a grace period.

use chrono::Duration;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::errors::DomainError;
use crate::repositories::SessionRepository;
use crate::services::clock::Clock;

/// Configuration for session cleanup service
#[derive(Debug, Clone)]
pub struct TokenCleanupConfig {
    /// How often to run cleanup (in seconds)
    pub interval_seconds: u64,
    /// Lifetime of refresh tokens; lineages idle for longer hold no live token
    pub refresh_token_ttl: Duration,
    /// Extra time a dead lineage is kept before deletion
    pub grace_period: Duration,
    /// Whether to enable automatic cleanup
    pub enabled: bool,
}

impl Default for TokenCleanupConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 3600, // Run every hour
            refresh_token_ttl: Duration::days(7),
            grace_period: Duration::days(1),
            enabled: true,
        }
    }
}

/// Service for deleting dead refresh lineages
pub struct TokenCleanupService<S: ?Sized> {
    sessions: Arc<S>,
    clock: Arc<dyn Clock>,
    config: TokenCleanupConfig,
}

impl<S: SessionRepository + ?Sized + 'static> TokenCleanupService<S> {
    /// Create a new session cleanup service
    pub fn new(sessions: Arc<S>, clock: Arc<dyn Clock>, config: TokenCleanupConfig) -> Self {
        Self {
            sessions,
            clock,
            config,
        }
    }

    /// Run a single cleanup cycle
    ///
    /// Deletes lineages not rotated since `now - refresh_token_ttl - grace_period`.
    ///
    /// # Returns
    /// * `Ok(CleanupResult)` - Summary of cleanup operations
    /// * `Err(DomainError)` - Never for store failures, which are collected in the result
    pub async fn run_cleanup(&self) -> Result<CleanupResult, DomainError> {
        if !self.config.enabled {
            return Ok(CleanupResult::default());
        }

        info!("Starting session cleanup cycle");

        let mut result = CleanupResult::default();
        let cutoff = self.clock.now() - self.config.refresh_token_ttl - self.config.grace_period;

        match self.sessions.purge_stale(cutoff).await {
            Ok(count) => {
                result.stale_sessions_deleted = count;
                info!("Deleted {} stale lineages", count);
            }
            Err(e) => {
                error!("Failed to purge stale lineages: {}", e);
                result.errors.push(format!("Session purge error: {}", e));
            }
        }

        Ok(result)
    }

    /// Start the cleanup service as a background task
    ///
    /// This spawns a tokio task that runs cleanup at regular intervals
    pub fn start_background_task(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.enabled {
            warn!("Session cleanup service is disabled");
            return None;
        }

        let interval = std::time::Duration::from_secs(self.config.interval_seconds.max(1));

        Some(tokio::spawn(async move {
            info!(
                "Session cleanup service started - will run every {} seconds",
                self.config.interval_seconds
            );

            let mut interval_timer = tokio::time::interval(interval);

            loop {
                interval_timer.tick().await;

                match self.run_cleanup().await {
                    Ok(result) => {
                        if !result.is_success() {
                            warn!("Cleanup completed with errors: {:?}", result.errors);
                        }
                    }
                    Err(e) => {
                        error!("Session cleanup cycle failed: {}", e);
                    }
                }
            }
        }))
    }
}

/// Result of a cleanup operation
#[derive(Debug, Default)]
pub struct CleanupResult {
    /// Number of stale lineages deleted
    pub stale_sessions_deleted: usize,
    /// Any errors encountered during cleanup
    pub errors: Vec<String>,
}

impl CleanupResult {
    /// Check if the cleanup was successful (no errors)
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get total number of items cleaned up
    pub fn total_cleaned(&self) -> usize {
        self.stale_sessions_deleted
    }
}
