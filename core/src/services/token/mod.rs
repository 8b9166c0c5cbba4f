//! Token lifecycle module
//!
//! This module handles all token-related operations including:
//! - Signing key ring with rotation and retention of retired keys
//! - JWT encoding and verification
//! - Issuance, single-use refresh rotation with reuse detection, revocation
//! - Background cleanup of dead refresh lineages

mod cleanup;
mod codec;
mod config;
mod key_manager;
mod retry;
mod service;

#[cfg(test)]
mod tests;

pub use cleanup::{CleanupResult, TokenCleanupConfig, TokenCleanupService};
pub use codec::{JwtCodec, TokenCodec};
pub use config::TokenServiceConfig;
pub use key_manager::{parse_algorithm, KeyManager};
pub use retry::RetryPolicy;
pub use service::TokenLifecycleManager;
