//! # Tokenline Core
//!
//! Core domain layer for the Tokenline token service.
//! This crate contains the domain entities, the signing key ring, the token
//! codec, the session (refresh lineage) store interface and the token
//! lifecycle manager that ties them together.

pub mod domain;
pub mod errors;
pub mod repositories;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::*;
pub use errors::*;
pub use repositories::*;
pub use services::*;
