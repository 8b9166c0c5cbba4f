//! # Infrastructure Layer
//!
//! This crate implements the infrastructure layer for Tokenline. It provides
//! the MySQL-backed implementations of the persistence traits defined in
//! `tl_core`.
//!
//! ## Architecture
//!
//! The infrastructure layer contains:
//! - **Database**: connection pool management using SQLx
//! - **Session store**: refresh lineages with atomic sequence advancement
//! - **Principal directory**: principal lookup from the `users` table
//!
//! ## Features
//!
//! - `mysql`: Enable MySQL database support (default)

// Re-export core types for convenience
pub use tl_core::errors::*;

/// Database module - MySQL implementations using SQLx
#[cfg(feature = "mysql")]
pub mod database;

/// Configuration module for infrastructure services
pub mod config {
    //! Re-exports of the shared configuration consumed by this crate

    pub use tl_shared::config::DatabaseConfig;
}

/// Infrastructure-specific error types
#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Database connection error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
