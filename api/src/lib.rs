//! # Tokenline API
//!
//! Actix-web transport over the token lifecycle manager: issuance, refresh,
//! revocation, bearer-authenticated session lookup and health.

pub mod app;
pub mod config;
pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod telemetry;

pub use app::{create_app, AppState};
