//! Shared handler helpers

pub mod error;

pub use error::{handle_domain_error, handle_validation_error, json_error_handler};
