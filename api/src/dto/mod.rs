//! Request and response bodies

pub mod auth_dto;

pub use auth_dto::*;
pub use tl_shared::errors::{error_codes, ErrorResponse};
