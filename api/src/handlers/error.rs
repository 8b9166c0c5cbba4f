//! Error handling utilities for converting domain errors to HTTP responses
//!
//! Error bodies never reveal lineage sequence numbers or key material, so a
//! client cannot tell how far a stolen token lags behind its lineage.

use actix_web::{error::InternalError, error::JsonPayloadError, HttpRequest, HttpResponse};
use tracing::error;
use validator::ValidationErrors;

use tl_core::errors::{AuthError, DomainError, TokenError};
use tl_shared::errors::{error_codes, ErrorResponse};

/// Converts a domain error into an HTTP response
pub fn handle_domain_error(err: DomainError) -> HttpResponse {
    match err {
        DomainError::Token(token_error) => handle_token_error(token_error),
        DomainError::Auth(auth_error) => handle_auth_error(auth_error),
        DomainError::Validation { message } => HttpResponse::BadRequest()
            .json(ErrorResponse::new(error_codes::VALIDATION_ERROR, message)),
        DomainError::NotFound { resource } => HttpResponse::NotFound().json(ErrorResponse::new(
            error_codes::NOT_FOUND,
            format!("{} not found", resource),
        )),
        other => {
            error!(error = %other, "Unhandled domain error");
            internal_error()
        }
    }
}

fn handle_token_error(err: TokenError) -> HttpResponse {
    let message = err.to_string();
    match err {
        TokenError::Malformed => HttpResponse::Unauthorized()
            .json(ErrorResponse::new(error_codes::TOKEN_MALFORMED, message)),
        TokenError::SignatureInvalid => HttpResponse::Unauthorized()
            .json(ErrorResponse::new(error_codes::TOKEN_INVALID, message)),
        TokenError::Expired => HttpResponse::Unauthorized()
            .json(ErrorResponse::new(error_codes::TOKEN_EXPIRED, message)),
        TokenError::WrongType => HttpResponse::Unauthorized()
            .json(ErrorResponse::new(error_codes::TOKEN_WRONG_TYPE, message)),
        TokenError::ReuseDetected => HttpResponse::Forbidden()
            .json(ErrorResponse::new(error_codes::TOKEN_REUSED, message)),
        TokenError::Revoked => HttpResponse::Forbidden()
            .json(ErrorResponse::new(error_codes::TOKEN_REVOKED, message)),
        TokenError::GenerationFailed => internal_error(),
        TokenError::Unavailable => service_unavailable(),
    }
}

fn handle_auth_error(err: AuthError) -> HttpResponse {
    match err {
        AuthError::PrincipalNotFound => HttpResponse::Unauthorized().json(ErrorResponse::new(
            error_codes::UNAUTHORIZED,
            "Authentication failed",
        )),
        AuthError::LookupFailed => service_unavailable(),
    }
}

fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse::new(
        error_codes::INTERNAL_ERROR,
        "An internal error occurred",
    ))
}

fn service_unavailable() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(ErrorResponse::new(
        error_codes::SERVICE_UNAVAILABLE,
        "Service temporarily unavailable, please retry",
    ))
}

/// Converts request body validation failures into a 400 response listing the offending fields
pub fn handle_validation_error(errors: ValidationErrors) -> HttpResponse {
    let mut response = ErrorResponse::new(error_codes::VALIDATION_ERROR, "Invalid request body");
    for (field, field_errors) in errors.field_errors() {
        let codes: Vec<String> = field_errors.iter().map(|e| e.code.to_string()).collect();
        response = response.add_detail(field.to_string(), codes);
    }
    HttpResponse::BadRequest().json(response)
}

/// JSON extractor error handler returning the shared error body
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse::new(
        error_codes::BAD_REQUEST,
        format!("Invalid JSON body: {}", err),
    ));
    InternalError::from_response(err, response).into()
}
