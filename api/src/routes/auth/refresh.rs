use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::app::AppState;
use crate::dto::{RefreshTokenRequest, TokenPairResponse};
use crate::handlers::{handle_domain_error, handle_validation_error};

/// Handler for POST /auth/tokens/refresh
///
/// Exchanges a refresh token for a new pair. The presented refresh token is
/// consumed; presenting it again revokes the whole session.
///
/// # Request Body
///
/// ```json
/// {
///     "refresh_token": "eyJ..."
/// }
/// ```
///
/// # Response
///
/// ## Success (200 OK)
/// ```json
/// {
///     "access_token": "eyJ...",
///     "refresh_token": "eyJ...",
///     "token_type": "Bearer",
///     "expires_in": 900,
///     "refresh_expires_in": 604800
/// }
/// ```
///
/// ## Errors
/// - 401 Unauthorized: Expired, malformed, forged or access token presented
/// - 403 Forbidden: Token reuse detected or session revoked
/// - 503 Service Unavailable: Session store unreachable
pub async fn refresh_tokens(
    state: web::Data<AppState>,
    request: web::Json<RefreshTokenRequest>,
) -> HttpResponse {
    if let Err(errors) = request.validate() {
        return handle_validation_error(errors);
    }

    match state.lifecycle.refresh(&request.refresh_token).await {
        Ok(pair) => HttpResponse::Ok().json(TokenPairResponse::from(pair)),
        Err(err) => handle_domain_error(err),
    }
}
