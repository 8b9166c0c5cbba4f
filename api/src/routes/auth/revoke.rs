use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::app::AppState;
use crate::dto::RevokeTokenRequest;
use crate::handlers::{handle_domain_error, handle_validation_error};

/// Handler for POST /auth/tokens/revoke
///
/// Ends the session the token belongs to. Revoking an already revoked
/// session succeeds.
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
/// - 204 No Content: Session revoked
/// - 401 Unauthorized: Token cannot be decoded (expired, malformed or forged)
pub async fn revoke_tokens(
    state: web::Data<AppState>,
    request: web::Json<RevokeTokenRequest>,
) -> HttpResponse {
    if let Err(errors) = request.validate() {
        return handle_validation_error(errors);
    }

    match state.lifecycle.revoke(&request.refresh_token).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => handle_domain_error(err),
    }
}
