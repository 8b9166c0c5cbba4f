use actix_web::{web, HttpResponse};
use tracing::{error, warn};
use validator::Validate;

use tl_core::errors::AuthError;

use crate::app::AppState;
use crate::dto::{IssueTokenRequest, TokenPairResponse};
use crate::handlers::{handle_domain_error, handle_validation_error};

/// Handler for POST /auth/tokens
///
/// Issues a new token pair, starting a new session, for a principal the
/// caller has already authenticated.
///
/// # Request Body
///
/// ```json
/// {
///     "principal_id": "user-42"
/// }
/// ```
///
/// # Response
///
/// ## Success (201 Created)
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
/// - 400 Bad Request: Missing or oversized principal id
/// - 401 Unauthorized: Unknown principal
/// - 503 Service Unavailable: Principal directory or session store unreachable
pub async fn issue_tokens(
    state: web::Data<AppState>,
    request: web::Json<IssueTokenRequest>,
) -> HttpResponse {
    if let Err(errors) = request.validate() {
        return handle_validation_error(errors);
    }

    let principal = match state.directory.find_principal(&request.principal_id).await {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            warn!(
                target: "security",
                principal_id = %request.principal_id,
                "Token requested for unknown principal"
            );
            return handle_domain_error(AuthError::PrincipalNotFound.into());
        }
        Err(err) => {
            error!(error = %err, "Principal lookup failed");
            return handle_domain_error(AuthError::LookupFailed.into());
        }
    };

    match state.lifecycle.issue(&principal).await {
        Ok(pair) => HttpResponse::Created().json(TokenPairResponse::from(pair)),
        Err(err) => handle_domain_error(err),
    }
}
