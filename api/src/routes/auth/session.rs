use actix_web::HttpResponse;

use crate::dto::SessionResponse;
use crate::middleware::AuthContext;

/// Handler for GET /auth/session
///
/// Requires `Authorization: Bearer <access token>`; returns the principal
/// snapshot embedded in the token.
///
/// ## Success (200 OK)
/// ```json
/// {
///     "principal_id": "user-42",
///     "email": "user42@example.com",
///     "role": "member"
/// }
/// ```
pub async fn current_session(auth: AuthContext) -> HttpResponse {
    HttpResponse::Ok().json(SessionResponse::from(auth.principal))
}
