//! Token route handlers
//!
//! - Issuing a token pair for a principal
//! - Refreshing (rotating) a token pair
//! - Revoking a session
//! - Reading the session behind a bearer access token

pub mod issue;
pub mod refresh;
pub mod revoke;
pub mod session;

use actix_web::web;
use std::sync::Arc;

use crate::middleware::{AccessVerifier, JwtAuth};

pub use issue::issue_tokens;
pub use refresh::refresh_tokens;
pub use revoke::revoke_tokens;
pub use session::current_session;

/// Registers the `/auth` scope
pub fn configure(cfg: &mut web::ServiceConfig, verifier: Arc<dyn AccessVerifier>) {
    cfg.service(
        web::scope("/auth")
            .route("/tokens", web::post().to(issue_tokens))
            .route("/tokens/refresh", web::post().to(refresh_tokens))
            .route("/tokens/revoke", web::post().to(revoke_tokens))
            .service(
                web::resource("/session")
                    .wrap(JwtAuth::new(verifier))
                    .route(web::get().to(current_session)),
            ),
    );
}
