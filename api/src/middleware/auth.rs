//! Bearer token authentication middleware for protecting API endpoints.
//!
//! The middleware extracts the access token from the Authorization header,
//! verifies it through the token lifecycle manager (signature, expiry, type
//! and lineage status) and injects the principal into the request.

use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorUnauthorized, InternalError},
    http::header::AUTHORIZATION,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use async_trait::async_trait;
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    rc::Rc,
    sync::Arc,
    task::{Context, Poll},
};

use tl_core::domain::entities::principal::Principal;
use tl_core::errors::{DomainError, TokenError};
use tl_core::repositories::SessionRepository;
use tl_core::services::TokenLifecycleManager;

use crate::handlers::handle_domain_error;

/// Authenticated principal injected into requests
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
}

/// Verifies access tokens; object safe so the middleware is not generic over the store
#[async_trait]
pub trait AccessVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, DomainError>;
}

#[async_trait]
impl<S> AccessVerifier for TokenLifecycleManager<S>
where
    S: SessionRepository + ?Sized + 'static,
{
    async fn verify(&self, token: &str) -> Result<Principal, DomainError> {
        self.verify_access(token).await
    }
}

/// Bearer authentication middleware factory
pub struct JwtAuth {
    verifier: Arc<dyn AccessVerifier>,
}

impl JwtAuth {
    /// Creates the middleware around an access token verifier
    pub fn new(verifier: Arc<dyn AccessVerifier>) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddleware {
            service: Rc::new(service),
            verifier: Arc::clone(&self.verifier),
        }))
    }
}

/// Bearer authentication middleware service
pub struct JwtAuthMiddleware<S> {
    service: Rc<S>,
    verifier: Arc<dyn AccessVerifier>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let verifier = Arc::clone(&self.verifier);

        Box::pin(async move {
            // A missing header is reported like any other malformed credential.
            let token = match extract_bearer_token(&req) {
                Some(token) => token,
                None => return Err(rejection(TokenError::Malformed.into())),
            };

            let principal = verifier.verify(&token).await.map_err(rejection)?;

            req.extensions_mut().insert(AuthContext { principal });

            service.call(req).await
        })
    }
}

/// Wraps a verification failure so the client gets the usual error body
fn rejection(err: DomainError) -> Error {
    let message = err.to_string();
    InternalError::from_response(message, handle_domain_error(err)).into()
}

/// Extracts Bearer token from Authorization header
fn extract_bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|s| s.to_string())
}

/// Extractor for required authentication
impl FromRequest for AuthContext {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let result = req
            .extensions()
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| ErrorUnauthorized("Authentication required"));

        ready(result)
    }
}
