use std::future::{ready, Ready};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;

use crate::errors::AppError;
use crate::models::UserRole;
use crate::service::auth::jwt;

/// Caller identity, decoded from the bearer token and stashed in the
/// request extensions for the handlers.
#[derive(Debug, Clone)]
pub struct AuthData {
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
}

/// Pulls the identity the middleware stored. Missing data means the scope
/// was wired without the middleware, which is a routing bug, and surfaces
/// as 401 rather than a panic.
pub fn auth_data(req: &HttpRequest) -> Result<AuthData, AppError> {
    req.extensions()
        .get::<AuthData>()
        .cloned()
        .ok_or(AppError::Unauthorized)
}

pub fn require_role(auth: &AuthData, role: UserRole) -> Result<(), AppError> {
    if auth.role == role {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let claims = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| jwt::decode_claims(token).ok());

        let claims = match claims {
            Some(claims) => claims,
            None => {
                return Box::pin(async { Err(AppError::Unauthorized.into()) });
            }
        };

        req.extensions_mut().insert(AuthData {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        });

        let fut = self.service.call(req);
        Box::pin(fut)
    }
}
