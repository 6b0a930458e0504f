//!
//! # Bearer-Token Guard
//!
//! Middleware for the protected task scope. Walks the credential through the
//! guard states (no credential, credential present, token valid) and either
//! stashes the verified claims in the request extensions or rejects with 401.
//! Resolving the subject to a live user row is the job of the `CurrentUser`
//! extractor, which reports a missing user as 404 rather than 401.
//!
//! Every transition logs with the request's correlation id.

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::{web, Error, HttpMessage};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::token::TokenService;
use crate::error::AppError;
use crate::middleware::request_id;

pub struct AuthGuard;

impl<S, B> Transform<S, ServiceRequest> for AuthGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthGuardService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthGuardService { service }))
    }
}

pub struct AuthGuardService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthGuardService<S>
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
        let request_id = request_id::current(req.request());

        let bearer = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);

        let token = match bearer {
            Some(token) => token,
            None => {
                log::warn!(
                    "request_id={} auth guard: missing or malformed bearer credential",
                    request_id
                );
                return Box::pin(async move {
                    Err(AppError::Unauthorized(
                        "Missing or invalid Authorization header".to_string(),
                    )
                    .into())
                });
            }
        };

        let tokens = match req.app_data::<web::Data<TokenService>>() {
            Some(tokens) => tokens.clone(),
            None => {
                return Box::pin(async move {
                    Err(AppError::Internal("Token service is not configured".to_string()).into())
                });
            }
        };

        match tokens.verify(&token) {
            Ok(claims) => {
                log::info!(
                    "request_id={} auth guard: token verified for subject {}",
                    request_id,
                    claims.sub
                );
                req.extensions_mut().insert(claims);
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Err(err) => {
                log::warn!("request_id={} auth guard: token rejected", request_id);
                Box::pin(async move { Err(err.into()) })
            }
        }
    }
}
