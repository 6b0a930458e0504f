//!
//! # Request Correlation and Logging
//!
//! Mints exactly one correlation id per inbound request, stores it in the
//! request extensions, and guarantees two things on every exit path:
//!
//! 1. the `X-Request-ID` response header carries the id, and
//! 2. error responses are rebuilt as envelopes carrying the same id.
//!
//! It also writes the per-request log line (method, path, status, duration,
//! client) at info below 400 and error at 400 and above. The id is minted
//! here and nowhere else; everything downstream reads it from extensions.

use std::fmt;
use std::time::Instant;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpMessage, HttpRequest, HttpResponse};
use futures::future::{ready, LocalBoxFuture, Ready};
use uuid::Uuid;

use crate::error::AppError;
use crate::response;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The per-request correlation id. Minted once when the request enters the
/// service; never regenerated afterwards.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reads the current request's correlation id from its extensions. Only
/// requests served outside `RequestLogger` (bare test harnesses) miss one.
pub fn current(req: &HttpRequest) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequestLoggerService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerService { service }))
    }
}

pub struct RequestLoggerService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_id = RequestId::mint();
        req.extensions_mut().insert(request_id.clone());

        let method = req.method().to_string();
        let path = req.path().to_string();
        let client = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        // Kept for rebuilding a response when the inner service errors out.
        let http_req = req.request().clone();
        let started = Instant::now();

        let fut = self.service.call(req);
        Box::pin(async move {
            let mut res = match fut.await {
                Ok(res) => {
                    let rebuilt = res
                        .response()
                        .error()
                        .map(|err| envelope_from_error(err, &request_id));
                    match rebuilt {
                        Some(body) => {
                            let (inner_req, _) = res.into_parts();
                            ServiceResponse::new(inner_req, body).map_into_right_body()
                        }
                        None => res.map_into_left_body(),
                    }
                }
                Err(err) => {
                    let body = envelope_from_error(&err, &request_id);
                    ServiceResponse::new(http_req, body).map_into_right_body()
                }
            };

            let header_value = HeaderValue::from_str(&request_id.0)
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            res.headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), header_value);

            let status = res.status();
            let duration_ms = started.elapsed().as_millis();
            if status.as_u16() >= 400 {
                log::error!(
                    "request_id={} {} {} -> {} [{}ms] client={}",
                    request_id,
                    method,
                    path,
                    status,
                    duration_ms,
                    client
                );
            } else {
                log::info!(
                    "request_id={} {} {} -> {} [{}ms] client={}",
                    request_id,
                    method,
                    path,
                    status,
                    duration_ms,
                    client
                );
            }

            Ok(res)
        })
    }
}

/// Rebuilds an error as an envelope carrying the request's correlation id.
/// Application errors keep their taxonomy mapping; foreign errors (failed
/// extractors, framework errors) keep their status, with server-side detail
/// replaced by a generic message.
fn envelope_from_error(err: &Error, request_id: &RequestId) -> HttpResponse {
    if let Some(app_err) = err.as_error::<AppError>() {
        return response::error_response(
            &request_id.0,
            app_err.status(),
            app_err.client_message(),
            app_err.details(),
        );
    }

    let status = err.as_response_error().status_code();
    let message = if status.is_server_error() {
        "Internal server error".to_string()
    } else {
        err.to_string()
    };
    response::error_response(&request_id.0, status, message, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App};

    async fn ok_handler() -> Result<HttpResponse, AppError> {
        Ok(HttpResponse::Ok().json(serde_json::json!({ "pong": true })))
    }

    async fn failing_handler() -> Result<HttpResponse, AppError> {
        Err(AppError::NotFound("Task not found".to_string()))
    }

    #[actix_rt::test]
    async fn test_response_carries_request_id_header() {
        let app = test::init_service(
            App::new()
                .wrap(RequestLogger)
                .route("/ping", web::get().to(ok_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/ping").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        let header = resp
            .headers()
            .get("X-Request-ID")
            .expect("X-Request-ID header missing")
            .to_str()
            .unwrap()
            .to_string();
        assert!(Uuid::parse_str(&header).is_ok());
    }

    #[actix_rt::test]
    async fn test_error_body_and_header_share_one_request_id() {
        let app = test::init_service(
            App::new()
                .wrap(RequestLogger)
                .route("/missing", web::get().to(failing_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/missing").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 404);
        let header = resp
            .headers()
            .get("X-Request-ID")
            .expect("X-Request-ID header missing")
            .to_str()
            .unwrap()
            .to_string();

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Task not found");
        assert_eq!(body["request_id"], header.as_str());
    }

    #[actix_rt::test]
    async fn test_internal_error_detail_is_not_leaked() {
        async fn exploding() -> Result<HttpResponse, AppError> {
            Err(AppError::Database("connection refused on 10.0.0.3".to_string()))
        }

        let app = test::init_service(
            App::new()
                .wrap(RequestLogger)
                .route("/boom", web::get().to(exploding)),
        )
        .await;

        let req = test::TestRequest::get().uri("/boom").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(!body["request_id"].as_str().unwrap().is_empty());
    }
}
