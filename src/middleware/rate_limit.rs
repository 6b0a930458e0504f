//!
//! # Request Rate Limiting
//!
//! Fixed-window limiter keyed by client address, applied app-wide. Windows
//! live in a process-local map, the only in-process mutable state besides
//! configuration. Exceeding the window's allowance answers 429 through the
//! envelope.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::error::AppError;
use crate::middleware::request_id;

// Prune threshold for the window map.
const MAX_TRACKED_CLIENTS: usize = 10_000;

struct WindowState {
    window_start: Instant,
    count: u32,
}

#[derive(Clone)]
pub struct RateLimit {
    limit: u32,
    window: Duration,
    state: Arc<Mutex<HashMap<String, WindowState>>>,
}

impl RateLimit {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Counts one request against `key`'s current window. Returns false once
    /// the window's allowance is spent.
    fn admit(&self, key: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();

        if state.len() > MAX_TRACKED_CLIENTS {
            let window = self.window;
            state.retain(|_, w| now.duration_since(w.window_start) < window);
        }

        let entry = state.entry(key.to_string()).or_insert(WindowState {
            window_start: now,
            count: 0,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.window_start = now;
            entry.count = 0;
        }

        entry.count += 1;
        entry.count <= self.limit
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimitService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimitService<S> {
    service: S,
    limiter: RateLimit,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
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
        let client = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        if self.limiter.admit(&client) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let request_id = request_id::current(req.request());
        log::warn!(
            "request_id={} rate limit exceeded for client={}",
            request_id,
            client
        );
        Box::pin(async move {
            Err(AppError::RateLimited("Too many requests".to_string()).into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::request_id::RequestLogger;
    use actix_web::{test as actix_test, web, App, HttpResponse};

    async fn ok_handler() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[test]
    fn test_window_admits_up_to_limit() {
        let limiter = RateLimit::new(3, Duration::from_secs(60));
        assert!(limiter.admit("10.0.0.1"));
        assert!(limiter.admit("10.0.0.1"));
        assert!(limiter.admit("10.0.0.1"));
        assert!(!limiter.admit("10.0.0.1"));

        // Another client has its own window.
        assert!(limiter.admit("10.0.0.2"));
    }

    #[test]
    fn test_window_resets_after_rollover() {
        let limiter = RateLimit::new(1, Duration::from_millis(20));
        assert!(limiter.admit("10.0.0.1"));
        assert!(!limiter.admit("10.0.0.1"));

        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.admit("10.0.0.1"));
    }

    #[actix_rt::test]
    async fn test_exceeding_the_limit_answers_429_envelope() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimit::new(2, Duration::from_secs(60)))
                .wrap(RequestLogger)
                .route("/ping", web::get().to(ok_handler)),
        )
        .await;

        for _ in 0..2 {
            let req = actix_test::TestRequest::get().uri("/ping").to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert!(resp.status().is_success());
        }

        let req = actix_test::TestRequest::get().uri("/ping").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), 429);

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Too many requests");
        assert!(!body["request_id"].as_str().unwrap().is_empty());
    }
}
