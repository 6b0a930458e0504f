use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use sqlx::PgPool;

use crate::auth::token::Claims;
use crate::error::AppError;
use crate::middleware::request_id;
use crate::models::User;

/// The authenticated identity for the current request.
///
/// `AuthGuard` has already verified the bearer token and stashed its claims
/// in the request extensions; this extractor finishes the guard walk by
/// resolving the subject to a live user row. A verified token whose subject
/// has no user record resolves to 404, not 401: the token was genuine, the
/// resource behind it is gone.
#[derive(Debug)]
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let request_id = request_id::current(&req);

            let claims = req.extensions().get::<Claims>().cloned();
            let claims = match claims {
                Some(claims) => claims,
                None => {
                    log::warn!(
                        "request_id={} identity: no verified claims on request",
                        request_id
                    );
                    return Err(
                        AppError::Unauthorized("Authentication required".to_string()).into()
                    );
                }
            };

            let pool = match req.app_data::<web::Data<PgPool>>() {
                Some(pool) => pool.clone(),
                None => {
                    return Err(
                        AppError::Internal("Database pool is not configured".to_string()).into(),
                    );
                }
            };

            let user = sqlx::query_as::<_, User>(
                "SELECT user_id, email, password_hash, created_at, updated_at \
                 FROM users WHERE user_id = $1",
            )
            .bind(claims.sub)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(AppError::from)?;

            match user {
                Some(user) => {
                    log::info!(
                        "request_id={} identity: resolved user {}",
                        request_id,
                        user.user_id
                    );
                    Ok(CurrentUser(user))
                }
                None => {
                    log::warn!(
                        "request_id={} identity: subject {} has no user record",
                        request_id,
                        claims.sub
                    );
                    Err(AppError::NotFound("User not found".to_string()).into())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use actix_web::ResponseError;

    #[actix_rt::test]
    async fn test_extractor_without_claims_is_unauthorized() {
        // No AuthGuard ran, so no claims are present.
        let req = test::TestRequest::default().to_http_request();

        let mut payload = Payload::None;
        let result = CurrentUser::from_request(&req, &mut payload).await;
        assert!(result.is_err());

        let err = result.unwrap_err();
        let response = err.as_response_error().error_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
