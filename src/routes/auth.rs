use actix_web::http::StatusCode;
use actix_web::{post, web, HttpRequest, HttpResponse};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    hash_password, verify_password, LoginRequest, RegisterRequest, TokenResponse, TokenService,
};
use crate::config::Config;
use crate::error::AppError;
use crate::middleware::request_id;
use crate::models::{User, UserOut};
use crate::response::{success_response, ErrorDetail};

/// Register a new user account.
///
/// Checks email uniqueness before insert (the unique index backstops the
/// race), hashes the password, and echoes `{user_id, email}` in a 201
/// envelope. A duplicate email answers 400 with `EMAIL_ALREADY_EXISTS`.
#[post("/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    payload: web::Json<RegisterRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let request_id = request_id::current(&req);
    payload.validate()?;

    let existing = sqlx::query("SELECT user_id FROM users WHERE email = $1")
        .bind(&payload.email)
        .fetch_optional(pool.get_ref())
        .await?;

    if existing.is_some() {
        log::warn!(
            "request_id={} registration rejected: email already registered",
            request_id
        );
        return Err(AppError::Conflict(
            "Email already registered".to_string(),
            vec![ErrorDetail::field("email", "EMAIL_ALREADY_EXISTS")],
        ));
    }

    let password_hash = hash_password(&payload.password, config.bcrypt_cost)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (user_id, email, password_hash) VALUES ($1, $2, $3) \
         RETURNING user_id, email, password_hash, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(&payload.email)
    .bind(&password_hash)
    .fetch_one(pool.get_ref())
    .await?;

    log::info!(
        "request_id={} user registered user_id={}",
        request_id,
        user.user_id
    );

    Ok(success_response(
        &request_id,
        StatusCode::CREATED,
        "User registered successfully",
        UserOut::from(user),
    ))
}

/// Authenticate a user and issue a bearer access token.
///
/// Unknown email and wrong password produce the identical 401 so the
/// endpoint cannot be used to probe which addresses exist.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
    payload: web::Json<LoginRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let request_id = request_id::current(&req);
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        "SELECT user_id, email, password_hash, created_at, updated_at \
         FROM users WHERE email = $1",
    )
    .bind(&payload.email)
    .fetch_optional(pool.get_ref())
    .await?;

    let user = match user {
        Some(user) => user,
        None => {
            log::warn!("request_id={} login failed: invalid credentials", request_id);
            return Err(AppError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        log::warn!("request_id={} login failed: invalid credentials", request_id);
        return Err(AppError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let token = tokens.issue(user.user_id)?;
    log::info!(
        "request_id={} login successful user_id={}",
        request_id,
        user.user_id
    );

    Ok(success_response(
        &request_id,
        StatusCode::OK,
        "Login successful",
        TokenResponse::bearer(token),
    ))
}
