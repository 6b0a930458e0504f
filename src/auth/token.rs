use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user id the token authenticates.
    pub sub: Uuid,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch. Expiry is the only way a token dies;
    /// there is no revocation list.
    pub exp: i64,
}

/// Issues and verifies signed access tokens. Holds the process-wide signing
/// secret and default TTL, both injected from configuration at startup.
/// Rotating the secret invalidates every outstanding token.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Issues a token for `subject` with the default TTL.
    pub fn issue(&self, subject: Uuid) -> Result<String, AppError> {
        self.issue_with_ttl(subject, self.ttl)
    }

    /// Issues a token with an explicit TTL. The TTL parameter doubles as the
    /// clock seam for tests: a negative TTL yields an already-expired token.
    pub fn issue_with_ttl(&self, subject: Uuid, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verifies a token and returns its claims. Malformed structure, a bad
    /// signature, and expiry all collapse into the same opaque error so a
    /// caller cannot probe which check failed.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))
    }
}
