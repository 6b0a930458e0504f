use bcrypt::{hash, verify};

use crate::error::AppError;

/// Hashes a plaintext password with bcrypt. The cost factor is a fixed
/// tunable from configuration, never request-dependent. Each call salts
/// independently, so equal inputs produce different hashes.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verifies a plaintext password against a stored hash. A hash that cannot
/// be parsed reports a non-match rather than an error; the plaintext is
/// never logged.
pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AppError> {
    match verify(password, hashed_password) {
        Ok(matches) => Ok(matches),
        Err(bcrypt::BcryptError::InvalidHash(_)) => Ok(false),
        Err(e) => Err(AppError::Internal(format!(
            "Failed to verify password: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // MIN_COST keeps the test suite fast; production cost comes from config.
    const TEST_COST: u32 = 4; // bcrypt minimum cost (MIN_COST is private in bcrypt 0.15)

    #[test]
    fn test_password_hashing_and_verification() {
        let password = "test_password123";
        let hashed = hash_password(password, TEST_COST).unwrap();

        assert!(verify_password(password, &hashed).unwrap());
        assert!(!verify_password("wrong_password", &hashed).unwrap());
    }

    #[test]
    fn test_hashing_is_salted() {
        let password = "same_password";
        let first = hash_password(password, TEST_COST).unwrap();
        let second = hash_password(password, TEST_COST).unwrap();

        assert_ne!(first, second);
        assert!(verify_password(password, &first).unwrap());
        assert!(verify_password(password, &second).unwrap());
    }

    #[test]
    fn test_verify_with_malformed_hash_is_a_non_match() {
        assert!(!verify_password("test_password123", "invalidhashformat").unwrap());
    }
}
