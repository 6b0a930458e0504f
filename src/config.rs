use chrono::Duration;
use std::env;

/// Application configuration, loaded once at startup and passed to the
/// components that need it. Nothing reads the environment after this.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    /// Symmetric secret for signing access tokens. Rotating it invalidates
    /// every previously issued token.
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub rate_limit_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("DATABASE_MAX_CONNECTIONS must be a number"),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            token_ttl: Duration::days(
                env::var("TOKEN_TTL_DAYS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("TOKEN_TTL_DAYS must be a number"),
            ),
            bcrypt_cost: env::var("BCRYPT_COST")
                .unwrap_or_else(|_| bcrypt::DEFAULT_COST.to_string())
                .parse()
                .expect("BCRYPT_COST must be a number"),
            rate_limit_per_minute: env::var("RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .expect("RATE_LIMIT_PER_MINUTE must be a number"),
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var("JWT_SECRET", "a-test-secret-that-is-long-enough");

        let config = Config::from_env();

        assert_eq!(config.database_url, "postgres://test");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.token_ttl, Duration::days(30));
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.rate_limit_per_minute, 200);

        env::set_var("SERVER_PORT", "3000");
        env::set_var("TOKEN_TTL_DAYS", "7");

        let config = Config::from_env();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.token_ttl, Duration::days(7));
        assert_eq!(config.server_url(), "http://127.0.0.1:3000");

        env::remove_var("SERVER_PORT");
        env::remove_var("TOKEN_TTL_DAYS");
    }
}
