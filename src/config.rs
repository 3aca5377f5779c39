//! Environment-driven configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Cost range accepted by bcrypt.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid HOST/PORT configuration: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// Unset means the in-memory backend.
    pub database_url: Option<String>,
    pub session_ttl: Duration,
    pub session_prune_interval: Duration,
    pub admin_username: String,
    /// Pre-computed bcrypt hash; wins over `admin_password`.
    pub admin_password_hash: Option<String>,
    pub admin_password: String,
    /// True when neither admin password variable was provided.
    pub admin_password_is_default: bool,
    pub bcrypt_cost: u32,
    pub upload_dir: PathBuf,
    /// Empty means the localhost development origins.
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5000,
            database_url: None,
            session_ttl: Duration::from_secs(600),
            session_prune_interval: Duration::from_secs(60),
            admin_username: "admin".to_string(),
            admin_password_hash: None,
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            admin_password_is_default: true,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            upload_dir: PathBuf::from("uploads"),
            allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Unparseable
    /// numeric values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, fallback: Duration| {
            var(key)
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        let admin_password_hash = var("ADMIN_PASSWORD_HASH");
        let admin_password = var("ADMIN_PASSWORD");
        let admin_password_is_default = admin_password_hash.is_none() && admin_password.is_none();

        let allowed_origins = var("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .or_else(|| var("FRONTEND_ORIGIN").map(|origin| vec![origin.trim().to_string()]))
            .unwrap_or_default();

        Self {
            environment: var("ENVIRONMENT").unwrap_or(defaults.environment),
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            database_url: var("DATABASE_URL"),
            session_ttl: secs("SESSION_TTL_SECS", defaults.session_ttl),
            session_prune_interval: secs("SESSION_PRUNE_SECS", defaults.session_prune_interval),
            admin_username: var("ADMIN_USERNAME").unwrap_or(defaults.admin_username),
            admin_password_hash,
            admin_password: admin_password.unwrap_or(defaults.admin_password),
            admin_password_is_default,
            bcrypt_cost: var("BCRYPT_COST")
                .and_then(|s| s.parse().ok())
                .filter(|cost| (MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(cost))
                .unwrap_or(defaults.bcrypt_cost),
            upload_dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            allowed_origins,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }

    /// Logs insecure settings that are tolerated in development.
    pub fn warn_if_insecure(&self) {
        if self.is_production() && self.admin_password_is_default {
            tracing::warn!(
                "SECURITY: Neither ADMIN_PASSWORD_HASH nor ADMIN_PASSWORD is set. \
                 The fallback default password 'admin123' is insecure. \
                 Set ADMIN_PASSWORD_HASH to a bcrypt hash of a strong password."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = config_from(&[]);
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.database_url.is_none());
        assert_eq!(config.session_ttl, Duration::from_secs(600));
        assert_eq!(config.admin_username, "admin");
        assert!(config.admin_password_is_default);
        assert!(!config.is_production());
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn test_reads_overrides() {
        let config = config_from(&[
            ("ENVIRONMENT", "production"),
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("SESSION_TTL_SECS", "1200"),
            ("ADMIN_PASSWORD", "hunter22"),
            ("BCRYPT_COST", "4"),
            ("ALLOWED_ORIGINS", "https://shop.example, https://admin.example"),
        ]);
        assert!(config.is_production());
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/shop"));
        assert_eq!(config.session_ttl, Duration::from_secs(1200));
        assert_eq!(config.admin_password, "hunter22");
        assert!(!config.admin_password_is_default);
        assert_eq!(config.bcrypt_cost, 4);
        assert_eq!(
            config.allowed_origins,
            vec!["https://shop.example", "https://admin.example"]
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("SESSION_TTL_SECS", "0"),
            ("BCRYPT_COST", "99"),
            ("DATABASE_URL", "   "),
        ]);
        assert_eq!(config.port, 5000);
        assert_eq!(config.session_ttl, Duration::from_secs(600));
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_bcrypt_cost_bounds() {
        assert_eq!(config_from(&[("BCRYPT_COST", "4")]).bcrypt_cost, MIN_BCRYPT_COST);
        assert_eq!(config_from(&[("BCRYPT_COST", "31")]).bcrypt_cost, MAX_BCRYPT_COST);
        assert_eq!(config_from(&[("BCRYPT_COST", "3")]).bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config_from(&[("BCRYPT_COST", "32")]).bcrypt_cost, bcrypt::DEFAULT_COST);
    }

    #[test]
    fn test_frontend_origin_fallback() {
        let config = config_from(&[("FRONTEND_ORIGIN", "http://localhost:5173")]);
        assert_eq!(config.allowed_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn test_socket_addr() {
        assert!(config_from(&[]).socket_addr().is_ok());
        assert!(config_from(&[("HOST", "not a host")]).socket_addr().is_err());
    }
}
