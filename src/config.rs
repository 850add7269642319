// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables, so everything comes
//! from the environment (or a `.env` file for local development).

use crate::services::access_codes::MAX_VALIDITY_DAYS;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which document store backs the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// In-process store for local runs without GCP.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Emails allowed to use the admin API
    pub admin_emails: Vec<String>,
    /// GCS bucket for payment receipts (None = in-memory storage)
    pub receipts_bucket: Option<String>,
    /// Default redemption window for new access codes
    pub code_validity_days: u32,
    /// Quiet period before a last-seen write
    pub last_seen_debounce: Duration,
    /// Upper bound on any single store call
    pub store_timeout: Duration,
    pub store_backend: StoreBackend,

    // --- Secrets ---
    /// Key the identity provider signs session tokens with (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            admin_emails: vec!["admin@example.com".to_string()],
            receipts_bucket: None,
            code_validity_days: 30,
            last_seen_debounce: Duration::from_secs(5),
            store_timeout: Duration::from_secs(10),
            store_backend: StoreBackend::Memory,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let config = Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_or("PORT", 8080)?,
            admin_emails: env::var("ADMIN_EMAILS")
                .map(|v| parse_admin_emails(&v))
                .unwrap_or_default(),
            receipts_bucket: env::var("RECEIPTS_BUCKET")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            code_validity_days: parse_or("CODE_VALIDITY_DAYS", 30)?,
            last_seen_debounce: Duration::from_secs(parse_or("LAST_SEEN_DEBOUNCE_SECS", 5)?),
            store_timeout: Duration::from_secs(parse_or("STORE_TIMEOUT_SECS", 10)?),
            store_backend: env::var("STORE_BACKEND")
                .unwrap_or_else(|_| "firestore".to_string())
                .parse()?,

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .trim()
                .as_bytes()
                .to_vec(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, on every request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_VALIDITY_DAYS).contains(&self.code_validity_days) {
            return Err(ConfigError::Invalid("CODE_VALIDITY_DAYS"));
        }
        if self.store_timeout.is_zero() {
            return Err(ConfigError::Invalid("STORE_TIMEOUT_SECS"));
        }
        Ok(())
    }

    /// Whether `email` belongs to an administrator.
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim();
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("ADMIN_EMAILS", " Admin@Example.com, ,ops@example.com");
        env::set_var("STORE_BACKEND", "memory");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.jwt_signing_key, b"test_jwt_key_32_bytes_minimum!!");
        assert_eq!(config.admin_emails, vec!["admin@example.com", "ops@example.com"]);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.code_validity_days, 30);
    }

    #[test]
    fn test_admin_email_match_is_case_insensitive() {
        let config = Config::test_default();
        assert!(config.is_admin_email("ADMIN@example.com"));
        assert!(!config.is_admin_email("user@example.com"));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(Config::test_default().validate().is_ok());

        for days in [0, 366] {
            let config = Config {
                code_validity_days: days,
                ..Config::test_default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::Invalid("CODE_VALIDITY_DAYS"))
            ));
        }

        let config = Config {
            store_timeout: Duration::ZERO,
            ..Config::test_default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid("STORE_TIMEOUT_SECS"))
        ));
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("Firestore".parse::<StoreBackend>().unwrap(), StoreBackend::Firestore);
        assert!("redis".parse::<StoreBackend>().is_err());
    }
}
