//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - SeaORM connection URL
//! - `SESSION_SECRET` - Cookie signing secret (production only, min 32 chars)
//! - `BOOTSTRAP_ADMIN_PASSWORD` - Initial primary-admin password (production only)
//!
//! ## Optional
//! - `APP_ENV` / `NODE_ENV` - `production` enables secure cookies (default: development)
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 3001)
//! - `FRONTEND_URL` - Extra CORS origin (default: <http://localhost:9002>)
//! - `EXPOSE_ERROR_DETAILS` - Echo store-fault detail to clients (default: false)
//! - `BOOTSTRAP_ADMIN_USERNAME` - Primary-admin username (default: admin)
//! - `SESSION_SWEEP_INTERVAL_SECS` - Expired-session sweep period (default: 3600)
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 10)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const DEV_SESSION_SECRET: &str = "calcdir-development-only-session-signing-key";
const DEV_BOOTSTRAP_PASSWORD: &str = "admin123";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:9002";
/// Admin panel and local tooling origins, always allowed alongside `FRONTEND_URL`.
const BUILTIN_ORIGINS: [&str; 2] = ["http://localhost:8080", "http://localhost:3000"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// `production` in `APP_ENV` or `NODE_ENV`.
    pub production: bool,
    pub session_secret: SecretString,
    /// CORS origins allowed to send credentials.
    pub allowed_origins: Vec<String>,
    pub expose_error_details: bool,
    pub bootstrap_admin_username: String,
    pub bootstrap_admin_password: SecretString,
    pub sweep_interval: Duration,
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing, a value does
    /// not parse, or a production secret is too weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let production = var("APP_ENV")
            .or_else(|| var("NODE_ENV"))
            .is_some_and(|env| env.eq_ignore_ascii_case("production"));

        let session_secret = match var("SESSION_SECRET") {
            Some(secret) => {
                if production {
                    validate_secret_length("SESSION_SECRET", &secret)?;
                }
                SecretString::from(secret)
            }
            None if production => {
                return Err(ConfigError::MissingEnvVar("SESSION_SECRET".to_string()));
            }
            None => {
                tracing::warn!("SESSION_SECRET not set, using the development fallback");
                SecretString::from(DEV_SESSION_SECRET.to_string())
            }
        };

        let bootstrap_admin_password = match var("BOOTSTRAP_ADMIN_PASSWORD") {
            Some(password) => SecretString::from(password),
            None if production => {
                return Err(ConfigError::MissingEnvVar(
                    "BOOTSTRAP_ADMIN_PASSWORD".to_string(),
                ));
            }
            None => SecretString::from(DEV_BOOTSTRAP_PASSWORD.to_string()),
        };

        let frontend_url = var("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());
        let mut allowed_origins = vec![frontend_url];
        for origin in BUILTIN_ORIGINS {
            if !allowed_origins.iter().any(|o| o == origin) {
                allowed_origins.push(origin.to_string());
            }
        }

        Ok(Self {
            database_url,
            host: parse_or(&var, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_or(&var, "PORT", 3001)?,
            production,
            session_secret,
            allowed_origins,
            expose_error_details: parse_or(&var, "EXPOSE_ERROR_DETAILS", false)?,
            bootstrap_admin_username: var("BOOTSTRAP_ADMIN_USERNAME")
                .unwrap_or_else(|| "admin".to_string()),
            bootstrap_admin_password,
            sweep_interval: Duration::from_secs(parse_or(
                &var,
                "SESSION_SWEEP_INTERVAL_SECS",
                3600,
            )?),
            db_max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", 10)?,
        })
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn database_url(&self) -> &str {
        self.database_url.expose_secret()
    }
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn validate_secret_length(name: &str, secret: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            name.to_string(),
            format!("must be at least {MIN_SESSION_SECRET_LENGTH} characters"),
        ));
    }
    Ok(())
}
