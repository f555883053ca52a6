//! Configuration management for Identity Service
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)
//!
//! # Example
//!
//! ```no_run
//! use identity_service::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("Listening on {}:{}", settings.server.host, settings.server.port);
//!     Ok(())
//! }
//! ```

use crate::security::{KeySource, DEFAULT_HASH_COST};
use crate::services::IdentitySettings;
use anyhow::{Context, Result};
use crypto_core::jwt::DEFAULT_TOKEN_LIFETIME_MINUTES;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_PRIVATE_KEY_PATH: &str = "./rsakey/jwtrsa256.key";
const DEFAULT_PUBLIC_KEY_PATH: &str = "./rsakey/jwtrsa256.key.pub";
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub store: StoreSettings,
    pub password: PasswordSettings,
    pub jwt: JwtSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Load settings from environment variables
    ///
    /// A `.env` file is read first in debug builds.
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            env_file_loaded(dotenvy::dotenv());
        }

        Ok(Settings {
            database: DatabaseSettings::from_env()?,
            store: StoreSettings::from_env(),
            password: PasswordSettings::from_env(),
            jwt: JwtSettings::from_env(),
            server: ServerSettings::from_env()?,
        })
    }

    /// Workflow tunables derived from these settings
    pub fn identity(&self) -> IdentitySettings {
        IdentitySettings {
            hash_cost: self.password.hash_cost,
            token_lifetime_minutes: self.jwt.lifetime_minutes,
            store_timeout: self.store.timeout(),
            hash_timeout: self.password.timeout(),
        }
    }
}

fn env_file_loaded(result: dotenvy::Result<PathBuf>) -> Option<PathBuf> {
    match result {
        Ok(path) => {
            info!(path = %path.display(), "Loaded .env file for development");
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            warn!(error = %e, "Failed to read .env file");
            None
        }
    }
}

/// Database connection settings
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT")?,
        })
    }
}

/// Per-call budget for store operations
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub timeout_secs: u64,
}

impl StoreSettings {
    fn from_env() -> Self {
        Self {
            timeout_secs: positive_or_default("STORE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct PasswordSettings {
    /// Argon2 time cost
    pub hash_cost: u32,
    /// Budget for one hash or verify call
    pub timeout_secs: u64,
}

impl PasswordSettings {
    fn from_env() -> Self {
        Self {
            hash_cost: positive_or_default("PASSWORD_HASH_COST", DEFAULT_HASH_COST),
            timeout_secs: positive_or_default("PASSWORD_HASH_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Token signing settings
///
/// Inline PEM (`JWT_PRIVATE_KEY` + `JWT_PUBLIC_KEY`) wins over key files.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub keys: KeySource,
    pub lifetime_minutes: i64,
}

impl JwtSettings {
    fn from_env() -> Self {
        let keys = match (env::var("JWT_PRIVATE_KEY"), env::var("JWT_PUBLIC_KEY")) {
            (Ok(private), Ok(public)) => {
                info!("Using inline PEM keys for JWT");
                KeySource::Pem { private, public }
            }
            _ => {
                let private = env::var("JWT_PRIVATE_KEY_PATH")
                    .unwrap_or_else(|_| DEFAULT_PRIVATE_KEY_PATH.to_string());
                let public = env::var("JWT_PUBLIC_KEY_PATH")
                    .unwrap_or_else(|_| DEFAULT_PUBLIC_KEY_PATH.to_string());
                KeySource::Files {
                    private: private.into(),
                    public: public.into(),
                }
            }
        };

        Self {
            keys,
            lifetime_minutes: positive_or_default(
                "JWT_LIFETIME_MINUTES",
                DEFAULT_TOKEN_LIFETIME_MINUTES,
            ),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid SERVER_PORT")?,
        })
    }
}

/// Read a positive number, falling back to `default` with a warning when the
/// value is unparseable or not positive
fn positive_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display + PartialOrd + Default + Copy,
{
    let Ok(raw) = env::var(name) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!(variable = name, value = %raw, default = %default, "Invalid setting, using default");
            default
        }
    }
}
