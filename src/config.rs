//! Process configuration, read once at startup.
//!
//! DESIGN
//! ======
//! `.env` is loaded by `main` through `dotenvy`, then every setting is read
//! from the process environment into [`AppConfig`]. Only `DATABASE_URL` is
//! required; everything else has a default that suits local development.
//! Parsing goes through a lookup function so tests never touch the real
//! environment.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_PUBLIC_UPLOAD_BASE: &str = "/uploads";
const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 30;
const DEFAULT_VERIFY_LIMIT: usize = 10;
const DEFAULT_VERIFY_WINDOW_SECS: u64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Where uploaded files are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobConfig {
    /// Files on local disk, served by the app under `public_base`.
    Local { dir: PathBuf, public_base: String },
    S3(S3Config),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Public URL prefix for stored objects, e.g. a CDN origin.
    pub public_base: String,
}

/// First admin account, created at startup if no user has that name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub blob: BlobConfig,
    pub cookie_secure: bool,
    pub session_ttl_hours: i64,
    pub admin_bootstrap: Option<AdminBootstrap>,
    /// Client-code verification attempts allowed per remote address.
    pub verify_limit: usize,
    pub verify_window: Duration,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let blob = match get("BLOB_BACKEND").as_deref().unwrap_or("local") {
            "local" => BlobConfig::Local {
                dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_owned())),
                public_base: get("PUBLIC_UPLOAD_BASE")
                    .unwrap_or_else(|| DEFAULT_PUBLIC_UPLOAD_BASE.to_owned()),
            },
            "s3" => {
                let bucket = get("S3_BUCKET").ok_or(ConfigError::Missing("S3_BUCKET"))?;
                let public_base = get("PUBLIC_UPLOAD_BASE")
                    .ok_or(ConfigError::Missing("PUBLIC_UPLOAD_BASE"))?;
                BlobConfig::S3(S3Config {
                    bucket,
                    prefix: get("S3_PREFIX"),
                    region: get("S3_REGION"),
                    endpoint_url: get("S3_ENDPOINT_URL"),
                    force_path_style: parse_bool(&get, "S3_FORCE_PATH_STYLE")?.unwrap_or(false),
                    access_key_id: get("S3_ACCESS_KEY_ID"),
                    secret_access_key: get("S3_SECRET_ACCESS_KEY"),
                    public_base,
                })
            }
            other => {
                return Err(ConfigError::Invalid { key: "BLOB_BACKEND", value: other.to_owned() });
            }
        };

        let admin_bootstrap = match (get("ADMIN_USERNAME"), get("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminBootstrap { username, password }),
            _ => None,
        };

        Ok(Self {
            database_url,
            port: parse(&get, "PORT", DEFAULT_PORT)?,
            db_max_connections: parse(&get, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            blob,
            cookie_secure: parse_bool(&get, "COOKIE_SECURE")?.unwrap_or(false),
            session_ttl_hours: parse(&get, "SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?,
            admin_bootstrap,
            verify_limit: parse(&get, "RATE_LIMIT_VERIFY", DEFAULT_VERIFY_LIMIT)?,
            verify_window: Duration::from_secs(parse(
                &get,
                "RATE_LIMIT_VERIFY_WINDOW_SECS",
                DEFAULT_VERIFY_WINDOW_SECS,
            )?),
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

pub(crate) fn parse_bool_value(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<bool>, ConfigError> {
    match get(key) {
        None => Ok(None),
        Some(raw) => parse_bool_value(&raw).map(Some).ok_or(ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
