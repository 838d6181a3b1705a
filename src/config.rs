use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::contentful::DEFAULT_PAGE_SIZE;
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://cdn.contentful.com";

/// One year.
pub const MAX_SYNC_INTERVAL_SECS: u64 = 365 * 86_400;

/// Runtime configuration, read from the environment.
#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    /// `None` means the default path under the home directory.
    pub database_path: Option<PathBuf>,
    pub contentful: ContentfulConfig,
    pub sync: SyncConfig,
    pub jwt: JwtConfig,
}

#[derive(Clone)]
pub struct ContentfulConfig {
    pub space_id: Option<String>,
    pub access_token: Option<String>,
    pub environment: String,
    pub content_type: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub page_size: u32,
    pub interval: Duration,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// As configured, e.g. `24h`. Echoed back to token requesters.
    pub expires_in: String,
    pub ttl: Duration,
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let expires_in = get("JWT_EXPIRES_IN").unwrap_or_else(|| "24h".to_string());
        let ttl = parse_duration(&expires_in)?;

        let page_size = parse_number(get("SYNC_PAGE_SIZE"), "SYNC_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(Error::Config("SYNC_PAGE_SIZE must be positive".into()));
        }
        let interval_secs = parse_number(get("SYNC_INTERVAL_SECS"), "SYNC_INTERVAL_SECS", 3600u64)?;
        if interval_secs == 0 || interval_secs > MAX_SYNC_INTERVAL_SECS {
            return Err(Error::Config(format!(
                "SYNC_INTERVAL_SECS must be between 1 and {MAX_SYNC_INTERVAL_SECS}"
            )));
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_number(get("PORT"), "PORT", 3000u16)?,
            database_path: get("DATABASE_PATH").map(PathBuf::from),
            contentful: ContentfulConfig {
                space_id: get("CONTENTFUL_SPACE_ID"),
                access_token: get("CONTENTFUL_ACCESS_TOKEN"),
                environment: get("CONTENTFUL_ENVIRONMENT").unwrap_or_else(|| "master".to_string()),
                content_type: get("CONTENTFUL_TYPE").unwrap_or_else(|| "product".to_string()),
                base_url: get("CONTENTFUL_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout: Duration::from_secs(parse_number(
                    get("CONTENTFUL_TIMEOUT_SECS"),
                    "CONTENTFUL_TIMEOUT_SECS",
                    30u64,
                )?),
            },
            sync: SyncConfig {
                page_size,
                interval: Duration::from_secs(interval_secs),
            },
            jwt: JwtConfig {
                secret: get("JWT_SECRET").unwrap_or_else(|| "secret-key".to_string()),
                expires_in,
                ttl,
            },
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got '{v}'"))),
    }
}

/// Parse `<n>s`, `<n>m`, `<n>h` or `<n>d`; a bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let invalid = || Error::Config(format!("invalid duration '{s}' (expected e.g. 30m, 24h, 7d)"));
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };
    let n: u64 = digits.parse().map_err(|_| invalid())?;
    let scale = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return Err(invalid()),
    };
    let secs = n.checked_mul(scale).ok_or_else(invalid)?;
    if secs == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(secs))
}

fn redact(v: &Option<String>) -> &'static str {
    if v.is_some() {
        "[REDACTED]"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for ContentfulConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ContentfulConfig")
            .field("space_id", &self.space_id)
            .field("access_token", &redact(&self.access_token))
            .field("environment", &self.environment)
            .field("content_type", &self.content_type)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("port", &self.port)
            .field("database_path", &self.database_path)
            .field("contentful", &self.contentful)
            .field("sync", &self.sync)
            .field("jwt", &self.jwt)
            .finish()
    }
}
