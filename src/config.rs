//! Process configuration, loaded once at startup.
//!
//! DESIGN
//! ======
//! Every environment read in the server happens here. `main` builds one
//! `AppConfig`, and handlers reach it through `AppState`. Missing required
//! variables are collected and reported together in one error.

use std::path::PathBuf;

use url::Url;

/// Variables that must be present (and non-empty) for the server to start.
pub const REQUIRED_VARS: [&str; 9] = [
    "FIREBASE_API_KEY",
    "FIREBASE_AUTH_DOMAIN",
    "FIREBASE_PROJECT_ID",
    "DATABASE_URL",
    "REDIS_URL",
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "GOOGLE_CALENDAR_API_KEY",
    "API_SECRET_KEY",
];

pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 120;
pub const DEFAULT_SESSION_SWEEP_SECS: u64 = 300;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_POSTGRES_PORT: u16 = 5432;
const DEFAULT_REDIS_PORT: u16 = 6379;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<&'static str>),
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Where session artifacts are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Postgres,
    Memory,
}

/// Public identity-provider settings handed to the browser SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Reserved for the calendar backend; only validated at startup.
    #[allow(dead_code)]
    pub calendar_api_key: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub app_url: String,
    pub api_url: String,
    pub port: u16,
    pub database_url: String,
    pub database: DatabaseConfig,
    pub db_max_connections: u32,
    pub cache: CacheConfig,
    pub firebase: FirebaseConfig,
    pub google: GoogleConfig,
    pub api_secret_key: String,
    pub session_ttl: time::Duration,
    pub session_sweep_interval: std::time::Duration,
    pub session_backend: SessionBackend,
    pub cookie_secure: bool,
    pub website_dir: PathBuf,
}

impl AppConfig {
    /// Load `.env` (if any) and build the config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVars`] naming every absent required variable,
    /// or [`ConfigError::Invalid`] for the first malformed value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }
        let required = |key: &'static str| get(key).unwrap_or_default();

        let environment = parse_environment(get("APP_ENV").as_deref())?;
        let app_url = get("APP_URL")
            .unwrap_or_else(|| DEFAULT_APP_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let api_url = get("API_URL").unwrap_or_else(|| format!("{app_url}/api"));
        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let ttl_hours = parse_or("SESSION_TTL_HOURS", get("SESSION_TTL_HOURS"), DEFAULT_SESSION_TTL_HOURS)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid { var: "SESSION_TTL_HOURS", reason: "must be positive".into() });
        }
        let sweep_secs = parse_or("SESSION_SWEEP_SECS", get("SESSION_SWEEP_SECS"), DEFAULT_SESSION_SWEEP_SECS)?;
        if sweep_secs == 0 {
            return Err(ConfigError::Invalid { var: "SESSION_SWEEP_SECS", reason: "must be positive".into() });
        }
        let db_max_connections =
            parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), DEFAULT_DB_MAX_CONNECTIONS)?;
        let session_backend = parse_session_backend(get("SESSION_STORE").as_deref())?;
        let cookie_secure = match get("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| ConfigError::Invalid { var: "COOKIE_SECURE", reason: format!("not a boolean: {raw}") })?,
            None => app_url.starts_with("https://"),
        };

        let database_url = required("DATABASE_URL");
        let database = parse_database_url(&database_url)?;
        let cache = parse_cache_url(&required("REDIS_URL"))?;

        let redirect_uri = get("GOOGLE_REDIRECT_URI").unwrap_or_else(|| format!("{app_url}/api/auth/google/callback"));
        let website_dir = get("WEBSITE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("site"));

        Ok(Self {
            environment,
            app_url,
            api_url,
            port,
            database_url,
            database,
            db_max_connections,
            cache,
            firebase: FirebaseConfig {
                api_key: required("FIREBASE_API_KEY"),
                auth_domain: required("FIREBASE_AUTH_DOMAIN"),
                project_id: required("FIREBASE_PROJECT_ID"),
            },
            google: GoogleConfig {
                client_id: required("GOOGLE_CLIENT_ID"),
                client_secret: required("GOOGLE_CLIENT_SECRET"),
                calendar_api_key: required("GOOGLE_CALENDAR_API_KEY"),
                redirect_uri,
            },
            api_secret_key: required("API_SECRET_KEY"),
            session_ttl: time::Duration::hours(ttl_hours),
            session_sweep_interval: std::time::Duration::from_secs(sweep_secs),
            session_backend,
            cookie_secure,
            website_dir,
        })
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::Invalid { var, reason: e.to_string() }),
        None => Ok(default),
    }
}

fn parse_environment(raw: Option<&str>) -> Result<Environment, ConfigError> {
    match raw.unwrap_or("development") {
        "development" => Ok(Environment::Development),
        "production" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        other => Err(ConfigError::Invalid { var: "APP_ENV", reason: format!("unknown environment: {other}") }),
    }
}

fn parse_session_backend(raw: Option<&str>) -> Result<SessionBackend, ConfigError> {
    match raw.unwrap_or("postgres") {
        "postgres" => Ok(SessionBackend::Postgres),
        "memory" => Ok(SessionBackend::Memory),
        other => Err(ConfigError::Invalid {
            var: "SESSION_STORE",
            reason: format!("expected 'postgres' or 'memory', got '{other}'"),
        }),
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid { var, reason: e.to_string() })?;
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid { var, reason: "missing host".into() });
    }
    Ok(url)
}

pub(crate) fn parse_database_url(raw: &str) -> Result<DatabaseConfig, ConfigError> {
    let url = parse_url("DATABASE_URL", raw)?;
    Ok(DatabaseConfig {
        host: url.host_str().unwrap_or_default().to_owned(),
        port: url.port().unwrap_or(DEFAULT_POSTGRES_PORT),
        database: url.path().trim_start_matches('/').to_owned(),
        user: url.username().to_owned(),
        password: url.password().unwrap_or_default().to_owned(),
    })
}

pub(crate) fn parse_cache_url(raw: &str) -> Result<CacheConfig, ConfigError> {
    let url = parse_url("REDIS_URL", raw)?;
    Ok(CacheConfig {
        host: url.host_str().unwrap_or_default().to_owned(),
        port: url.port().unwrap_or(DEFAULT_REDIS_PORT),
        password: url.password().filter(|p| !p.is_empty()).map(str::to_owned),
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
