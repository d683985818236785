use std::collections::HashMap;

use super::*;

fn full_env() -> HashMap<&'static str, String> {
    HashMap::from([
        ("FIREBASE_API_KEY", "fb-key".to_owned()),
        ("FIREBASE_AUTH_DOMAIN", "demo.firebaseapp.com".to_owned()),
        ("FIREBASE_PROJECT_ID", "demo".to_owned()),
        ("DATABASE_URL", "postgres://cal:pw@db.internal:6543/calendar".to_owned()),
        ("REDIS_URL", "redis://:cachepw@cache.internal/0".to_owned()),
        ("GOOGLE_CLIENT_ID", "client-id.apps.googleusercontent.com".to_owned()),
        ("GOOGLE_CLIENT_SECRET", "client-secret".to_owned()),
        ("GOOGLE_CALENDAR_API_KEY", "calendar-key".to_owned()),
        ("API_SECRET_KEY", "api-secret".to_owned()),
    ])
}

fn load(env: &HashMap<&'static str, String>) -> Result<AppConfig, ConfigError> {
    AppConfig::from_lookup(|key| env.get(key).cloned())
}

// =============================================================================
// required variables
// =============================================================================

#[test]
fn all_required_present_loads() {
    let cfg = load(&full_env()).unwrap();
    assert_eq!(cfg.google.client_id, "client-id.apps.googleusercontent.com");
    assert_eq!(cfg.firebase.project_id, "demo");
    assert_eq!(cfg.api_secret_key, "api-secret");
}

#[test]
fn two_missing_reports_exactly_those_two() {
    let mut env = full_env();
    env.remove("REDIS_URL");
    env.remove("API_SECRET_KEY");

    let err = load(&env).unwrap_err();
    assert_eq!(err, ConfigError::MissingVars(vec!["REDIS_URL", "API_SECRET_KEY"]));
    let msg = err.to_string();
    assert!(msg.contains("REDIS_URL"));
    assert!(msg.contains("API_SECRET_KEY"));
    assert!(!msg.contains("DATABASE_URL"));
}

#[test]
fn empty_value_counts_as_missing() {
    let mut env = full_env();
    env.insert("GOOGLE_CLIENT_SECRET", "   ".to_owned());
    assert_eq!(load(&env).unwrap_err(), ConfigError::MissingVars(vec!["GOOGLE_CLIENT_SECRET"]));
}

#[test]
fn nothing_set_lists_all_nine_in_order() {
    let env = HashMap::new();
    let ConfigError::MissingVars(names) = load(&env).unwrap_err() else {
        panic!("expected MissingVars");
    };
    assert_eq!(names, REQUIRED_VARS.to_vec());
}

// =============================================================================
// optional variables
// =============================================================================

#[test]
fn defaults_applied() {
    let cfg = load(&full_env()).unwrap();
    assert_eq!(cfg.environment, Environment::Development);
    assert_eq!(cfg.app_url, DEFAULT_APP_URL);
    assert_eq!(cfg.api_url, "http://localhost:3000/api");
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.session_ttl, time::Duration::hours(DEFAULT_SESSION_TTL_HOURS));
    assert_eq!(cfg.session_backend, SessionBackend::Postgres);
    assert_eq!(cfg.session_sweep_interval, std::time::Duration::from_secs(DEFAULT_SESSION_SWEEP_SECS));
    assert_eq!(cfg.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
    assert!(!cfg.cookie_secure);
    assert_eq!(cfg.google.redirect_uri, "http://localhost:3000/api/auth/google/callback");
}

#[test]
fn https_app_url_implies_secure_cookie() {
    let mut env = full_env();
    env.insert("APP_URL", "https://calendar.example.com/".to_owned());
    let cfg = load(&env).unwrap();
    assert!(cfg.cookie_secure);
    assert_eq!(cfg.app_url, "https://calendar.example.com");
    assert_eq!(cfg.api_url, "https://calendar.example.com/api");
}

#[test]
fn production_over_http_keeps_cookie_insecure() {
    let mut env = full_env();
    env.insert("APP_ENV", "production".to_owned());
    env.insert("APP_URL", "http://calendar.internal:8080".to_owned());
    let cfg = load(&env).unwrap();
    assert_eq!(cfg.environment, Environment::Production);
    assert!(!cfg.cookie_secure);
}

#[test]
fn explicit_cookie_secure_wins() {
    let mut env = full_env();
    env.insert("APP_ENV", "production".to_owned());
    env.insert("APP_URL", "https://calendar.example.com".to_owned());
    env.insert("COOKIE_SECURE", "off".to_owned());
    let cfg = load(&env).unwrap();
    assert_eq!(cfg.environment, Environment::Production);
    assert!(!cfg.cookie_secure);
}

#[test]
fn invalid_port_is_rejected() {
    let mut env = full_env();
    env.insert("PORT", "eighty".to_owned());
    let err = load(&env).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));
}

#[test]
fn non_positive_ttl_is_rejected() {
    let mut env = full_env();
    env.insert("SESSION_TTL_HOURS", "0".to_owned());
    assert!(matches!(load(&env).unwrap_err(), ConfigError::Invalid { var: "SESSION_TTL_HOURS", .. }));
}

#[test]
fn unknown_environment_is_rejected() {
    let mut env = full_env();
    env.insert("APP_ENV", "staging".to_owned());
    let err = load(&env).unwrap_err().to_string();
    assert!(err.contains("unknown environment"));
}

#[test]
fn memory_session_backend_selectable() {
    let mut env = full_env();
    env.insert("SESSION_STORE", "memory".to_owned());
    assert_eq!(load(&env).unwrap().session_backend, SessionBackend::Memory);
}

// =============================================================================
// derived connection shapes
// =============================================================================

#[test]
fn database_url_parsed() {
    let cfg = load(&full_env()).unwrap();
    assert_eq!(
        cfg.database,
        DatabaseConfig {
            host: "db.internal".into(),
            port: 6543,
            database: "calendar".into(),
            user: "cal".into(),
            password: "pw".into(),
        }
    );
}

#[test]
fn database_port_defaults() {
    let db = parse_database_url("postgres://u@localhost/app").unwrap();
    assert_eq!(db.port, 5432);
    assert_eq!(db.password, "");
}

#[test]
fn cache_url_parsed() {
    let cfg = load(&full_env()).unwrap();
    assert_eq!(
        cfg.cache,
        CacheConfig { host: "cache.internal".into(), port: 6379, password: Some("cachepw".into()) }
    );
}

#[test]
fn cache_without_password() {
    let cache = parse_cache_url("redis://localhost:6380").unwrap();
    assert_eq!(cache.port, 6380);
    assert!(cache.password.is_none());
}

#[test]
fn malformed_database_url_is_invalid() {
    let mut env = full_env();
    env.insert("DATABASE_URL", "not a url".to_owned());
    assert!(matches!(load(&env).unwrap_err(), ConfigError::Invalid { var: "DATABASE_URL", .. }));
}

#[test]
fn parse_bool_variants() {
    for raw in ["1", "true", "YES", " on "] {
        assert_eq!(parse_bool(raw), Some(true), "{raw:?}");
    }
    for raw in ["0", "false", "No", "OFF"] {
        assert_eq!(parse_bool(raw), Some(false), "{raw:?}");
    }
    assert_eq!(parse_bool("maybe"), None);
    assert_eq!(parse_bool(""), None);
}
