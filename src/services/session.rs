//! Session artifact storage.
//!
//! ARCHITECTURE
//! ============
//! The browser carries an opaque random token in the `session` cookie. Stores
//! key sessions by a keyed SHA-256 of that token (`API_SECRET_KEY` is the key);
//! raw tokens never reach storage.
//!
//! Two backends share the `SessionStore` trait: Postgres for deployments and an
//! in-memory map for tests and single-process development.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::types::User;

/// Name of the cookie carrying the session artifact.
pub const SESSION_COOKIE: &str = "session";

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Keyed hash under which a token is stored.
#[must_use]
pub fn hash_token(secret: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(token.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Backend-neutral session storage. Enables swapping Postgres for memory in tests.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session for `user` lasting `ttl`, returning the raw token.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionStoreError`] if the backend write fails.
    async fn create(&self, user: &User, ttl: Duration) -> Result<String, SessionStoreError>;

    /// Resolve a raw token to its user. Expired or unknown tokens yield `None`.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionStoreError`] if the backend read fails.
    async fn lookup(&self, token: &str) -> Result<Option<User>, SessionStoreError>;

    /// Remove a session. Unknown tokens are not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionStoreError`] if the backend delete fails.
    async fn delete(&self, token: &str) -> Result<(), SessionStoreError>;

    /// Drop every expired session, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionStoreError`] if the backend delete fails.
    async fn purge_expired(&self) -> Result<u64, SessionStoreError>;
}

// =============================================================================
// MEMORY STORE
// =============================================================================

struct MemorySession {
    user: User,
    expires_at: OffsetDateTime,
}

pub struct MemorySessionStore {
    secret: String,
    sessions: RwLock<HashMap<String, MemorySession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into(), sessions: RwLock::new(HashMap::new()) }
    }

    /// Number of stored (possibly expired) sessions.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user: &User, ttl: Duration) -> Result<String, SessionStoreError> {
        let token = generate_token();
        let session = MemorySession { user: user.clone(), expires_at: OffsetDateTime::now_utc() + ttl };
        self.sessions
            .write()
            .await
            .insert(hash_token(&self.secret, &token), session);
        Ok(token)
    }

    async fn lookup(&self, token: &str) -> Result<Option<User>, SessionStoreError> {
        let key = hash_token(&self.secret, token);
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get(&key) else {
            return Ok(None);
        };
        if session.expires_at <= OffsetDateTime::now_utc() {
            sessions.remove(&key);
            return Ok(None);
        }
        Ok(Some(session.user.clone()))
    }

    async fn delete(&self, token: &str) -> Result<(), SessionStoreError> {
        self.sessions
            .write()
            .await
            .remove(&hash_token(&self.secret, token));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionStoreError> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

// =============================================================================
// POSTGRES STORE
// =============================================================================

pub struct PgSessionStore {
    pool: PgPool,
    secret: String,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool, secret: impl Into<String>) -> Self {
        Self { pool, secret: secret.into() }
    }
}

#[async_trait::async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, user: &User, ttl: Duration) -> Result<String, SessionStoreError> {
        let token = generate_token();
        sqlx::query(
            r"INSERT INTO sessions (token_hash, user_id, email, display_name, photo_url, expires_at)
              VALUES ($1, $2, $3, $4, $5, now() + ($6::bigint * interval '1 second'))",
        )
        .bind(hash_token(&self.secret, &token))
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.photo_url)
        .bind(ttl.whole_seconds())
        .execute(&self.pool)
        .await?;
        Ok(token)
    }

    async fn lookup(&self, token: &str) -> Result<Option<User>, SessionStoreError> {
        let row = sqlx::query(
            r"SELECT user_id, email, display_name, photo_url
              FROM sessions
              WHERE token_hash = $1 AND expires_at > now()",
        )
        .bind(hash_token(&self.secret, token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| User {
            id: r.get("user_id"),
            email: r.get("email"),
            display_name: r.get("display_name"),
            photo_url: r.get("photo_url"),
        }))
    }

    async fn delete(&self, token: &str) -> Result<(), SessionStoreError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(hash_token(&self.secret, token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionStoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// SWEEPER
// =============================================================================

/// Spawn the background task that purges expired sessions. Returns a handle for shutdown.
pub fn spawn_session_sweeper(store: Arc<dyn SessionStore>, interval: std::time::Duration) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "session sweeper configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "expired sessions purged"),
                Err(e) => warn!(error = %e, "session purge failed"),
            }
        }
    })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
