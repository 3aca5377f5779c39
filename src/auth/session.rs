//! Server-side session stores.
//!
//! Keys are SHA-256 hashes of the cookie token; the raw token only ever
//! lives in the client's cookie.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::storage::StorageResult;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: i32,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn create(
        &self,
        token_hash: &str,
        user_id: i32,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Live session for the hash. Expired sessions read as absent even
    /// before the pruner removes them.
    async fn get(&self, token_hash: &str) -> StorageResult<Option<Session>>;

    async fn destroy(&self, token_hash: &str) -> StorageResult<()>;

    /// Removes expired sessions, returning how many were dropped.
    async fn prune_expired(&self) -> StorageResult<u64>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn create(
        &self,
        token_hash: &str,
        user_id: i32,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.sessions.write().await.insert(
            token_hash.to_string(),
            Session {
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, token_hash: &str) -> StorageResult<Option<Session>> {
        let now = Utc::now();
        Ok(self
            .sessions
            .read()
            .await
            .get(token_hash)
            .filter(|session| !session.is_expired(now))
            .cloned())
    }

    async fn destroy(&self, token_hash: &str) -> StorageResult<()> {
        self.sessions.write().await.remove(token_hash);
        Ok(())
    }

    async fn prune_expired(&self) -> StorageResult<u64> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// Sessions persisted in the `sessions` table, surviving restarts.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn create(
        &self,
        token_hash: &str,
        user_id: i32,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (token_hash) DO UPDATE SET user_id = $2, expires_at = $3
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, token_hash: &str) -> StorageResult<Option<Session>> {
        let row: Option<(i32, DateTime<Utc>)> = sqlx::query_as(
            "SELECT user_id, expires_at FROM sessions WHERE token_hash = $1 AND expires_at > now()",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(user_id, expires_at)| Session {
            user_id,
            expires_at,
        }))
    }

    async fn destroy(&self, token_hash: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn prune_expired(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Sweeps expired sessions every `every` until the runtime shuts down.
pub fn spawn_session_pruner(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.prune_expired().await {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::debug!(removed, backend = store.backend(), "pruned expired sessions")
                }
                Err(e) => tracing::error!(error = %e, "failed to prune expired sessions"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let expires = Utc::now() + ChronoDuration::minutes(10);
        store.create("hash-a", 7, expires).await.unwrap();

        let session = store.get("hash-a").await.unwrap().unwrap();
        assert_eq!(session.user_id, 7);
        assert!(store.get("hash-b").await.unwrap().is_none());

        store.destroy("hash-a").await.unwrap();
        assert!(store.get("hash-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_reads_as_absent() {
        let store = MemorySessionStore::new();
        store
            .create("stale", 1, Utc::now() - ChronoDuration::seconds(1))
            .await
            .unwrap();
        assert!(store.get("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_drops_only_expired() {
        let store = MemorySessionStore::new();
        let now = Utc::now();
        store
            .create("old", 1, now - ChronoDuration::minutes(1))
            .await
            .unwrap();
        store
            .create("fresh", 2, now + ChronoDuration::minutes(10))
            .await
            .unwrap();

        assert_eq!(store.prune_expired().await.unwrap(), 1);
        assert_eq!(store.prune_expired().await.unwrap(), 0);
        assert!(store.get("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pruner_task_sweeps_periodically() {
        let store = Arc::new(MemorySessionStore::new());
        store
            .create("old", 1, Utc::now() - ChronoDuration::minutes(1))
            .await
            .unwrap();

        let handle = spawn_session_pruner(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(store.sessions.read().await.is_empty());
        handle.abort();
    }
}
