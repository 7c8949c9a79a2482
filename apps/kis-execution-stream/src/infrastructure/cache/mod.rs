//! Redis Approval Key Cache
//!
//! Persists the approval key between process runs under one fixed key.
//! The store owns a single long-lived `ConnectionManager` handle which is
//! dropped on [`ApprovalKeyStore::release`].

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::application::ports::{ApprovalKeyStore, CacheError};

/// Approval key cache backed by Redis.
pub struct RedisApprovalKeyStore {
    key: String,
    connection: Mutex<Option<ConnectionManager>>,
}

impl std::fmt::Debug for RedisApprovalKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisApprovalKeyStore")
            .field("key", &self.key)
            .field("connected", &self.connection.lock().is_some())
            .finish()
    }
}

impl RedisApprovalKeyStore {
    /// Connect to Redis at `url` and cache under `key`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Connection` if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Connection {
            message: e.to_string(),
        })?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection {
                message: e.to_string(),
            })?;

        Ok(Self::from_manager(manager, key))
    }

    /// Wrap an existing connection handle.
    #[must_use]
    pub fn from_manager(manager: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            connection: Mutex::new(Some(manager)),
        }
    }

    /// The cache key in use.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    fn handle(&self) -> Result<ConnectionManager, CacheError> {
        self.connection.lock().clone().ok_or(CacheError::Released)
    }
}

#[async_trait]
impl ApprovalKeyStore for RedisApprovalKeyStore {
    async fn get(&self) -> Result<Option<String>, CacheError> {
        let mut conn = self.handle()?;
        conn.get(&self.key).await.map_err(|e| CacheError::Command {
            message: e.to_string(),
        })
    }

    async fn set(&self, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.handle()?;
        conn.set_ex::<_, _, ()>(&self.key, value, ttl.as_secs())
            .await
            .map_err(|e| CacheError::Command {
                message: e.to_string(),
            })
    }

    async fn release(&self) {
        if self.connection.lock().take().is_some() {
            tracing::debug!(key = %self.key, "Released approval key cache connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn released_store() -> RedisApprovalKeyStore {
        RedisApprovalKeyStore {
            key: "kis:test:approval_key".to_string(),
            connection: Mutex::new(None),
        }
    }

    /// Get test Redis URL from environment.
    fn get_test_redis_url() -> Option<String> {
        std::env::var("TEST_REDIS_URL")
            .or_else(|_| std::env::var("REDIS_URL"))
            .ok()
    }

    #[tokio::test]
    async fn released_store_rejects_get() {
        let store = released_store();
        assert!(matches!(store.get().await, Err(CacheError::Released)));
    }

    #[tokio::test]
    async fn released_store_rejects_set() {
        let store = released_store();
        let result = store.set("approval", Duration::from_secs(60)).await;
        assert!(matches!(result, Err(CacheError::Released)));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = released_store();
        store.release().await;
        store.release().await;

        assert!(matches!(store.get().await, Err(CacheError::Released)));
        assert_eq!(store.key(), "kis:test:approval_key");
    }

    #[test]
    fn debug_reports_connection_state() {
        let debug = format!("{:?}", released_store());
        assert!(debug.contains("kis:test:approval_key"));
        assert!(debug.contains("connected: false"));
    }

    #[tokio::test]
    async fn invalid_url_is_connection_error() {
        let result = RedisApprovalKeyStore::connect("not-a-redis-url", "k").await;
        assert!(matches!(result, Err(CacheError::Connection { .. })));
    }

    #[tokio::test]
    #[ignore = "Requires Redis TEST_REDIS_URL"]
    #[allow(clippy::expect_used)]
    async fn set_get_release_against_redis() {
        let url = get_test_redis_url().expect("TEST_REDIS_URL required");
        let store = match RedisApprovalKeyStore::connect(&url, "kis:test:approval_key").await {
            Ok(store) => store,
            Err(e) => panic!("should connect to redis: {e}"),
        };

        store
            .set("approval-abc", Duration::from_secs(30))
            .await
            .expect("set should succeed");
        assert_eq!(
            store.get().await.expect("get should succeed").as_deref(),
            Some("approval-abc")
        );

        store.release().await;
        store.release().await;
        assert!(matches!(store.get().await, Err(CacheError::Released)));
    }
}
