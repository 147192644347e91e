//! Redis session backend shared by all BFF instances.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use crate::AuthResult;
use crate::error::AuthError;
use crate::session::SessionBackend;

/// Session backend over a `deadpool-redis` pool.
///
/// Values are written with `SET .. EX` so Redis enforces the TTL; the store
/// additionally checks `expiresAt` on every read.
#[derive(Clone)]
pub struct RedisSessionBackend {
    pool: Pool,
}

impl RedisSessionBackend {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> AuthResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to get Redis connection");
            AuthError::storage(format!("Redis connection unavailable: {e}"))
        })
    }
}

impl std::fmt::Debug for RedisSessionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionBackend")
            .field("pool", &self.pool.status())
            .finish()
    }
}

#[async_trait]
impl SessionBackend for RedisSessionBackend {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AuthResult<()> {
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs as usize)
            .await
            .map_err(|e| {
                tracing::warn!(key = %key, error = %e, "Redis SET error");
                AuthError::storage(format!("Failed to store session: {e}"))
            })
    }

    async fn get(&self, key: &str) -> AuthResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<Vec<u8>>>(key).await.map_err(|e| {
            tracing::warn!(key = %key, error = %e, "Redis GET error");
            AuthError::storage(format!("Failed to load session: {e}"))
        })
    }

    async fn delete(&self, key: &str) -> AuthResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await.map_err(|e| {
            tracing::warn!(key = %key, error = %e, "Redis DEL error");
            AuthError::storage(format!("Failed to delete session: {e}"))
        })
    }

    async fn ping(&self) -> AuthResult<()> {
        let mut conn = self.connection().await?;
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::storage(format!("Redis PING failed: {e}")))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
