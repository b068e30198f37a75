//! Redis-backed revoked token store

use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

use crate::error::{AppError, AppResult};

use super::tokens::{remaining_ttl, RevokedTokens};

#[derive(Clone)]
pub struct RedisService {
    conn: ConnectionManager,
}

impl RedisService {
    /// Connect to Redis and check the connection
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(Self { conn })
    }

    fn key(jti: &str) -> String {
        format!("revoked_token:{}", jti)
    }
}

#[async_trait]
impl RevokedTokens for RedisService {
    async fn revoke(&self, jti: &str, expires_at: i64) -> AppResult<()> {
        let ttl = remaining_ttl(expires_at, Utc::now().timestamp());
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(Self::key(jti), "1", ttl).await?;
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::key(jti)).await?;
        Ok(exists)
    }
}
