//! Revoked token store.
//!
//! Logging out records the token's `jti` until the token would have expired
//! anyway. The store is Redis when enabled, process memory otherwise.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::AppResult;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RevokedTokens: Send + Sync {
    /// Remember `jti` as revoked until `expires_at` (unix seconds)
    async fn revoke(&self, jti: &str, expires_at: i64) -> AppResult<()>;

    async fn is_revoked(&self, jti: &str) -> AppResult<bool>;
}

/// Seconds left until `expires_at`, at least one
pub fn remaining_ttl(expires_at: i64, now: i64) -> u64 {
    (expires_at - now).max(1) as u64
}

/// In-process store, used when Redis is disabled
#[derive(Default)]
pub struct MemoryRevokedTokens {
    revoked: RwLock<HashMap<String, i64>>,
}

impl MemoryRevokedTokens {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevokedTokens for MemoryRevokedTokens {
    async fn revoke(&self, jti: &str, expires_at: i64) -> AppResult<()> {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(jti.to_string(), expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> AppResult<bool> {
        let now = Utc::now().timestamp();
        Ok(self
            .revoked
            .read()
            .await
            .get(jti)
            .is_some_and(|exp| *exp > now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_revokes_until_expiry() {
        let store = MemoryRevokedTokens::new();
        let now = Utc::now().timestamp();

        store.revoke("live", now + 60).await.unwrap();
        store.revoke("stale", now - 1).await.unwrap();

        assert!(store.is_revoked("live").await.unwrap());
        assert!(!store.is_revoked("stale").await.unwrap());
        assert!(!store.is_revoked("unknown").await.unwrap());
    }

    #[test]
    fn test_remaining_ttl_is_positive() {
        assert_eq!(remaining_ttl(100, 40), 60);
        assert_eq!(remaining_ttl(100, 400), 1);
    }
}
