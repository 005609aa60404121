//! Read-through cache over `system_settings`
//!
//! Requests copy the `Arc<FeeParameters>` snapshot once and compute against
//! it, so a concurrent refresh never mixes two parameter sets.

use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::db;
use crate::error::ServiceResult;
use crate::pricing::FeeParameters;

struct Snapshot {
    params: Arc<FeeParameters>,
    expires_at: Instant,
}

pub struct SettingsCache {
    inner: RwLock<Option<Snapshot>>,
    ttl: Duration,
}

impl SettingsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(None),
            ttl,
        }
    }

    /// Current parameters, reloading when the snapshot is stale
    pub async fn fee_parameters(&self, pool: &MySqlPool) -> ServiceResult<Arc<FeeParameters>> {
        {
            let guard = self.inner.read().await;
            if let Some(snap) = guard.as_ref()
                && snap.expires_at > Instant::now()
            {
                return Ok(snap.params.clone());
            }
        }

        let mut guard = self.inner.write().await;
        // Another request may have refreshed while we waited
        if let Some(snap) = guard.as_ref()
            && snap.expires_at > Instant::now()
        {
            return Ok(snap.params.clone());
        }

        let rows = db::settings::load_all(pool).await?;
        let params = Arc::new(FeeParameters::from_settings(rows)?);
        *guard = Some(Snapshot {
            params: params.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        tracing::debug!("Fee parameters reloaded");
        Ok(params)
    }

    /// Drop the snapshot after an administrative write
    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }

    #[cfg(test)]
    async fn prime(&self, params: FeeParameters) {
        *self.inner.write().await = Some(Snapshot {
            params: Arc::new(params),
            expires_at: Instant::now() + self.ttl,
        });
    }

    #[cfg(test)]
    async fn is_primed(&self) -> bool {
        self.inner.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_snapshot_is_served_without_the_database() {
        let cache = SettingsCache::new(Duration::from_secs(60));
        let mut params = FeeParameters::default();
        params.base_fee = rust_decimal::Decimal::from(7);
        cache.prime(params).await;

        // Lazy pool never connects; a cache hit must not touch it
        let pool = sqlx::mysql::MySqlPoolOptions::new()
            .connect_lazy("mysql://nobody@127.0.0.1:1/none")
            .unwrap();
        let got = cache.fee_parameters(&pool).await.unwrap();
        assert_eq!(got.base_fee, rust_decimal::Decimal::from(7));
    }

    #[tokio::test]
    async fn invalidate_clears_the_snapshot() {
        let cache = SettingsCache::new(Duration::from_secs(60));
        cache.prime(FeeParameters::default()).await;
        assert!(cache.is_primed().await);
        cache.invalidate().await;
        assert!(!cache.is_primed().await);
    }
}
