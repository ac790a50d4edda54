use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::services::source::RealtimeQuote;
use crate::services::errors::SyncError;

/// L3 实时缓存
///
/// 键为 (数据集, 代码)；未命中时 singleflight 拉取，同键并发读者
/// 共享同一次上游调用。拉取失败时，过期宽限内返回旧值
pub struct RealtimeCache {
    fresh: Cache<String, Arc<RealtimeQuote>>,
    stale: Cache<String, Arc<RealtimeQuote>>,
}

impl RealtimeCache {
    pub fn new(ttl_seconds: u64, stale_grace_seconds: u64) -> Self {
        Self {
            fresh: Cache::builder()
                .time_to_live(Duration::from_secs(ttl_seconds.max(1)))
                .max_capacity(10_000)
                .build(),
            stale: Cache::builder()
                .time_to_live(Duration::from_secs(stale_grace_seconds.max(1)))
                .max_capacity(10_000)
                .build(),
        }
    }

    pub async fn get_or_fetch<F, Fut>(
        &self,
        dataset: &str,
        code: &str,
        fetch: F,
    ) -> Result<Arc<RealtimeQuote>, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RealtimeQuote, SyncError>>,
    {
        let key = format!("{}:{}", dataset, code);

        let result = self
            .fresh
            .try_get_with(key.clone(), async {
                fetch().await.map(Arc::new)
            })
            .await;

        match result {
            Ok(quote) => {
                self.stale.insert(key, quote.clone()).await;
                Ok(quote)
            }
            Err(err) => {
                if let Some(prior) = self.stale.get(&key).await {
                    tracing::warn!("实时拉取失败，宽限期内回退旧值: key={}, error={}", key, err);
                    return Ok(prior);
                }
                Err(unwrap_arc_error(err))
            }
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.fresh.entry_count()
    }
}

fn unwrap_arc_error(err: Arc<SyncError>) -> SyncError {
    match Arc::try_unwrap(err) {
        Ok(e) => e,
        Err(shared) => SyncError::Config(format!("realtime fetch failed: {}", shared)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::errors::SourceError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quote(code: &str, price: f64) -> RealtimeQuote {
        RealtimeQuote {
            code: code.to_string(),
            name: "测试".to_string(),
            price: Some(price),
            change: None,
            change_pct: None,
            open: None,
            high: None,
            low: None,
            pre_close: None,
            volume: None,
            amount: None,
        }
    }

    #[tokio::test]
    async fn hit_skips_upstream() {
        let cache = RealtimeCache::new(10, 60);
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let got = cache
                .get_or_fetch("realtime", "600519", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(quote("600519", 1800.0))
                })
                .await
                .unwrap();
            assert_eq!(got.price, Some(1800.0));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_falls_back_to_stale() {
        let cache = RealtimeCache::new(10, 60);
        cache
            .get_or_fetch("realtime", "600519", || async { Ok(quote("600519", 1800.0)) })
            .await
            .unwrap();

        // 手动失效新值，保留宽限副本
        cache.fresh.invalidate(&"realtime:600519".to_string()).await;

        let got = cache
            .get_or_fetch("realtime", "600519", || async {
                Err(SyncError::Source(SourceError::UpstreamUnavailable(
                    "502".into(),
                )))
            })
            .await
            .unwrap();
        assert_eq!(got.price, Some(1800.0));
    }

    #[tokio::test]
    async fn failure_without_stale_surfaces_error() {
        let cache = RealtimeCache::new(10, 60);
        let result = cache
            .get_or_fetch("realtime", "000001", || async {
                Err(SyncError::Source(SourceError::UpstreamUnavailable(
                    "502".into(),
                )))
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn concurrent_misses_share_single_fetch() {
        let cache = Arc::new(RealtimeCache::new(10, 60));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("realtime", "300750", move || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(quote("300750", 160.0))
                        }
                    })
                    .await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
