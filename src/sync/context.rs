use std::sync::Arc;

use crate::db::{DbPool, PgPoolConn};
use crate::runtime::ErrorSink;
use crate::services::errors::{RepoError, SyncError};
use crate::services::realtime::RealtimeCache;
use crate::services::source::{EmbeddingProvider, MarketDataSource, NewsFeed, RealtimeQuote};
use crate::utils::config::{NewsConfig, SyncConfig};

/// 同步器依赖集合，启动时在组合根装配一次，
/// 以显式依赖传入，不做全局单例
pub struct SyncContext {
    pub db: DbPool,
    pub source: Arc<dyn MarketDataSource>,
    pub news: Arc<dyn NewsFeed>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub errors: Arc<dyn ErrorSink>,
    pub realtime: Arc<RealtimeCache>,
    pub sync_cfg: SyncConfig,
    pub news_cfg: NewsConfig,
}

impl SyncContext {
    pub fn conn(&self) -> Result<PgPoolConn, SyncError> {
        self.db
            .get()
            .map_err(|e| SyncError::Repo(RepoError::Pool(e.to_string())))
    }

    /// L3 按需行情：实时缓存前置，未命中 singleflight 回源
    pub async fn realtime_quote(&self, code: &str) -> Result<Arc<RealtimeQuote>, SyncError> {
        let source = self.source.clone();
        let owned = code.to_string();
        self.realtime
            .get_or_fetch("realtime", code, || async move {
                source.realtime_quote(&owned).await
            })
            .await
    }
}
