use crate::db::DbPool;
use crate::repositories::sync_error;
use crate::services::errors::SyncErrorKind;

/// 同步错误登记口
///
/// 同步器对每个失败标的调用 record_failure 后必须继续向上抛错，
/// 静默吞错是契约违规；同 key 成功后调用 record_success 闭环
pub trait ErrorSink: Send + Sync {
    fn record_failure(&self, task: &str, target: &str, kind: SyncErrorKind, message: &str);
    fn record_success(&self, task: &str, target: &str);
}

/// 落库实现：写 sync_errors 表。
/// 登记本身失败只记日志，不能反过来掩盖原始错误
pub struct DbErrorSink {
    pool: DbPool,
}

impl DbErrorSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ErrorSink for DbErrorSink {
    fn record_failure(&self, task: &str, target: &str, kind: SyncErrorKind, message: &str) {
        tracing::error!(
            "同步失败已登记: task={}, target={}, kind={}, error={}",
            task,
            target,
            kind.as_str(),
            message
        );
        match self.pool.get() {
            Ok(mut conn) => {
                if let Err(e) = sync_error::create_or_increment(&mut conn, task, target, kind, message)
                {
                    tracing::warn!("写入 sync_errors 失败: {}", e);
                }
            }
            Err(e) => tracing::warn!("获取连接失败，错误未落库: {}", e),
        }
    }

    fn record_success(&self, task: &str, target: &str) {
        match self.pool.get() {
            Ok(mut conn) => match sync_error::mark_resolved(&mut conn, task, target) {
                Ok(0) => {}
                Ok(n) => {
                    tracing::info!("错误自动闭环: task={}, target={}, resolved={}", task, target, n)
                }
                Err(e) => tracing::warn!("更新 resolved_at 失败: {}", e),
            },
            Err(e) => tracing::warn!("获取连接失败，闭环未落库: {}", e),
        }
    }
}
