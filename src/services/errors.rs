use serde::Serialize;
use thiserror::Error;

/// 闭集错误类别，驱动重试决策与 sync_errors 监控
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SyncErrorKind {
    RateLimited,
    UpstreamUnavailable,
    SchemaDrift,
    ValidationRejected,
    WriteConflict,
    Cancelled,
    DeadlineExceeded,
    ConfigError,
    Unknown,
}

impl SyncErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorKind::RateLimited => "RateLimited",
            SyncErrorKind::UpstreamUnavailable => "UpstreamUnavailable",
            SyncErrorKind::SchemaDrift => "SchemaDrift",
            SyncErrorKind::ValidationRejected => "ValidationRejected",
            SyncErrorKind::WriteConflict => "WriteConflict",
            SyncErrorKind::Cancelled => "Cancelled",
            SyncErrorKind::DeadlineExceeded => "DeadlineExceeded",
            SyncErrorKind::ConfigError => "ConfigError",
            SyncErrorKind::Unknown => "Unknown",
        }
    }
}

/// 上游数据源错误
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("schema drift: {0}")]
    SchemaDrift(String),
    #[error("empty response")]
    Empty,
    #[error("unknown upstream error: {0}")]
    Unknown(String),
}

impl SourceError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SourceError::RateLimited(_) => SyncErrorKind::RateLimited,
            SourceError::UpstreamUnavailable(_) => SyncErrorKind::UpstreamUnavailable,
            SourceError::SchemaDrift(_) => SyncErrorKind::SchemaDrift,
            // 空响应不重试，按未知归类监控
            SourceError::Empty => SyncErrorKind::Unknown,
            SourceError::Unknown(_) => SyncErrorKind::Unknown,
        }
    }

    /// 仅 RateLimited / UpstreamUnavailable（含传输超时）可重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited(_) | SourceError::UpstreamUnavailable(_)
        )
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            SourceError::UpstreamUnavailable(e.to_string())
        } else if let Some(status) = e.status() {
            match status.as_u16() {
                429 => SourceError::RateLimited(e.to_string()),
                500..=599 => SourceError::UpstreamUnavailable(e.to_string()),
                _ => SourceError::Unknown(e.to_string()),
            }
        } else {
            SourceError::Unknown(e.to_string())
        }
    }
}

/// 仓储层错误；幂等 upsert 路径不会产生 WriteConflict，
/// 只有约束/结构问题会
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("chunk {index} write failed: {source}")]
    Chunk {
        index: usize,
        #[source]
        source: diesel::result::Error,
    },
    #[error("db error: {0}")]
    Db(#[from] diesel::result::Error),
    #[error("pool error: {0}")]
    Pool(String),
}

/// 同步器统一错误，向上冒泡到分片边界
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("config error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::Source(e) => e.kind(),
            SyncError::Repo(_) => SyncErrorKind::WriteConflict,
            SyncError::Cancelled => SyncErrorKind::Cancelled,
            SyncError::DeadlineExceeded => SyncErrorKind::DeadlineExceeded,
            SyncError::Config(_) => SyncErrorKind::ConfigError,
        }
    }
}
