use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
    #[error("missing required variable {0}")]
    Missing(&'static str),
}

fn env_parse<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_bool(var: &'static str, default: bool) -> bool {
    std::env::var(var)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// 调度策略旋钮
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulePolicy {
    /// L1 统一执行时刻 (小时, 分钟)
    pub l1_daily_time: (u32, u32),
    pub l2_interval_seconds: u64,
    pub l2_task_offset_seconds: u64,
    pub realtime_cache_ttl: u64,
    pub realtime_stale_grace: u64,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            l1_daily_time: (17, 30),
            l2_interval_seconds: 300,
            l2_task_offset_seconds: 120,
            realtime_cache_ttl: 10,
            realtime_stale_grace: 60,
        }
    }
}

impl SchedulePolicy {
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        let l1_daily_time = match std::env::var("SYNC_L1_DAILY_TIME") {
            Ok(raw) => parse_hhmm(&raw).ok_or(ConfigError::Invalid {
                var: "SYNC_L1_DAILY_TIME",
                value: raw,
            })?,
            Err(_) => default.l1_daily_time,
        };
        Ok(Self {
            l1_daily_time,
            l2_interval_seconds: env_parse("SYNC_L2_INTERVAL_SECONDS", default.l2_interval_seconds)?,
            l2_task_offset_seconds: env_parse(
                "SYNC_L2_TASK_OFFSET_SECONDS",
                default.l2_task_offset_seconds,
            )?,
            realtime_cache_ttl: env_parse("REALTIME_CACHE_TTL", default.realtime_cache_ttl)?,
            realtime_stale_grace: env_parse("REALTIME_STALE_GRACE", default.realtime_stale_grace)?,
        })
    }
}

fn parse_hhmm(raw: &str) -> Option<(u32, u32)> {
    let (h, m) = raw.trim().split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// 指标重算范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputePolicy {
    /// 仅补最新未覆盖交易日
    Latest,
    /// 重算日线被改写过的所有交易日
    Changed,
}

/// 行业信息二源合并时谁优先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndustrySource {
    Primary,
    Secondary,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 分片大小（每片标的数）
    pub batch_size: usize,
    /// 令牌桶补充速率 (每秒)
    pub rate_qps: u32,
    /// 工作协程数
    pub workers: usize,
    pub indicator_recompute: RecomputePolicy,
    pub industry_source: IndustrySource,
    /// 单次上游调用总时限
    pub call_deadline: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            rate_qps: 5,
            workers: 4,
            indicator_recompute: RecomputePolicy::Changed,
            industry_source: IndustrySource::Secondary,
            call_deadline: Duration::from_secs(60),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        let indicator_recompute = match std::env::var("SYNC_INDICATOR_RECOMPUTE") {
            Ok(raw) => match raw.trim() {
                "latest" => RecomputePolicy::Latest,
                "changed" => RecomputePolicy::Changed,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "SYNC_INDICATOR_RECOMPUTE",
                        value: raw,
                    })
                }
            },
            Err(_) => default.indicator_recompute,
        };
        let industry_source = match std::env::var("SYNC_INDUSTRY_SOURCE") {
            Ok(raw) => match raw.trim() {
                "primary" => IndustrySource::Primary,
                "secondary" => IndustrySource::Secondary,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "SYNC_INDUSTRY_SOURCE",
                        value: raw,
                    })
                }
            },
            Err(_) => default.industry_source,
        };
        Ok(Self {
            batch_size: env_parse("SYNC_BATCH_SIZE", default.batch_size)?,
            rate_qps: env_parse("UPSTREAM_RATE_QPS", default.rate_qps)?,
            workers: env_parse("SYNC_WORKERS", default.workers)?,
            indicator_recompute,
            industry_source,
            call_deadline: Duration::from_secs(env_parse("UPSTREAM_CALL_DEADLINE_SECONDS", 60u64)?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub retention_days: i64,
    pub protect_watchlist: bool,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            protect_watchlist: true,
        }
    }
}

impl NewsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        Ok(Self {
            retention_days: env_parse("NEWS_RETENTION_DAYS", default.retention_days)?,
            protect_watchlist: env_bool("NEWS_CLEANUP_PROTECT_WATCHLIST", default.protect_watchlist),
        })
    }
}

/// 周度任务的 cron 坐标（day_of_week: 0=周日 .. 6=周六）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySpec {
    pub day_of_week: u32,
    pub hour: u32,
    pub minute: u32,
}

impl WeeklySpec {
    pub fn from_env(
        day_var: &'static str,
        hour_var: &'static str,
        minute_var: &'static str,
        default: WeeklySpec,
    ) -> Result<Self, ConfigError> {
        let spec = Self {
            day_of_week: env_parse(day_var, default.day_of_week)?,
            hour: env_parse(hour_var, default.hour)?,
            minute: env_parse(minute_var, default.minute)?,
        };
        if spec.day_of_week > 6 || spec.hour > 23 || spec.minute > 59 {
            return Err(ConfigError::Invalid {
                var: day_var,
                value: format!("{} {}:{}", spec.day_of_week, spec.hour, spec.minute),
            });
        }
        Ok(spec)
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.siliconflow.cn/v1".to_string(),
            api_key: String::new(),
            model: "BAAI/bge-large-zh-v1.5".to_string(),
            dimension: 1024,
            batch_size: 100,
        }
    }
}

impl EmbeddingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        Ok(Self {
            base_url: std::env::var("EMBEDDING_BASE_URL").unwrap_or(default.base_url),
            api_key: std::env::var("EMBEDDING_API_KEY").unwrap_or_default(),
            model: std::env::var("EMBEDDING_MODEL").unwrap_or(default.model),
            dimension: env_parse("EMBEDDING_DIMENSION", default.dimension)?,
            batch_size: env_parse("EMBEDDING_BATCH_SIZE", default.batch_size)?,
        })
    }
}

/// 启动时装配一次的完整配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_pool_max: u32,
    pub schedule: SchedulePolicy,
    pub sync: SyncConfig,
    pub news: NewsConfig,
    pub financial_schedule: WeeklySpec,
    pub cleanup_schedule: WeeklySpec,
    pub embedding: EmbeddingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let sync = SyncConfig::from_env()?;
        // 连接池至少 2 倍 worker，避免分片写互相等连接
        let pool_floor = (sync.workers as u32) * 2;
        let db_pool_max = env_parse("DB_POOL_MAX", 20u32)?.max(pool_floor);
        Ok(Self {
            database_url,
            db_pool_max,
            schedule: SchedulePolicy::from_env()?,
            sync,
            news: NewsConfig::from_env()?,
            financial_schedule: WeeklySpec::from_env(
                "SYNC_FINANCIAL_DAY_OF_WEEK",
                "SYNC_FINANCIAL_HOUR",
                "SYNC_FINANCIAL_MINUTE",
                WeeklySpec {
                    day_of_week: 6,
                    hour: 20,
                    minute: 0,
                },
            )?,
            cleanup_schedule: WeeklySpec::from_env(
                "CLEANUP_NEWS_DAY_OF_WEEK",
                "CLEANUP_NEWS_HOUR",
                "CLEANUP_NEWS_MINUTE",
                WeeklySpec {
                    day_of_week: 1,
                    hour: 2,
                    minute: 0,
                },
            )?,
            embedding: EmbeddingConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hhmm_accepts_valid() {
        assert_eq!(parse_hhmm("17:30"), Some((17, 30)));
        assert_eq!(parse_hhmm(" 9:05 "), Some((9, 5)));
    }

    #[test]
    fn parse_hhmm_rejects_invalid() {
        assert_eq!(parse_hhmm("25:00"), None);
        assert_eq!(parse_hhmm("17:60"), None);
        assert_eq!(parse_hhmm("1730"), None);
    }
}
