use std::sync::Arc;

use chrono::{Days, NaiveDate};
use polars::prelude::*;

use crate::models::NewDailyQuote;
use crate::repositories::{market_data, stock};
use crate::runtime::{CancelSignal, JobProgress};
use crate::services::errors::{SourceError, SyncError};
use crate::services::transform::clean_daily_bars;
use crate::sync::context::SyncContext;
use crate::sync::scope::shard_codes;
use crate::utils::bigdecimal_parser::opt_bigdecimal;
use crate::utils::trading_day::today_cn;

pub const TASK_NAME: &str = "daily_quotes";

/// 无历史数据时的冷启动安全窗口，顺带吸收上游的滞后修正
const COLD_START_DAYS: u64 = 7;

/// 全市场日线同步 (L1)
pub async fn sync_all(ctx: Arc<SyncContext>, cancel: CancelSignal) -> anyhow::Result<JobProgress> {
    let codes = {
        let mut conn = ctx.conn()?;
        stock::active_codes(&mut conn, None)?
    };
    tracing::info!("开始全市场日线同步: total={}", codes.len());
    sync_codes(ctx, cancel, codes).await
}

/// 自选股日线同步 (L2)
pub async fn sync_watchlist(
    ctx: Arc<SyncContext>,
    cancel: CancelSignal,
) -> anyhow::Result<JobProgress> {
    let codes = {
        let mut conn = ctx.conn()?;
        stock::watchlist_codes(&mut conn)?
    };
    if codes.is_empty() {
        tracing::info!("自选股为空，跳过日线同步");
        return Ok(JobProgress::default());
    }
    sync_codes(ctx, cancel, codes).await
}

/// 指定标的集合的日线同步，取消信号只在分片边界检查
pub async fn sync_codes(
    ctx: Arc<SyncContext>,
    cancel: CancelSignal,
    codes: Vec<String>,
) -> anyhow::Result<JobProgress> {
    let mut progress = JobProgress::default();
    for shard in shard_codes(&codes, ctx.sync_cfg.batch_size) {
        cancel.checkpoint()?;
        let shard_progress = sync_shard(&ctx, &shard).await?;
        progress.merge(shard_progress);
    }
    tracing::info!(
        "日线同步完成: fetched={}, accepted={}, written={}, errors={}",
        progress.fetched,
        progress.accepted,
        progress.written,
        progress.errors
    );
    Ok(progress)
}

/// 单个分片：片内逐标的串行。
/// 单标的失败登记 sync_errors 后继续；上游结构变化立即中断本片
pub async fn sync_shard(ctx: &SyncContext, codes: &[String]) -> Result<JobProgress, SyncError> {
    let mut progress = JobProgress::default();
    for code in codes {
        match sync_single(ctx, code, None, None).await {
            Ok(p) => {
                progress.merge(p);
                ctx.errors.record_success(TASK_NAME, code);
            }
            Err(e @ SyncError::Source(SourceError::SchemaDrift(_))) => {
                ctx.errors
                    .record_failure(TASK_NAME, code, e.kind(), &e.to_string());
                return Err(e);
            }
            Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
            Err(e) => {
                progress.errors += 1;
                ctx.errors
                    .record_failure(TASK_NAME, code, e.kind(), &e.to_string());
            }
        }
    }
    Ok(progress)
}

/// 单标的增量同步：起点 = 库内最新交易日 + 1，
/// 不早于上市日；无历史数据回溯冷启动窗口
pub async fn sync_single(
    ctx: &SyncContext,
    code: &str,
    start_override: Option<NaiveDate>,
    end_override: Option<NaiveDate>,
) -> Result<JobProgress, SyncError> {
    let end = end_override.unwrap_or_else(today_cn);
    let start = match start_override {
        Some(s) => s,
        None => {
            let mut conn = ctx.conn()?;
            let latest = market_data::latest_trade_date(&mut conn, code)?;
            let list_date = stock::find_by_code(&mut conn, code)?.and_then(|s| s.list_date);
            resolve_start(latest, list_date, end)
        }
    };
    if start > end {
        tracing::debug!("数据已是最新: code={}", code);
        return Ok(JobProgress::default());
    }

    let df = match ctx.source.daily_bars(code, start, end).await {
        Ok(df) => df,
        Err(SyncError::Source(SourceError::Empty)) => {
            tracing::debug!("无新数据: code={}", code);
            return Ok(JobProgress::default());
        }
        Err(e) => return Err(e),
    };

    let (clean, stats) = clean_daily_bars(df)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("clean: {}", e))))?;
    stats.guard_drift()?;
    if stats.rejected() > 0 {
        tracing::warn!(
            "日线清洗剔除: code={}, null_key={}, inversion={}, limit={}, dedup={}",
            code,
            stats.rejected_null_key,
            stats.rejected_inversion,
            stats.rejected_limit,
            stats.deduped
        );
    }

    let rows = frame_to_rows(&clean)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    let written = {
        let mut conn = ctx.conn()?;
        market_data::upsert_daily(&mut conn, &rows)?
    };

    let mut progress = JobProgress::default();
    progress.absorb_clean(&stats);
    progress.written = written as u32;
    tracing::debug!("日线同步完成: code={}, written={}", code, written);
    Ok(progress)
}

/// 起点推导；与上市日取晚值，避免拉取上市前的空区间
pub fn resolve_start(
    latest: Option<NaiveDate>,
    list_date: Option<NaiveDate>,
    end: NaiveDate,
) -> NaiveDate {
    let base = match latest {
        Some(d) => d + Days::new(1),
        None => end - Days::new(COLD_START_DAYS),
    };
    match list_date {
        Some(listed) if listed > base => listed,
        _ => base,
    }
}

/// 清洗后的帧转仓储行
pub fn frame_to_rows(df: &DataFrame) -> PolarsResult<Vec<NewDailyQuote>> {
    let codes = df.column("code")?.str()?;
    let dates = df.column("trade_date")?.date()?.as_date_iter().collect::<Vec<_>>();
    let opens = df.column("open")?.f64()?;
    let highs = df.column("high")?.f64()?;
    let lows = df.column("low")?.f64()?;
    let closes = df.column("close")?.f64()?;
    let volumes = df.column("volume")?.i64()?;
    let amounts = df.column("amount")?.f64()?;
    let changes = df.column("change")?.f64()?;
    let change_pcts = df.column("change_pct")?.f64()?;
    let turnovers = df.column("turnover_rate")?.f64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(code), Some(trade_date)) = (codes.get(i), dates[i]) else {
            continue;
        };
        rows.push(NewDailyQuote {
            code: code.to_string(),
            trade_date,
            open: opt_bigdecimal(opens.get(i)),
            high: opt_bigdecimal(highs.get(i)),
            low: opt_bigdecimal(lows.get(i)),
            close: opt_bigdecimal(closes.get(i)),
            volume: volumes.get(i),
            amount: opt_bigdecimal(amounts.get(i)),
            change: opt_bigdecimal(changes.get(i)),
            change_pct: opt_bigdecimal(change_pcts.get(i)),
            turnover_rate: opt_bigdecimal(turnovers.get(i)),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_continues_after_latest() {
        let latest = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 19).unwrap();
        assert_eq!(
            resolve_start(Some(latest), None, end),
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
        );
    }

    #[test]
    fn cold_start_uses_safety_window() {
        let end = NaiveDate::from_ymd_opt(2024, 1, 19).unwrap();
        assert_eq!(
            resolve_start(None, None, end),
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()
        );
    }

    #[test]
    fn list_date_clamps_start() {
        let end = NaiveDate::from_ymd_opt(2024, 1, 19).unwrap();
        let listed = NaiveDate::from_ymd_opt(2024, 1, 18).unwrap();
        assert_eq!(resolve_start(None, Some(listed), end), listed);
        // 已上市很久的股票不受影响
        let old = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        assert_eq!(
            resolve_start(None, Some(old), end),
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()
        );
    }
}
