use std::sync::Arc;

use chrono::{NaiveTime, TimeZone};
use chrono_tz::Asia::Shanghai;
use polars::prelude::*;

use crate::models::{NewLimitUpStock, NewMarketSentiment};
use crate::repositories::sentiment;
use crate::runtime::{CancelSignal, JobProgress};
use crate::services::errors::{SourceError, SyncError};
use crate::services::transform::clean_keyed;
use crate::sync::context::SyncContext;
use crate::utils::bigdecimal_parser::opt_bigdecimal;
use crate::utils::trading_day::{latest_trading_day, today_cn};

pub const TASK_NAME: &str = "market_sentiment";

/// 市场情绪同步 (L1)：涨跌分布 + 涨停板池
pub async fn sync(ctx: Arc<SyncContext>, _cancel: CancelSignal) -> anyhow::Result<JobProgress> {
    let trade_date = latest_trading_day(today_cn());
    let mut progress = JobProgress::default();

    let sentiment_df = ctx.source.market_sentiment(trade_date).await?;
    let sentiment_rows = sentiment_rows(&sentiment_df)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    {
        let mut conn = ctx.conn()?;
        progress.written += sentiment::upsert_sentiment(&mut conn, &sentiment_rows)? as u32;
    }
    progress.fetched += sentiment_df.height() as u32;
    progress.accepted += sentiment_rows.len() as u32;

    // 节假日或数据尚未生成时涨停池为空，不算失败
    match ctx.source.limit_up_pool(trade_date).await {
        Ok(df) => {
            let (clean, stats) = clean_keyed(df, &["code", "trade_date"])
                .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("clean: {}", e))))?;
            stats.guard_drift().map_err(SyncError::Source)?;
            let rows = limit_up_rows(&clean)
                .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
            {
                let mut conn = ctx.conn()?;
                progress.written += sentiment::upsert_limit_up(&mut conn, &rows)? as u32;
            }
            progress.absorb_clean(&stats);
        }
        Err(SyncError::Source(SourceError::Empty)) => {
            tracing::info!("涨停池为空: trade_date={}", trade_date);
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!("市场情绪同步完成: trade_date={}", trade_date);
    Ok(progress)
}

fn sentiment_rows(df: &DataFrame) -> PolarsResult<Vec<NewMarketSentiment>> {
    let dates = df.column("trade_date")?.date()?.as_date_iter().collect::<Vec<_>>();
    let up = df.column("up_count")?.i64()?;
    let down = df.column("down_count")?.i64()?;
    let flat = df.column("flat_count")?.i64()?;
    let limit_up = df.column("limit_up_count")?.i64()?;
    let limit_down = df.column("limit_down_count")?.i64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(trade_date) = dates[i] else { continue };
        // 炸板率 = 1 - 涨停数 / (涨停数 + 炸板数)；上游无炸板数时留空
        rows.push(NewMarketSentiment {
            trade_date,
            up_count: up.get(i).map(|v| v as i32),
            down_count: down.get(i).map(|v| v as i32),
            flat_count: flat.get(i).map(|v| v as i32),
            limit_up_count: limit_up.get(i).map(|v| v as i32),
            limit_down_count: limit_down.get(i).map(|v| v as i32),
            broken_board_rate: None,
            total_turnover: None,
        });
    }
    Ok(rows)
}

fn limit_up_rows(df: &DataFrame) -> PolarsResult<Vec<NewLimitUpStock>> {
    let codes = df.column("code")?.str()?;
    let dates = df.column("trade_date")?.date()?.as_date_iter().collect::<Vec<_>>();
    let reasons = df.column("reason")?.str()?;
    let streaks = df.column("streak_days")?.i64()?;
    let seals = df.column("seal_amount")?.f64()?;
    let firsts = df.column("first_seal_time")?.i64()?;
    let lasts = df.column("last_seal_time")?.i64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(code), Some(trade_date)) = (codes.get(i), dates[i]) else {
            continue;
        };
        rows.push(NewLimitUpStock {
            code: code.to_string(),
            trade_date,
            reason: reasons.get(i).map(|s| s.to_string()),
            streak_days: streaks.get(i).map(|v| v as i32),
            seal_amount: opt_bigdecimal(seals.get(i)),
            first_seal_time: firsts.get(i).and_then(|v| seal_time(trade_date, v)),
            last_seal_time: lasts.get(i).and_then(|v| seal_time(trade_date, v)),
        });
    }
    Ok(rows)
}

/// 上游封板时间为 HHMMSS 整数，叠加交易日得到时间戳
fn seal_time(
    trade_date: chrono::NaiveDate,
    hhmmss: i64,
) -> Option<chrono::DateTime<chrono::Utc>> {
    let h = (hhmmss / 10_000) as u32;
    let m = ((hhmmss / 100) % 100) as u32;
    let s = (hhmmss % 100) as u32;
    let time = NaiveTime::from_hms_opt(h, m, s)?;
    match Shanghai.from_local_datetime(&trade_date.and_time(time)) {
        chrono::LocalResult::Single(dt) => Some(dt.with_timezone(&chrono::Utc)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn seal_time_combines_date_and_hhmmss() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let ts = seal_time(date, 93005).unwrap();
        // 北京时间 09:30:05 == UTC 01:30:05
        assert_eq!(ts.to_rfc3339(), "2024-01-15T01:30:05+00:00");
    }

    #[test]
    fn seal_time_rejects_malformed() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert!(seal_time(date, 256090).is_none());
    }
}
