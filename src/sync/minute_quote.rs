use std::sync::Arc;

use polars::prelude::*;

use crate::models::NewMinuteQuote;
use crate::repositories::{market_data, stock};
use crate::runtime::{CancelSignal, JobProgress};
use crate::services::errors::{SourceError, SyncError};
use crate::services::news_source::cn_time_to_utc;
use crate::services::transform::clean_keyed;
use crate::sync::context::SyncContext;
use crate::sync::scope::shard_codes;
use crate::utils::bigdecimal_parser::opt_bigdecimal;

pub const TASK_NAME: &str = "minute_quotes";

/// 自选股分钟线同步 (L2)；仅自选股保留分钟数据
pub async fn sync_watchlist(
    ctx: Arc<SyncContext>,
    cancel: CancelSignal,
) -> anyhow::Result<JobProgress> {
    let codes = {
        let mut conn = ctx.conn()?;
        stock::watchlist_codes(&mut conn)?
    };
    if codes.is_empty() {
        tracing::info!("自选股为空，跳过分钟线同步");
        return Ok(JobProgress::default());
    }

    let mut progress = JobProgress::default();
    for shard in shard_codes(&codes, ctx.sync_cfg.batch_size) {
        cancel.checkpoint()?;
        for code in &shard {
            match sync_single(&ctx, code).await {
                Ok(p) => {
                    progress.merge(p);
                    ctx.errors.record_success(TASK_NAME, code);
                }
                Err(e @ SyncError::Source(SourceError::SchemaDrift(_))) => {
                    ctx.errors
                        .record_failure(TASK_NAME, code, e.kind(), &e.to_string());
                    return Err(e.into());
                }
                Err(e) => {
                    progress.errors += 1;
                    ctx.errors
                        .record_failure(TASK_NAME, code, e.kind(), &e.to_string());
                }
            }
        }
    }
    Ok(progress)
}

async fn sync_single(ctx: &SyncContext, code: &str) -> Result<JobProgress, SyncError> {
    let df = match ctx.source.minute_bars(code).await {
        Ok(df) => df,
        Err(SyncError::Source(SourceError::Empty)) => return Ok(JobProgress::default()),
        Err(e) => return Err(e),
    };

    let (clean, stats) = clean_keyed(df, &["code", "timestamp"])
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("clean: {}", e))))?;
    stats.guard_drift()?;

    let rows = frame_to_rows(&clean)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    let written = {
        let mut conn = ctx.conn()?;
        market_data::upsert_minute(&mut conn, &rows)?
    };

    let mut progress = JobProgress::default();
    progress.absorb_clean(&stats);
    progress.written = written as u32;
    Ok(progress)
}

fn frame_to_rows(df: &DataFrame) -> PolarsResult<Vec<NewMinuteQuote>> {
    let codes = df.column("code")?.str()?;
    let timestamps = df
        .column("timestamp")?
        .datetime()?
        .as_datetime_iter()
        .collect::<Vec<_>>();
    let opens = df.column("open")?.f64()?;
    let highs = df.column("high")?.f64()?;
    let lows = df.column("low")?.f64()?;
    let closes = df.column("close")?.f64()?;
    let volumes = df.column("volume")?.i64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(code), Some(naive)) = (codes.get(i), timestamps[i]) else {
            continue;
        };
        rows.push(NewMinuteQuote {
            code: code.to_string(),
            timestamp: cn_time_to_utc(naive),
            open: opt_bigdecimal(opens.get(i)),
            high: opt_bigdecimal(highs.get(i)),
            low: opt_bigdecimal(lows.get(i)),
            close: opt_bigdecimal(closes.get(i)),
            volume: volumes.get(i),
        });
    }
    Ok(rows)
}
