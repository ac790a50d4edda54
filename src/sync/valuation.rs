use std::sync::Arc;

use chrono::NaiveDate;
use polars::prelude::*;

use crate::models::NewValuation;
use crate::repositories::valuation;
use crate::runtime::{CancelSignal, JobProgress};
use crate::services::errors::{SourceError, SyncError};
use crate::services::transform::clean_keyed;
use crate::sync::context::SyncContext;
use crate::utils::bigdecimal_parser::opt_bigdecimal;
use crate::utils::trading_day::{latest_trading_day, today_cn};

pub const TASK_NAME: &str = "valuation";

/// 全市场估值快照同步 (L1)：一次拉取，按交易日落库
pub async fn sync(ctx: Arc<SyncContext>, _cancel: CancelSignal) -> anyhow::Result<JobProgress> {
    let trade_date = latest_trading_day(today_cn());
    let df = ctx.source.valuation_snapshot().await?;

    let (clean, stats) = clean_keyed(df, &["code"])
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("clean: {}", e))))?;
    stats.guard_drift().map_err(SyncError::Source)?;

    let rows = frame_to_rows(&clean, trade_date)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    let written = {
        let mut conn = ctx.conn()?;
        valuation::upsert_many(&mut conn, &rows)?
    };
    tracing::info!("估值同步完成: trade_date={}, written={}", trade_date, written);

    let mut progress = JobProgress::default();
    progress.absorb_clean(&stats);
    progress.written = written as u32;
    Ok(progress)
}

fn frame_to_rows(df: &DataFrame, trade_date: NaiveDate) -> PolarsResult<Vec<NewValuation>> {
    let codes = df.column("code")?.str()?;
    let pe_ttm = df.column("pe_ttm")?.f64()?;
    let pb = df.column("pb")?.f64()?;
    let ps_ttm = df.column("ps_ttm")?.f64()?;
    let peg = df.column("peg")?.f64()?;
    let total_mv = df.column("total_mv")?.f64()?;
    let circ_mv = df.column("circ_mv")?.f64()?;
    let dividend = df.column("dividend_yield")?.f64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(code) = codes.get(i) else { continue };
        rows.push(NewValuation {
            code: code.to_string(),
            trade_date,
            pe_ttm: opt_bigdecimal(pe_ttm.get(i)),
            pb: opt_bigdecimal(pb.get(i)),
            ps_ttm: opt_bigdecimal(ps_ttm.get(i)),
            peg: opt_bigdecimal(peg.get(i)),
            total_mv: opt_bigdecimal(total_mv.get(i)),
            circ_mv: opt_bigdecimal(circ_mv.get(i)),
            dividend_yield: opt_bigdecimal(dividend.get(i)),
        });
    }
    Ok(rows)
}
