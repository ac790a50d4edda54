use std::sync::Arc;

use chrono::NaiveDate;
use polars::prelude::*;

use crate::models::{NewSectorQuote, Sector};
use crate::repositories::sector;
use crate::runtime::{CancelSignal, JobProgress};
use crate::services::errors::{SourceError, SyncError};
use crate::services::source::SectorKind;
use crate::services::transform::clean_keyed;
use crate::sync::context::SyncContext;
use crate::utils::bigdecimal_parser::opt_bigdecimal;
use crate::utils::trading_day::{latest_trading_day, today_cn};

pub const TASK_NAME: &str = "sector_quotes";

/// 行业 + 概念板块层级与当日指数同步
pub async fn sync(ctx: Arc<SyncContext>, cancel: CancelSignal) -> anyhow::Result<JobProgress> {
    let trade_date = latest_trading_day(today_cn());
    let mut progress = JobProgress::default();

    for kind in [SectorKind::Industry, SectorKind::Concept] {
        cancel.checkpoint()?;
        let p = sync_kind(&ctx, kind, trade_date).await?;
        progress.merge(p);
    }
    tracing::info!(
        "板块同步完成: trade_date={}, written={}",
        trade_date,
        progress.written
    );
    Ok(progress)
}

async fn sync_kind(
    ctx: &SyncContext,
    kind: SectorKind,
    trade_date: NaiveDate,
) -> Result<JobProgress, SyncError> {
    let df = ctx.source.sector_quotes(kind).await?;
    let (clean, stats) = clean_keyed(df, &["sector_code"])
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("clean: {}", e))))?;
    stats.guard_drift()?;

    let (sectors, quotes) = frame_to_rows(&clean, trade_date)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    let written = {
        let mut conn = ctx.conn()?;
        sector::upsert_sectors(&mut conn, &sectors)?;
        sector::upsert_sector_quotes(&mut conn, &quotes)?
    };

    let mut progress = JobProgress::default();
    progress.absorb_clean(&stats);
    progress.written = written as u32;
    Ok(progress)
}

fn frame_to_rows(
    df: &DataFrame,
    trade_date: NaiveDate,
) -> PolarsResult<(Vec<Sector>, Vec<NewSectorQuote>)> {
    let codes = df.column("sector_code")?.str()?;
    let names = df.column("name")?.str()?;
    let kinds = df.column("kind")?.str()?;
    let levels = df.column("index_level")?.f64()?;
    let pcts = df.column("change_pct")?.f64()?;
    let turnovers = df.column("turnover")?.f64()?;
    let leaders = df.column("leader_code")?.str()?;

    let mut sectors = Vec::with_capacity(df.height());
    let mut quotes = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(code) = codes.get(i) else { continue };
        sectors.push(Sector {
            sector_code: code.to_string(),
            name: names.get(i).unwrap_or_default().to_string(),
            kind: kinds.get(i).unwrap_or("industry").to_string(),
        });
        quotes.push(NewSectorQuote {
            sector_code: code.to_string(),
            trade_date,
            index_level: opt_bigdecimal(levels.get(i)),
            change_pct: opt_bigdecimal(pcts.get(i)),
            turnover: opt_bigdecimal(turnovers.get(i)),
            leader_code: leaders.get(i).map(|s| s.to_string()),
        });
    }
    Ok((sectors, quotes))
}
