use std::sync::Arc;

use polars::prelude::*;

use crate::models::NewStock;
use crate::repositories::stock;
use crate::runtime::{CancelSignal, JobProgress};
use crate::services::errors::{SourceError, SyncError};
use crate::services::transform::clean_keyed;
use crate::sync::context::SyncContext;

pub const TASK_NAME: &str = "symbol_list";

/// 股票/ETF 列表同步 (L1)：发现新标的，
/// 上游名单里消失的做软下线，从不物理删除
pub async fn sync(ctx: Arc<SyncContext>, _cancel: CancelSignal) -> anyhow::Result<JobProgress> {
    tracing::info!("开始同步标的列表");
    let df = ctx.source.symbol_list().await?;

    let (clean, stats) = clean_keyed(df, &["code"])
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("clean: {}", e))))?;
    stats.guard_drift().map_err(SyncError::Source)?;

    let rows = frame_to_rows(&clean)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    let present: Vec<String> = rows.iter().map(|r| r.code.clone()).collect();

    let (written, deactivated) = {
        let mut conn = ctx.conn()?;
        let written = stock::upsert_many(&mut conn, &rows)?;
        let deactivated = stock::deactivate_missing(&mut conn, &present)?;
        (written, deactivated)
    };
    if deactivated > 0 {
        tracing::warn!("软下线标的: count={}", deactivated);
    }
    tracing::info!("标的列表同步完成: total={}, deactivated={}", written, deactivated);

    let mut progress = JobProgress::default();
    progress.absorb_clean(&stats);
    progress.written = written as u32;
    Ok(progress)
}

fn frame_to_rows(df: &DataFrame) -> PolarsResult<Vec<NewStock>> {
    let codes = df.column("code")?.str()?;
    let names = df.column("name")?.str()?;
    let markets = df.column("market")?.str()?;
    let asset_types = df.column("asset_type")?.str()?;
    let industries = df.column("industry")?.str()?;
    let list_dates = df
        .column("list_date")?
        .date()?
        .as_date_iter()
        .collect::<Vec<_>>();

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(code) = codes.get(i) else { continue };
        rows.push(NewStock {
            code: code.to_string(),
            name: names.get(i).unwrap_or_default().to_string(),
            market: markets.get(i).unwrap_or("SZ").to_string(),
            asset_type: asset_types.get(i).unwrap_or("stock").to_string(),
            industry: industries.get(i).map(|s| s.to_string()),
            list_date: list_dates[i],
            is_active: true,
        });
    }
    Ok(rows)
}
