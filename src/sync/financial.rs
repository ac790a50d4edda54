use std::sync::Arc;

use polars::prelude::*;

use crate::models::NewFinancial;
use crate::repositories::{financial, stock};
use crate::runtime::{CancelSignal, JobProgress};
use crate::services::errors::{SourceError, SyncError};
use crate::services::transform::clean_keyed;
use crate::sync::context::SyncContext;
use crate::sync::scope::shard_codes;
use crate::utils::bigdecimal_parser::opt_bigdecimal;

pub const TASK_NAME: &str = "financial_statements";

/// 财务报表全量重扫（SPECIAL，每周一次）。
/// (code, end_date) 幂等去重，pub_date 早于 end_date 的行剔除
pub async fn sync_all(ctx: Arc<SyncContext>, cancel: CancelSignal) -> anyhow::Result<JobProgress> {
    let codes = {
        let mut conn = ctx.conn()?;
        stock::active_codes(&mut conn, Some("stock"))?
    };
    tracing::info!("开始财务报表全量重扫: total={}", codes.len());

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
    tracing::info!(
        "财务报表重扫完成: written={}, errors={}",
        progress.written,
        progress.errors
    );
    Ok(progress)
}

async fn sync_single(ctx: &SyncContext, code: &str) -> Result<JobProgress, SyncError> {
    let df = match ctx.source.financial_summary(code).await {
        Ok(df) => df,
        Err(SyncError::Source(SourceError::Empty)) => return Ok(JobProgress::default()),
        Err(e) => return Err(e),
    };

    let (clean, stats) = clean_keyed(df, &["code", "end_date"])
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("clean: {}", e))))?;
    stats.guard_drift()?;

    let rows = frame_to_rows(&clean)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    let written = {
        let mut conn = ctx.conn()?;
        financial::upsert_many(&mut conn, &rows)?
    };

    let mut progress = JobProgress::default();
    progress.absorb_clean(&stats);
    progress.written = written as u32;
    Ok(progress)
}

fn frame_to_rows(df: &DataFrame) -> PolarsResult<Vec<NewFinancial>> {
    let codes = df.column("code")?.str()?;
    let end_dates = df.column("end_date")?.date()?.as_date_iter().collect::<Vec<_>>();
    let pub_dates = df.column("pub_date")?.date()?.as_date_iter().collect::<Vec<_>>();
    let types = df.column("report_type")?.str()?;
    let revenues = df.column("revenue")?.f64()?;
    let profits = df.column("net_profit")?.f64()?;
    let eps = df.column("eps")?.f64()?;
    let roes = df.column("roe")?.f64()?;
    let debts = df.column("debt_ratio")?.f64()?;
    let margins = df.column("gross_margin")?.f64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(code), Some(end_date)) = (codes.get(i), end_dates[i]) else {
            continue;
        };
        let pub_date = pub_dates[i];
        // 发布日早于报告期是坏数据
        if let Some(published) = pub_date {
            if published < end_date {
                continue;
            }
        }
        rows.push(NewFinancial {
            code: code.to_string(),
            end_date,
            pub_date,
            report_type: types.get(i).map(|s| s.to_string()),
            revenue: opt_bigdecimal(revenues.get(i)),
            net_profit: opt_bigdecimal(profits.get(i)),
            eps: opt_bigdecimal(eps.get(i)),
            roe: opt_bigdecimal(roes.get(i)),
            debt_ratio: opt_bigdecimal(debts.get(i)),
            gross_margin: opt_bigdecimal(margins.get(i)),
        });
    }
    Ok(rows)
}
