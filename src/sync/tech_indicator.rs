use std::collections::BTreeSet;
use std::sync::Arc;

use bigdecimal::ToPrimitive;
use chrono::{Days, NaiveDate};
use polars::prelude::*;

use crate::models::{DailyQuote, NewTechIndicator};
use crate::repositories::{market_data, stock, tech_indicator};
use crate::runtime::{CancelSignal, JobProgress};
use crate::services::errors::{SourceError, SyncError};
use crate::services::indicators::{self, MAX_LOOKBACK};
use crate::sync::context::SyncContext;
use crate::sync::scope::shard_codes;
use crate::utils::bigdecimal_parser::opt_bigdecimal;
use crate::utils::config::RecomputePolicy;

pub const TASK_NAME: &str = "tech_indicators";

/// 回看窗口折算的日历天数，覆盖 60 根交易日K线
const LOOKBACK_CALENDAR_DAYS: u64 = (MAX_LOOKBACK as u64) * 2;

/// 技术指标计算 (L1)：派生数据，只读日线、写指标。
/// 调度上排在 daily_quotes 之后的同一波次
pub async fn sync_all(ctx: Arc<SyncContext>, cancel: CancelSignal) -> anyhow::Result<JobProgress> {
    let codes = {
        let mut conn = ctx.conn()?;
        stock::active_codes(&mut conn, Some("stock"))?
    };
    tracing::info!("开始计算技术指标: total={}", codes.len());

    let mut progress = JobProgress::default();
    for shard in shard_codes(&codes, ctx.sync_cfg.batch_size) {
        cancel.checkpoint()?;
        for code in &shard {
            match compute_single(&ctx, code).await {
                Ok(p) => {
                    progress.merge(p);
                    ctx.errors.record_success(TASK_NAME, code);
                }
                Err(SyncError::Cancelled) => return Err(SyncError::Cancelled.into()),
                Err(e) => {
                    progress.errors += 1;
                    ctx.errors
                        .record_failure(TASK_NAME, code, e.kind(), &e.to_string());
                }
            }
        }
    }
    tracing::info!(
        "技术指标计算完成: written={}, errors={}",
        progress.written,
        progress.errors
    );
    Ok(progress)
}

/// 单标的指标计算
///
/// 目标日 = 指标尚未覆盖的新交易日，changed 策略下再并入
/// 上次指标写入之后日线被改写过的历史日
async fn compute_single(ctx: &SyncContext, code: &str) -> Result<JobProgress, SyncError> {
    let (targets, bars) = {
        let mut conn = ctx.conn()?;
        let last_covered = tech_indicator::max_indicator_date(&mut conn, code)?;
        // 全量冷启动的下界；早于 A 股市场任何真实交易日
        let after =
            last_covered.unwrap_or_else(|| NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default());
        let mut targets: BTreeSet<NaiveDate> =
            market_data::dates_after(&mut conn, code, after)?.into_iter().collect();
        if ctx.sync_cfg.indicator_recompute == RecomputePolicy::Changed {
            if let Some(computed_at) = tech_indicator::last_computed_at(&mut conn, code)? {
                targets.extend(market_data::dates_updated_since(&mut conn, code, computed_at)?);
            }
        }
        let (Some(&earliest), Some(&latest)) = (targets.iter().next(), targets.iter().next_back())
        else {
            return Ok(JobProgress::default());
        };
        let lookback_start = earliest - Days::new(LOOKBACK_CALENDAR_DAYS);
        let bars = market_data::bars_between(&mut conn, code, lookback_start, latest)?;
        (targets, bars)
    };

    if bars.len() < 2 {
        tracing::debug!("日线不足，跳过指标计算: code={}", code);
        return Ok(JobProgress::default());
    }

    let df = bars_to_frame(&bars)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("frame: {}", e))))?;
    let computed = indicators::calculate_all(df)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("indicators: {}", e))))?;
    let rows = frame_to_rows(&computed, code, &targets)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;

    let written = {
        let mut conn = ctx.conn()?;
        tech_indicator::upsert_many(&mut conn, &rows)?
    };

    Ok(JobProgress {
        fetched: bars.len() as u32,
        accepted: rows.len() as u32,
        written: written as u32,
        errors: 0,
    })
}

/// 库内日线转计算帧
fn bars_to_frame(bars: &[DailyQuote]) -> PolarsResult<DataFrame> {
    let dates: Vec<NaiveDate> = bars.iter().map(|b| b.trade_date).collect();
    let to_f64 = |v: &Option<bigdecimal::BigDecimal>| v.as_ref().and_then(|d| d.to_f64());
    let open: Vec<Option<f64>> = bars.iter().map(|b| to_f64(&b.open)).collect();
    let high: Vec<Option<f64>> = bars.iter().map(|b| to_f64(&b.high)).collect();
    let low: Vec<Option<f64>> = bars.iter().map(|b| to_f64(&b.low)).collect();
    let close: Vec<Option<f64>> = bars.iter().map(|b| to_f64(&b.close)).collect();
    let volume: Vec<Option<i64>> = bars.iter().map(|b| b.volume).collect();
    DataFrame::new(vec![
        Series::new("trade_date", dates),
        Series::new("open", open),
        Series::new("high", high),
        Series::new("low", low),
        Series::new("close", close),
        Series::new("volume", volume),
    ])
}

/// 只保留目标日的行，回看窗口的前置行仅用于计算
fn frame_to_rows(
    df: &DataFrame,
    code: &str,
    targets: &BTreeSet<NaiveDate>,
) -> PolarsResult<Vec<NewTechIndicator>> {
    let dates = df.column("trade_date")?.date()?.as_date_iter().collect::<Vec<_>>();
    let f64_col = |name: &str| df.column(name).and_then(|c| c.f64().map(|ca| ca.clone()));
    let ma5 = f64_col("ma5")?;
    let ma10 = f64_col("ma10")?;
    let ma20 = f64_col("ma20")?;
    let ma60 = f64_col("ma60")?;
    let macd_dif = f64_col("macd_dif")?;
    let macd_dea = f64_col("macd_dea")?;
    let macd_bar = f64_col("macd_bar")?;
    let rsi = f64_col("rsi_14")?;
    let kdj_k = f64_col("kdj_k")?;
    let kdj_d = f64_col("kdj_d")?;
    let kdj_j = f64_col("kdj_j")?;
    let boll_upper = f64_col("boll_upper")?;
    let boll_middle = f64_col("boll_middle")?;
    let boll_lower = f64_col("boll_lower")?;
    let cci = f64_col("cci")?;
    let atr = f64_col("atr")?;
    let obv = df.column("obv")?.i64()?;

    let mut rows = Vec::with_capacity(targets.len());
    for i in 0..df.height() {
        let Some(trade_date) = dates[i] else { continue };
        if !targets.contains(&trade_date) {
            continue;
        }
        rows.push(NewTechIndicator {
            code: code.to_string(),
            trade_date,
            ma5: opt_bigdecimal(ma5.get(i)),
            ma10: opt_bigdecimal(ma10.get(i)),
            ma20: opt_bigdecimal(ma20.get(i)),
            ma60: opt_bigdecimal(ma60.get(i)),
            macd_dif: opt_bigdecimal(macd_dif.get(i)),
            macd_dea: opt_bigdecimal(macd_dea.get(i)),
            macd_bar: opt_bigdecimal(macd_bar.get(i)),
            rsi_14: opt_bigdecimal(rsi.get(i)),
            kdj_k: opt_bigdecimal(kdj_k.get(i)),
            kdj_d: opt_bigdecimal(kdj_d.get(i)),
            kdj_j: opt_bigdecimal(kdj_j.get(i)),
            boll_upper: opt_bigdecimal(boll_upper.get(i)),
            boll_middle: opt_bigdecimal(boll_middle.get(i)),
            boll_lower: opt_bigdecimal(boll_lower.get(i)),
            cci: opt_bigdecimal(cci.get(i)),
            atr: opt_bigdecimal(atr.get(i)),
            obv: obv.get(i),
        });
    }
    Ok(rows)
}
