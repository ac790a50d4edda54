use std::sync::Arc;

use chrono::NaiveDate;
use polars::prelude::*;

use crate::models::{NewDragonTiger, NewFundFlow, NewMarginTrade, NewNorthboundFlow};
use crate::repositories::capital_flow;
use crate::runtime::{CancelSignal, JobProgress};
use crate::services::errors::{SourceError, SyncError};
use crate::services::transform::clean_keyed;
use crate::sync::context::SyncContext;
use crate::utils::bigdecimal_parser::opt_bigdecimal;
use crate::utils::trading_day::{latest_trading_day, today_cn};

pub const FUND_FLOW_TASK: &str = "fund_flow";
pub const MARGIN_TASK: &str = "margin_trade";
pub const DRAGON_TIGER_TASK: &str = "dragon_tiger";
pub const NORTHBOUND_TASK: &str = "northbound_flow";

/// 个股资金流同步 (L1)
pub async fn sync_fund_flow(
    ctx: Arc<SyncContext>,
    _cancel: CancelSignal,
) -> anyhow::Result<JobProgress> {
    let trade_date = latest_trading_day(today_cn());
    let df = ctx.source.fund_flow_daily().await?;
    let (clean, stats) = clean_keyed(df, &["code"])
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("clean: {}", e))))?;
    stats.guard_drift().map_err(SyncError::Source)?;

    let rows = fund_flow_rows(&clean, trade_date)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    let written = {
        let mut conn = ctx.conn()?;
        capital_flow::upsert_fund_flows(&mut conn, &rows)?
    };
    tracing::info!("资金流同步完成: written={}", written);

    let mut progress = JobProgress::default();
    progress.absorb_clean(&stats);
    progress.written = written as u32;
    Ok(progress)
}

/// 两融数据同步 (L1)
pub async fn sync_margin(
    ctx: Arc<SyncContext>,
    _cancel: CancelSignal,
) -> anyhow::Result<JobProgress> {
    let trade_date = latest_trading_day(today_cn());
    let df = ctx.source.margin_summary(trade_date).await?;
    let (clean, stats) = clean_keyed(df, &["code", "trade_date"])
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("clean: {}", e))))?;
    stats.guard_drift().map_err(SyncError::Source)?;

    let rows = margin_rows(&clean)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    let written = {
        let mut conn = ctx.conn()?;
        capital_flow::upsert_margin_trades(&mut conn, &rows)?
    };
    tracing::info!("两融同步完成: written={}", written);

    let mut progress = JobProgress::default();
    progress.absorb_clean(&stats);
    progress.written = written as u32;
    Ok(progress)
}

/// 龙虎榜同步 (L1)：只追加
pub async fn sync_dragon_tiger(
    ctx: Arc<SyncContext>,
    _cancel: CancelSignal,
) -> anyhow::Result<JobProgress> {
    let trade_date = latest_trading_day(today_cn());
    let df = match ctx.source.dragon_tiger(trade_date).await {
        Ok(df) => df,
        // 部分交易日无上榜记录
        Err(SyncError::Source(SourceError::Empty)) => {
            tracing::info!("当日无龙虎榜记录: trade_date={}", trade_date);
            return Ok(JobProgress::default());
        }
        Err(e) => return Err(e.into()),
    };
    let (clean, stats) = clean_keyed(df, &["code", "trade_date", "reason"])
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("clean: {}", e))))?;
    stats.guard_drift().map_err(SyncError::Source)?;

    let rows = dragon_tiger_rows(&clean)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    let written = {
        let mut conn = ctx.conn()?;
        capital_flow::insert_ignore_dragon_tiger(&mut conn, &rows)?
    };
    tracing::info!("龙虎榜同步完成: written={}", written);

    let mut progress = JobProgress::default();
    progress.absorb_clean(&stats);
    progress.written = written as u32;
    Ok(progress)
}

/// 北向资金同步 (L1)
pub async fn sync_northbound(
    ctx: Arc<SyncContext>,
    _cancel: CancelSignal,
) -> anyhow::Result<JobProgress> {
    let trade_date = latest_trading_day(today_cn());
    let df = ctx.source.northbound_flow(trade_date).await?;

    let rows = northbound_rows(&df)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    let written = {
        let mut conn = ctx.conn()?;
        capital_flow::upsert_northbound(&mut conn, &rows)?
    };

    let mut progress = JobProgress::default();
    progress.fetched = df.height() as u32;
    progress.accepted = rows.len() as u32;
    progress.written = written as u32;
    Ok(progress)
}

fn fund_flow_rows(df: &DataFrame, trade_date: NaiveDate) -> PolarsResult<Vec<NewFundFlow>> {
    let codes = df.column("code")?.str()?;
    let main_in = df.column("main_net_inflow")?.f64()?;
    let super_in = df.column("super_net_inflow")?.f64()?;
    let large_in = df.column("large_net_inflow")?.f64()?;
    let medium_in = df.column("medium_net_inflow")?.f64()?;
    let small_in = df.column("small_net_inflow")?.f64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(code) = codes.get(i) else { continue };
        rows.push(NewFundFlow {
            code: code.to_string(),
            trade_date,
            main_net_inflow: opt_bigdecimal(main_in.get(i)),
            super_net_inflow: opt_bigdecimal(super_in.get(i)),
            large_net_inflow: opt_bigdecimal(large_in.get(i)),
            medium_net_inflow: opt_bigdecimal(medium_in.get(i)),
            small_net_inflow: opt_bigdecimal(small_in.get(i)),
        });
    }
    Ok(rows)
}

fn margin_rows(df: &DataFrame) -> PolarsResult<Vec<NewMarginTrade>> {
    let codes = df.column("code")?.str()?;
    let dates = df.column("trade_date")?.date()?.as_date_iter().collect::<Vec<_>>();
    let fin_balance = df.column("financing_balance")?.f64()?;
    let fin_buy = df.column("financing_buy")?.f64()?;
    let fin_repay = df.column("financing_repay")?.f64()?;
    let sec_balance = df.column("securities_balance")?.f64()?;
    let sec_sell = df.column("securities_sell")?.f64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(code), Some(trade_date)) = (codes.get(i), dates[i]) else {
            continue;
        };
        rows.push(NewMarginTrade {
            code: code.to_string(),
            trade_date,
            financing_balance: opt_bigdecimal(fin_balance.get(i)),
            financing_buy: opt_bigdecimal(fin_buy.get(i)),
            financing_repay: opt_bigdecimal(fin_repay.get(i)),
            securities_balance: opt_bigdecimal(sec_balance.get(i)),
            securities_sell: opt_bigdecimal(sec_sell.get(i)),
        });
    }
    Ok(rows)
}

fn dragon_tiger_rows(df: &DataFrame) -> PolarsResult<Vec<NewDragonTiger>> {
    let codes = df.column("code")?.str()?;
    let dates = df.column("trade_date")?.date()?.as_date_iter().collect::<Vec<_>>();
    let reasons = df.column("reason")?.str()?;
    let net_buy = df.column("net_buy")?.f64()?;
    let buys = df.column("buy_amount")?.f64()?;
    let sells = df.column("sell_amount")?.f64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(code), Some(trade_date), Some(reason)) = (codes.get(i), dates[i], reasons.get(i))
        else {
            continue;
        };
        rows.push(NewDragonTiger {
            code: code.to_string(),
            trade_date,
            reason: reason.to_string(),
            net_buy: opt_bigdecimal(net_buy.get(i)),
            buy_amount: opt_bigdecimal(buys.get(i)),
            sell_amount: opt_bigdecimal(sells.get(i)),
        });
    }
    Ok(rows)
}

fn northbound_rows(df: &DataFrame) -> PolarsResult<Vec<NewNorthboundFlow>> {
    let dates = df.column("trade_date")?.date()?.as_date_iter().collect::<Vec<_>>();
    let sh = df.column("sh_net_inflow")?.f64()?;
    let sz = df.column("sz_net_inflow")?.f64()?;
    let total = df.column("total_net_inflow")?.f64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(trade_date) = dates[i] else { continue };
        rows.push(NewNorthboundFlow {
            trade_date,
            sh_net_inflow: opt_bigdecimal(sh.get(i)),
            sz_net_inflow: opt_bigdecimal(sz.get(i)),
            total_net_inflow: opt_bigdecimal(total.get(i)),
        });
    }
    Ok(rows)
}
