use diesel::prelude::*;
use diesel::upsert::excluded;

use crate::db::PgPoolConn;
use crate::models::{NewDragonTiger, NewFundFlow, NewMarginTrade, NewNorthboundFlow};
use crate::repositories::chunk::rows_per_chunk;
use crate::schema::{dragon_tiger, fund_flows, margin_trades, northbound_flows};
use crate::services::errors::RepoError;

pub fn upsert_fund_flows(conn: &mut PgPoolConn, rows: &[NewFundFlow]) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(7);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(fund_flows::table)
                .values(chunk)
                .on_conflict((fund_flows::code, fund_flows::trade_date))
                .do_update()
                .set((
                    fund_flows::main_net_inflow.eq(excluded(fund_flows::main_net_inflow)),
                    fund_flows::super_net_inflow.eq(excluded(fund_flows::super_net_inflow)),
                    fund_flows::large_net_inflow.eq(excluded(fund_flows::large_net_inflow)),
                    fund_flows::medium_net_inflow.eq(excluded(fund_flows::medium_net_inflow)),
                    fund_flows::small_net_inflow.eq(excluded(fund_flows::small_net_inflow)),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}

pub fn upsert_margin_trades(
    conn: &mut PgPoolConn,
    rows: &[NewMarginTrade],
) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(7);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(margin_trades::table)
                .values(chunk)
                .on_conflict((margin_trades::code, margin_trades::trade_date))
                .do_update()
                .set((
                    margin_trades::financing_balance
                        .eq(excluded(margin_trades::financing_balance)),
                    margin_trades::financing_buy.eq(excluded(margin_trades::financing_buy)),
                    margin_trades::financing_repay.eq(excluded(margin_trades::financing_repay)),
                    margin_trades::securities_balance
                        .eq(excluded(margin_trades::securities_balance)),
                    margin_trades::securities_sell.eq(excluded(margin_trades::securities_sell)),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}

/// 龙虎榜只追加，重复 (code, trade_date, reason) 忽略
pub fn insert_ignore_dragon_tiger(
    conn: &mut PgPoolConn,
    rows: &[NewDragonTiger],
) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(6);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        let inserted = conn
            .transaction(|conn| {
                diesel::insert_into(dragon_tiger::table)
                    .values(chunk)
                    .on_conflict_do_nothing()
                    .execute(conn)
            })
            .map_err(|source| RepoError::Chunk { index, source })?;
        written += inserted;
    }
    Ok(written)
}

pub fn upsert_northbound(
    conn: &mut PgPoolConn,
    rows: &[NewNorthboundFlow],
) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(4);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(northbound_flows::table)
                .values(chunk)
                .on_conflict(northbound_flows::trade_date)
                .do_update()
                .set((
                    northbound_flows::sh_net_inflow.eq(excluded(northbound_flows::sh_net_inflow)),
                    northbound_flows::sz_net_inflow.eq(excluded(northbound_flows::sz_net_inflow)),
                    northbound_flows::total_net_inflow
                        .eq(excluded(northbound_flows::total_net_inflow)),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}
