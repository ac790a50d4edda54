use diesel::prelude::*;
use diesel::upsert::excluded;

use crate::db::PgPoolConn;
use crate::models::{NewLimitUpStock, NewMarketSentiment};
use crate::repositories::chunk::rows_per_chunk;
use crate::schema::{limit_up_stocks, market_sentiments};
use crate::services::errors::RepoError;

pub fn upsert_sentiment(
    conn: &mut PgPoolConn,
    rows: &[NewMarketSentiment],
) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(8);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(market_sentiments::table)
                .values(chunk)
                .on_conflict(market_sentiments::trade_date)
                .do_update()
                .set((
                    market_sentiments::up_count.eq(excluded(market_sentiments::up_count)),
                    market_sentiments::down_count.eq(excluded(market_sentiments::down_count)),
                    market_sentiments::flat_count.eq(excluded(market_sentiments::flat_count)),
                    market_sentiments::limit_up_count
                        .eq(excluded(market_sentiments::limit_up_count)),
                    market_sentiments::limit_down_count
                        .eq(excluded(market_sentiments::limit_down_count)),
                    market_sentiments::broken_board_rate
                        .eq(excluded(market_sentiments::broken_board_rate)),
                    market_sentiments::total_turnover
                        .eq(excluded(market_sentiments::total_turnover)),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}

pub fn upsert_limit_up(
    conn: &mut PgPoolConn,
    rows: &[NewLimitUpStock],
) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(7);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(limit_up_stocks::table)
                .values(chunk)
                .on_conflict((limit_up_stocks::code, limit_up_stocks::trade_date))
                .do_update()
                .set((
                    limit_up_stocks::reason.eq(excluded(limit_up_stocks::reason)),
                    limit_up_stocks::streak_days.eq(excluded(limit_up_stocks::streak_days)),
                    limit_up_stocks::seal_amount.eq(excluded(limit_up_stocks::seal_amount)),
                    limit_up_stocks::first_seal_time
                        .eq(excluded(limit_up_stocks::first_seal_time)),
                    limit_up_stocks::last_seal_time.eq(excluded(limit_up_stocks::last_seal_time)),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}
