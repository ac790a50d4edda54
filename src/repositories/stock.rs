use diesel::prelude::*;
use diesel::upsert::excluded;

use crate::db::PgPoolConn;
use crate::models::{NewStock, NewWatchlistEntry, Stock, WatchlistEntry};
use crate::repositories::chunk::rows_per_chunk;
use crate::schema::{stocks, watchlist};
use crate::services::errors::RepoError;

pub fn upsert_many(conn: &mut PgPoolConn, rows: &[NewStock]) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(7);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(stocks::table)
                .values(chunk)
                .on_conflict(stocks::code)
                .do_update()
                .set((
                    stocks::name.eq(excluded(stocks::name)),
                    stocks::market.eq(excluded(stocks::market)),
                    stocks::asset_type.eq(excluded(stocks::asset_type)),
                    stocks::industry.eq(excluded(stocks::industry)),
                    stocks::list_date.eq(excluded(stocks::list_date)),
                    stocks::is_active.eq(excluded(stocks::is_active)),
                    stocks::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}

/// 上游名单里消失的代码做软下线，从不物理删除
pub fn deactivate_missing(
    conn: &mut PgPoolConn,
    present_codes: &[String],
) -> Result<usize, RepoError> {
    let updated = diesel::update(
        stocks::table
            .filter(stocks::is_active.eq(true))
            .filter(stocks::code.ne_all(present_codes)),
    )
    .set((
        stocks::is_active.eq(false),
        stocks::updated_at.eq(diesel::dsl::now),
    ))
    .execute(conn)?;
    Ok(updated)
}

pub fn find_by_code(conn: &mut PgPoolConn, target: &str) -> Result<Option<Stock>, RepoError> {
    let row = stocks::table
        .find(target)
        .first::<Stock>(conn)
        .optional()?;
    Ok(row)
}

/// 活跃标的代码；asset_type 为 None 时返回全部
pub fn active_codes(
    conn: &mut PgPoolConn,
    asset_type: Option<&str>,
) -> Result<Vec<String>, RepoError> {
    let mut query = stocks::table
        .filter(stocks::is_active.eq(true))
        .select(stocks::code)
        .order(stocks::code.asc())
        .into_boxed();
    if let Some(t) = asset_type {
        query = query.filter(stocks::asset_type.eq(t.to_string()));
    }
    let codes = query.load::<String>(conn)?;
    Ok(codes)
}

/// 活跃且行业字段非空的数量（元数据完整性巡检）
pub fn active_with_industry_count(conn: &mut PgPoolConn) -> Result<(i64, i64), RepoError> {
    let total = stocks::table
        .filter(stocks::is_active.eq(true))
        .count()
        .get_result::<i64>(conn)?;
    let with_industry = stocks::table
        .filter(stocks::is_active.eq(true))
        .filter(stocks::industry.is_not_null())
        .count()
        .get_result::<i64>(conn)?;
    Ok((with_industry, total))
}

pub fn watchlist_codes(conn: &mut PgPoolConn) -> Result<Vec<String>, RepoError> {
    let codes = watchlist::table
        .order(watchlist::sort_order.asc())
        .select(watchlist::code)
        .load::<String>(conn)?;
    Ok(codes)
}

pub fn list_watchlist(conn: &mut PgPoolConn) -> Result<Vec<WatchlistEntry>, RepoError> {
    let rows = watchlist::table
        .order(watchlist::sort_order.asc())
        .load::<WatchlistEntry>(conn)?;
    Ok(rows)
}

pub fn add_to_watchlist(
    conn: &mut PgPoolConn,
    entry: &NewWatchlistEntry,
) -> Result<usize, RepoError> {
    let inserted = diesel::insert_into(watchlist::table)
        .values(entry)
        .on_conflict(watchlist::code)
        .do_nothing()
        .execute(conn)?;
    Ok(inserted)
}
