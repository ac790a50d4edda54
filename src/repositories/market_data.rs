use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;

use crate::db::PgPoolConn;
use crate::models::{DailyQuote, NewDailyQuote, NewMinuteQuote};
use crate::repositories::chunk::rows_per_chunk;
use crate::schema::{daily_quotes, minute_quotes};
use crate::services::errors::RepoError;

/// 按 (code, trade_date) 幂等批量写入日线；分块提交，
/// 失败块携带块序号向上抛出，之前已提交的块保持不回滚
pub fn upsert_daily(conn: &mut PgPoolConn, rows: &[NewDailyQuote]) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(11);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(daily_quotes::table)
                .values(chunk)
                .on_conflict((daily_quotes::code, daily_quotes::trade_date))
                .do_update()
                .set((
                    daily_quotes::open.eq(excluded(daily_quotes::open)),
                    daily_quotes::high.eq(excluded(daily_quotes::high)),
                    daily_quotes::low.eq(excluded(daily_quotes::low)),
                    daily_quotes::close.eq(excluded(daily_quotes::close)),
                    daily_quotes::volume.eq(excluded(daily_quotes::volume)),
                    daily_quotes::amount.eq(excluded(daily_quotes::amount)),
                    daily_quotes::change.eq(excluded(daily_quotes::change)),
                    daily_quotes::change_pct.eq(excluded(daily_quotes::change_pct)),
                    daily_quotes::turnover_rate.eq(excluded(daily_quotes::turnover_rate)),
                    daily_quotes::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}

pub fn upsert_minute(conn: &mut PgPoolConn, rows: &[NewMinuteQuote]) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(7);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(minute_quotes::table)
                .values(chunk)
                .on_conflict((minute_quotes::code, minute_quotes::timestamp))
                .do_update()
                .set((
                    minute_quotes::open.eq(excluded(minute_quotes::open)),
                    minute_quotes::high.eq(excluded(minute_quotes::high)),
                    minute_quotes::low.eq(excluded(minute_quotes::low)),
                    minute_quotes::close.eq(excluded(minute_quotes::close)),
                    minute_quotes::volume.eq(excluded(minute_quotes::volume)),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}

pub fn latest_trade_date(
    conn: &mut PgPoolConn,
    target: &str,
) -> Result<Option<NaiveDate>, RepoError> {
    let date = daily_quotes::table
        .filter(daily_quotes::code.eq(target))
        .select(diesel::dsl::max(daily_quotes::trade_date))
        .first::<Option<NaiveDate>>(conn)?;
    Ok(date)
}

pub fn max_trade_date(conn: &mut PgPoolConn) -> Result<Option<NaiveDate>, RepoError> {
    let date = daily_quotes::table
        .select(diesel::dsl::max(daily_quotes::trade_date))
        .first::<Option<NaiveDate>>(conn)?;
    Ok(date)
}

/// 时间范围查询始终限定 trade_date，命中分区裁剪
pub fn bars_between(
    conn: &mut PgPoolConn,
    target: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DailyQuote>, RepoError> {
    let rows = daily_quotes::table
        .filter(daily_quotes::code.eq(target))
        .filter(daily_quotes::trade_date.ge(start))
        .filter(daily_quotes::trade_date.le(end))
        .order(daily_quotes::trade_date.asc())
        .load::<DailyQuote>(conn)?;
    Ok(rows)
}

/// 指定交易日已有日线的代码集合（数据医生覆盖率用）
pub fn codes_with_bar_on(
    conn: &mut PgPoolConn,
    date: NaiveDate,
) -> Result<Vec<String>, RepoError> {
    let codes = daily_quotes::table
        .filter(daily_quotes::trade_date.eq(date))
        .select(daily_quotes::code)
        .distinct()
        .load::<String>(conn)?;
    Ok(codes)
}

/// 最近 since 起违反不变量的行数（close/volume 非正）
pub fn quality_violations_since(
    conn: &mut PgPoolConn,
    since: NaiveDate,
) -> Result<i64, RepoError> {
    use bigdecimal::BigDecimal;
    let zero = BigDecimal::from(0);
    let count = daily_quotes::table
        .filter(daily_quotes::trade_date.ge(since))
        .filter(
            daily_quotes::close
                .le(Some(zero))
                .or(daily_quotes::volume.le(Some(0i64))),
        )
        .count()
        .get_result::<i64>(conn)?;
    Ok(count)
}

/// 日线在 ts 之后被改写过的交易日（指标重算 changed 策略）
pub fn dates_updated_since(
    conn: &mut PgPoolConn,
    target: &str,
    ts: DateTime<Utc>,
) -> Result<Vec<NaiveDate>, RepoError> {
    let dates = daily_quotes::table
        .filter(daily_quotes::code.eq(target))
        .filter(daily_quotes::updated_at.gt(ts))
        .select(daily_quotes::trade_date)
        .order(daily_quotes::trade_date.asc())
        .load::<NaiveDate>(conn)?;
    Ok(dates)
}

/// after 之后（不含）的全部交易日
pub fn dates_after(
    conn: &mut PgPoolConn,
    target: &str,
    after: NaiveDate,
) -> Result<Vec<NaiveDate>, RepoError> {
    let dates = daily_quotes::table
        .filter(daily_quotes::code.eq(target))
        .filter(daily_quotes::trade_date.gt(after))
        .select(daily_quotes::trade_date)
        .order(daily_quotes::trade_date.asc())
        .load::<NaiveDate>(conn)?;
    Ok(dates)
}
