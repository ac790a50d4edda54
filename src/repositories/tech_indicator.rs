use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;

use crate::db::PgPoolConn;
use crate::models::NewTechIndicator;
use crate::repositories::chunk::rows_per_chunk;
use crate::schema::tech_indicators;
use crate::services::errors::RepoError;

/// 19 列宽表，分块比默认更小
pub fn upsert_many(conn: &mut PgPoolConn, rows: &[NewTechIndicator]) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(19);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(tech_indicators::table)
                .values(chunk)
                .on_conflict((tech_indicators::code, tech_indicators::trade_date))
                .do_update()
                .set((
                    tech_indicators::ma5.eq(excluded(tech_indicators::ma5)),
                    tech_indicators::ma10.eq(excluded(tech_indicators::ma10)),
                    tech_indicators::ma20.eq(excluded(tech_indicators::ma20)),
                    tech_indicators::ma60.eq(excluded(tech_indicators::ma60)),
                    tech_indicators::macd_dif.eq(excluded(tech_indicators::macd_dif)),
                    tech_indicators::macd_dea.eq(excluded(tech_indicators::macd_dea)),
                    tech_indicators::macd_bar.eq(excluded(tech_indicators::macd_bar)),
                    tech_indicators::rsi_14.eq(excluded(tech_indicators::rsi_14)),
                    tech_indicators::kdj_k.eq(excluded(tech_indicators::kdj_k)),
                    tech_indicators::kdj_d.eq(excluded(tech_indicators::kdj_d)),
                    tech_indicators::kdj_j.eq(excluded(tech_indicators::kdj_j)),
                    tech_indicators::boll_upper.eq(excluded(tech_indicators::boll_upper)),
                    tech_indicators::boll_middle.eq(excluded(tech_indicators::boll_middle)),
                    tech_indicators::boll_lower.eq(excluded(tech_indicators::boll_lower)),
                    tech_indicators::cci.eq(excluded(tech_indicators::cci)),
                    tech_indicators::atr.eq(excluded(tech_indicators::atr)),
                    tech_indicators::obv.eq(excluded(tech_indicators::obv)),
                    tech_indicators::computed_at.eq(diesel::dsl::now),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}

pub fn max_indicator_date(
    conn: &mut PgPoolConn,
    target: &str,
) -> Result<Option<NaiveDate>, RepoError> {
    let date = tech_indicators::table
        .filter(tech_indicators::code.eq(target))
        .select(diesel::dsl::max(tech_indicators::trade_date))
        .first::<Option<NaiveDate>>(conn)?;
    Ok(date)
}

pub fn last_computed_at(
    conn: &mut PgPoolConn,
    target: &str,
) -> Result<Option<DateTime<Utc>>, RepoError> {
    let ts = tech_indicators::table
        .filter(tech_indicators::code.eq(target))
        .select(diesel::dsl::max(tech_indicators::computed_at))
        .first::<Option<DateTime<Utc>>>(conn)?;
    Ok(ts)
}
