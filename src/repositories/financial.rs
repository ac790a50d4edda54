use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::upsert::excluded;

use crate::db::PgPoolConn;
use crate::models::{Financial, NewFinancial};
use crate::repositories::chunk::rows_per_chunk;
use crate::schema::financials;
use crate::services::errors::RepoError;

pub fn upsert_many(conn: &mut PgPoolConn, rows: &[NewFinancial]) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(10);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(financials::table)
                .values(chunk)
                .on_conflict((financials::code, financials::end_date))
                .do_update()
                .set((
                    financials::pub_date.eq(excluded(financials::pub_date)),
                    financials::report_type.eq(excluded(financials::report_type)),
                    financials::revenue.eq(excluded(financials::revenue)),
                    financials::net_profit.eq(excluded(financials::net_profit)),
                    financials::eps.eq(excluded(financials::eps)),
                    financials::roe.eq(excluded(financials::roe)),
                    financials::debt_ratio.eq(excluded(financials::debt_ratio)),
                    financials::gross_margin.eq(excluded(financials::gross_margin)),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}

pub fn latest_end_date(
    conn: &mut PgPoolConn,
    target: &str,
) -> Result<Option<NaiveDate>, RepoError> {
    let date = financials::table
        .filter(financials::code.eq(target))
        .select(diesel::dsl::max(financials::end_date))
        .first::<Option<NaiveDate>>(conn)?;
    Ok(date)
}

pub fn reports_for(conn: &mut PgPoolConn, target: &str) -> Result<Vec<Financial>, RepoError> {
    let rows = financials::table
        .filter(financials::code.eq(target))
        .order(financials::end_date.desc())
        .load::<Financial>(conn)?;
    Ok(rows)
}
