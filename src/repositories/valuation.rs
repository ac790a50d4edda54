use diesel::prelude::*;
use diesel::upsert::excluded;

use crate::db::PgPoolConn;
use crate::models::NewValuation;
use crate::repositories::chunk::rows_per_chunk;
use crate::schema::valuations;
use crate::services::errors::RepoError;

pub fn upsert_many(conn: &mut PgPoolConn, rows: &[NewValuation]) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(9);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(valuations::table)
                .values(chunk)
                .on_conflict((valuations::code, valuations::trade_date))
                .do_update()
                .set((
                    valuations::pe_ttm.eq(excluded(valuations::pe_ttm)),
                    valuations::pb.eq(excluded(valuations::pb)),
                    valuations::ps_ttm.eq(excluded(valuations::ps_ttm)),
                    valuations::peg.eq(excluded(valuations::peg)),
                    valuations::total_mv.eq(excluded(valuations::total_mv)),
                    valuations::circ_mv.eq(excluded(valuations::circ_mv)),
                    valuations::dividend_yield.eq(excluded(valuations::dividend_yield)),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}
