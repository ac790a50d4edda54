use diesel::prelude::*;
use diesel::upsert::excluded;

use crate::db::PgPoolConn;
use crate::models::{NewSectorQuote, Sector};
use crate::repositories::chunk::rows_per_chunk;
use crate::schema::{sector_quotes, sectors};
use crate::services::errors::RepoError;

pub fn upsert_sectors(conn: &mut PgPoolConn, rows: &[Sector]) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(3);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(sectors::table)
                .values(chunk)
                .on_conflict(sectors::sector_code)
                .do_update()
                .set((
                    sectors::name.eq(excluded(sectors::name)),
                    sectors::kind.eq(excluded(sectors::kind)),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}

pub fn upsert_sector_quotes(
    conn: &mut PgPoolConn,
    rows: &[NewSectorQuote],
) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(6);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        conn.transaction(|conn| {
            diesel::insert_into(sector_quotes::table)
                .values(chunk)
                .on_conflict((sector_quotes::sector_code, sector_quotes::trade_date))
                .do_update()
                .set((
                    sector_quotes::index_level.eq(excluded(sector_quotes::index_level)),
                    sector_quotes::change_pct.eq(excluded(sector_quotes::change_pct)),
                    sector_quotes::turnover.eq(excluded(sector_quotes::turnover)),
                    sector_quotes::leader_code.eq(excluded(sector_quotes::leader_code)),
                ))
                .execute(conn)
        })
        .map_err(|source| RepoError::Chunk { index, source })?;
        written += chunk.len();
    }
    Ok(written)
}
