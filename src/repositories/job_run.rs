use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::db::PgPoolConn;
use crate::models::{JobRun, NewJobRun, UpdateJobRun};
use crate::schema::job_runs;
use crate::services::errors::RepoError;

pub fn create(conn: &mut PgPoolConn, row: &NewJobRun) -> Result<JobRun, RepoError> {
    let created = diesel::insert_into(job_runs::table)
        .values(row)
        .get_result::<JobRun>(conn)?;
    Ok(created)
}

pub fn update(
    conn: &mut PgPoolConn,
    run_id: i32,
    changes: &UpdateJobRun,
) -> Result<JobRun, RepoError> {
    let updated = diesel::update(job_runs::table.find(run_id))
        .set(changes)
        .get_result::<JobRun>(conn)?;
    Ok(updated)
}

pub fn latest_by_name(
    conn: &mut PgPoolConn,
    name: &str,
) -> Result<Option<JobRun>, RepoError> {
    let row = job_runs::table
        .filter(job_runs::job_name.eq(name))
        .order(job_runs::started_at.desc())
        .first::<JobRun>(conn)
        .optional()?;
    Ok(row)
}

/// 最近一次成功完成的时间（新闻时间窗回溯的锚点）
pub fn last_success_time(
    conn: &mut PgPoolConn,
    name: &str,
) -> Result<Option<DateTime<Utc>>, RepoError> {
    let ts = job_runs::table
        .filter(job_runs::job_name.eq(name))
        .filter(job_runs::status.eq("succeeded"))
        .select(diesel::dsl::max(job_runs::completed_at))
        .first::<Option<DateTime<Utc>>>(conn)?;
    Ok(ts)
}

pub fn recent(conn: &mut PgPoolConn, limit: i64) -> Result<Vec<JobRun>, RepoError> {
    let rows = job_runs::table
        .order(job_runs::started_at.desc())
        .limit(limit)
        .load::<JobRun>(conn)?;
    Ok(rows)
}
