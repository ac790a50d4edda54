use diesel::prelude::*;

use crate::db::PgPoolConn;
use crate::models::{NewSyncError, SyncErrorRow};
use crate::schema::sync_errors;
use crate::services::errors::{RepoError, SyncErrorKind};

/// 重试预算耗尽即进入隔离区，不再自动重试
pub const QUARANTINE_RETRY_COUNT: i32 = 3;

/// 失败登记：同 (task_name, target_code) 已有未解决记录则累加
/// retry_count 并刷新错误内容，否则新建
pub fn create_or_increment(
    conn: &mut PgPoolConn,
    task: &str,
    target: &str,
    kind: SyncErrorKind,
    message: &str,
) -> Result<SyncErrorRow, RepoError> {
    let existing = sync_errors::table
        .filter(sync_errors::task_name.eq(task))
        .filter(sync_errors::target_code.eq(target))
        .filter(sync_errors::resolved_at.is_null())
        .first::<SyncErrorRow>(conn)
        .optional()?;

    if let Some(row) = existing {
        let updated = diesel::update(sync_errors::table.find(row.id))
            .set((
                sync_errors::retry_count.eq(sync_errors::retry_count + 1),
                sync_errors::last_retry_at.eq(diesel::dsl::now),
                sync_errors::error_kind.eq(kind.as_str()),
                sync_errors::error_message.eq(message),
            ))
            .get_result::<SyncErrorRow>(conn)?;
        return Ok(updated);
    }

    let inserted = diesel::insert_into(sync_errors::table)
        .values(&NewSyncError {
            task_name: task.to_string(),
            target_code: target.to_string(),
            error_kind: kind.as_str().to_string(),
            error_message: message.to_string(),
            retry_count: 0,
        })
        .get_result::<SyncErrorRow>(conn)?;
    Ok(inserted)
}

/// 同 key 后续成功：回填 resolved_at，返回关闭的行数
pub fn mark_resolved(
    conn: &mut PgPoolConn,
    task: &str,
    target: &str,
) -> Result<usize, RepoError> {
    let resolved = diesel::update(
        sync_errors::table
            .filter(sync_errors::task_name.eq(task))
            .filter(sync_errors::target_code.eq(target))
            .filter(sync_errors::resolved_at.is_null()),
    )
    .set(sync_errors::resolved_at.eq(diesel::dsl::now))
    .execute(conn)?;
    Ok(resolved)
}

pub fn unresolved(
    conn: &mut PgPoolConn,
    task: Option<&str>,
) -> Result<Vec<SyncErrorRow>, RepoError> {
    let mut query = sync_errors::table
        .filter(sync_errors::resolved_at.is_null())
        .order(sync_errors::created_at.desc())
        .into_boxed();
    if let Some(t) = task {
        query = query.filter(sync_errors::task_name.eq(t.to_string()));
    }
    let rows = query.load::<SyncErrorRow>(conn)?;
    Ok(rows)
}

/// 可自动重试的未解决错误（隔离区除外）
pub fn retry_candidates(
    conn: &mut PgPoolConn,
    task: &str,
) -> Result<Vec<SyncErrorRow>, RepoError> {
    let rows = sync_errors::table
        .filter(sync_errors::task_name.eq(task))
        .filter(sync_errors::resolved_at.is_null())
        .filter(sync_errors::retry_count.lt(QUARANTINE_RETRY_COUNT))
        .order(sync_errors::created_at.asc())
        .load::<SyncErrorRow>(conn)?;
    Ok(rows)
}

pub fn latest_for_task(
    conn: &mut PgPoolConn,
    task: &str,
) -> Result<Option<SyncErrorRow>, RepoError> {
    let row = sync_errors::table
        .filter(sync_errors::task_name.eq(task))
        .order(sync_errors::created_at.desc())
        .first::<SyncErrorRow>(conn)
        .optional()?;
    Ok(row)
}
