use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::sync_errors;

/// 同步错误记录：失败时插入，同 (task_name, target_code) 后续成功时回填 resolved_at
#[derive(Queryable, Selectable, Debug, Clone, Serialize)]
#[diesel(table_name = sync_errors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SyncErrorRow {
    pub id: i32,
    pub task_name: String,
    pub target_code: String,
    pub error_kind: String,
    pub error_message: String,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = sync_errors)]
pub struct NewSyncError {
    pub task_name: String,
    pub target_code: String,
    pub error_kind: String,
    pub error_message: String,
    pub retry_count: i32,
}
