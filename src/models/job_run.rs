use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::job_runs;

#[derive(Queryable, Selectable, Debug, Clone, Serialize)]
#[diesel(table_name = job_runs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct JobRun {
    pub id: i32,
    pub job_name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub fetched: i32,
    pub accepted: i32,
    pub written: i32,
    pub errors: i32,
    pub details: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = job_runs)]
pub struct NewJobRun {
    pub job_name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
}

#[derive(AsChangeset, Debug, Default, Clone)]
#[diesel(table_name = job_runs)]
pub struct UpdateJobRun {
    pub status: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub fetched: Option<i32>,
    pub accepted: Option<i32>,
    pub written: Option<i32>,
    pub errors: Option<i32>,
    pub details: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
}
