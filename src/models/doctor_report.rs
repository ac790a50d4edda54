use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::doctor_reports;

#[derive(Queryable, Selectable, Debug, Clone, Serialize)]
#[diesel(table_name = doctor_reports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DoctorReport {
    pub id: i32,
    pub run_date: NaiveDate,
    pub passed: bool,
    pub report: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = doctor_reports)]
pub struct NewDoctorReport {
    pub run_date: NaiveDate,
    pub passed: bool,
    pub report: serde_json::Value,
}
