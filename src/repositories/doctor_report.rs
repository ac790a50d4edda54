use diesel::prelude::*;

use crate::db::PgPoolConn;
use crate::models::doctor_report::{DoctorReport, NewDoctorReport};
use crate::schema::doctor_reports;
use crate::services::errors::RepoError;

pub fn create(conn: &mut PgPoolConn, row: &NewDoctorReport) -> Result<DoctorReport, RepoError> {
    let created = diesel::insert_into(doctor_reports::table)
        .values(row)
        .get_result::<DoctorReport>(conn)?;
    Ok(created)
}

pub fn latest(conn: &mut PgPoolConn) -> Result<Option<DoctorReport>, RepoError> {
    let row = doctor_reports::table
        .order(doctor_reports::created_at.desc())
        .first::<DoctorReport>(conn)
        .optional()?;
    Ok(row)
}
