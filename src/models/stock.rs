use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{stocks, watchlist};

#[derive(Queryable, Selectable, Debug, Clone, Serialize)]
#[diesel(table_name = stocks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Stock {
    pub code: String,
    pub name: String,
    pub market: String,
    pub asset_type: String,
    pub industry: Option<String>,
    pub list_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = stocks)]
pub struct NewStock {
    pub code: String,
    pub name: String,
    pub market: String,
    pub asset_type: String,
    pub industry: Option<String>,
    pub list_date: Option<NaiveDate>,
    pub is_active: bool,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = watchlist)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WatchlistEntry {
    pub id: i32,
    pub code: String,
    pub sort_order: i32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = watchlist)]
pub struct NewWatchlistEntry {
    pub code: String,
    pub sort_order: i32,
    pub note: Option<String>,
}
