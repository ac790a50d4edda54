use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use crate::schema::{daily_quotes, minute_quotes};

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = daily_quotes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DailyQuote {
    pub code: String,
    pub trade_date: NaiveDate,
    pub open: Option<BigDecimal>,
    pub high: Option<BigDecimal>,
    pub low: Option<BigDecimal>,
    pub close: Option<BigDecimal>,
    pub volume: Option<i64>,
    pub amount: Option<BigDecimal>,
    pub change: Option<BigDecimal>,
    pub change_pct: Option<BigDecimal>,
    pub turnover_rate: Option<BigDecimal>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = daily_quotes)]
pub struct NewDailyQuote {
    pub code: String,
    pub trade_date: NaiveDate,
    pub open: Option<BigDecimal>,
    pub high: Option<BigDecimal>,
    pub low: Option<BigDecimal>,
    pub close: Option<BigDecimal>,
    pub volume: Option<i64>,
    pub amount: Option<BigDecimal>,
    pub change: Option<BigDecimal>,
    pub change_pct: Option<BigDecimal>,
    pub turnover_rate: Option<BigDecimal>,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = minute_quotes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MinuteQuote {
    pub code: String,
    pub timestamp: DateTime<Utc>,
    pub open: Option<BigDecimal>,
    pub high: Option<BigDecimal>,
    pub low: Option<BigDecimal>,
    pub close: Option<BigDecimal>,
    pub volume: Option<i64>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = minute_quotes)]
pub struct NewMinuteQuote {
    pub code: String,
    pub timestamp: DateTime<Utc>,
    pub open: Option<BigDecimal>,
    pub high: Option<BigDecimal>,
    pub low: Option<BigDecimal>,
    pub close: Option<BigDecimal>,
    pub volume: Option<i64>,
}
