use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use crate::schema::{limit_up_stocks, market_sentiments};

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = market_sentiments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MarketSentiment {
    pub trade_date: NaiveDate,
    pub up_count: Option<i32>,
    pub down_count: Option<i32>,
    pub flat_count: Option<i32>,
    pub limit_up_count: Option<i32>,
    pub limit_down_count: Option<i32>,
    pub broken_board_rate: Option<BigDecimal>,
    pub total_turnover: Option<BigDecimal>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = market_sentiments)]
pub struct NewMarketSentiment {
    pub trade_date: NaiveDate,
    pub up_count: Option<i32>,
    pub down_count: Option<i32>,
    pub flat_count: Option<i32>,
    pub limit_up_count: Option<i32>,
    pub limit_down_count: Option<i32>,
    pub broken_board_rate: Option<BigDecimal>,
    pub total_turnover: Option<BigDecimal>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = limit_up_stocks)]
pub struct NewLimitUpStock {
    pub code: String,
    pub trade_date: NaiveDate,
    pub reason: Option<String>,
    pub streak_days: Option<i32>,
    pub seal_amount: Option<BigDecimal>,
    pub first_seal_time: Option<DateTime<Utc>>,
    pub last_seal_time: Option<DateTime<Utc>>,
}
