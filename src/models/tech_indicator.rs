use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use crate::schema::tech_indicators;

/// 技术指标，完全由日线行情推导
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = tech_indicators)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TechIndicator {
    pub code: String,
    pub trade_date: NaiveDate,
    pub ma5: Option<BigDecimal>,
    pub ma10: Option<BigDecimal>,
    pub ma20: Option<BigDecimal>,
    pub ma60: Option<BigDecimal>,
    pub macd_dif: Option<BigDecimal>,
    pub macd_dea: Option<BigDecimal>,
    pub macd_bar: Option<BigDecimal>,
    pub rsi_14: Option<BigDecimal>,
    pub kdj_k: Option<BigDecimal>,
    pub kdj_d: Option<BigDecimal>,
    pub kdj_j: Option<BigDecimal>,
    pub boll_upper: Option<BigDecimal>,
    pub boll_middle: Option<BigDecimal>,
    pub boll_lower: Option<BigDecimal>,
    pub cci: Option<BigDecimal>,
    pub atr: Option<BigDecimal>,
    pub obv: Option<i64>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = tech_indicators)]
pub struct NewTechIndicator {
    pub code: String,
    pub trade_date: NaiveDate,
    pub ma5: Option<BigDecimal>,
    pub ma10: Option<BigDecimal>,
    pub ma20: Option<BigDecimal>,
    pub ma60: Option<BigDecimal>,
    pub macd_dif: Option<BigDecimal>,
    pub macd_dea: Option<BigDecimal>,
    pub macd_bar: Option<BigDecimal>,
    pub rsi_14: Option<BigDecimal>,
    pub kdj_k: Option<BigDecimal>,
    pub kdj_d: Option<BigDecimal>,
    pub kdj_j: Option<BigDecimal>,
    pub boll_upper: Option<BigDecimal>,
    pub boll_middle: Option<BigDecimal>,
    pub boll_lower: Option<BigDecimal>,
    pub cci: Option<BigDecimal>,
    pub atr: Option<BigDecimal>,
    pub obv: Option<i64>,
}
