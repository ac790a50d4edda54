use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::prelude::*;

use crate::schema::financials;

/// 财务报表摘要，按 (code, end_date) 唯一
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = financials)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Financial {
    pub code: String,
    pub end_date: NaiveDate,
    pub pub_date: Option<NaiveDate>,
    pub report_type: Option<String>,
    pub revenue: Option<BigDecimal>,
    pub net_profit: Option<BigDecimal>,
    pub eps: Option<BigDecimal>,
    pub roe: Option<BigDecimal>,
    pub debt_ratio: Option<BigDecimal>,
    pub gross_margin: Option<BigDecimal>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = financials)]
pub struct NewFinancial {
    pub code: String,
    pub end_date: NaiveDate,
    pub pub_date: Option<NaiveDate>,
    pub report_type: Option<String>,
    pub revenue: Option<BigDecimal>,
    pub net_profit: Option<BigDecimal>,
    pub eps: Option<BigDecimal>,
    pub roe: Option<BigDecimal>,
    pub debt_ratio: Option<BigDecimal>,
    pub gross_margin: Option<BigDecimal>,
}
