use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::prelude::*;

use crate::schema::valuations;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = valuations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Valuation {
    pub code: String,
    pub trade_date: NaiveDate,
    pub pe_ttm: Option<BigDecimal>,
    pub pb: Option<BigDecimal>,
    pub ps_ttm: Option<BigDecimal>,
    pub peg: Option<BigDecimal>,
    pub total_mv: Option<BigDecimal>,
    pub circ_mv: Option<BigDecimal>,
    pub dividend_yield: Option<BigDecimal>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = valuations)]
pub struct NewValuation {
    pub code: String,
    pub trade_date: NaiveDate,
    pub pe_ttm: Option<BigDecimal>,
    pub pb: Option<BigDecimal>,
    pub ps_ttm: Option<BigDecimal>,
    pub peg: Option<BigDecimal>,
    pub total_mv: Option<BigDecimal>,
    pub circ_mv: Option<BigDecimal>,
    pub dividend_yield: Option<BigDecimal>,
}
