use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::prelude::*;

use crate::schema::{sector_quotes, sectors};

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = sectors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Sector {
    pub sector_code: String,
    pub name: String,
    pub kind: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = sector_quotes)]
pub struct NewSectorQuote {
    pub sector_code: String,
    pub trade_date: NaiveDate,
    pub index_level: Option<BigDecimal>,
    pub change_pct: Option<BigDecimal>,
    pub turnover: Option<BigDecimal>,
    pub leader_code: Option<String>,
}
