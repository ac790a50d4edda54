use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::prelude::*;

use crate::schema::{dragon_tiger, fund_flows, margin_trades, northbound_flows};

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = fund_flows)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FundFlow {
    pub code: String,
    pub trade_date: NaiveDate,
    pub main_net_inflow: Option<BigDecimal>,
    pub super_net_inflow: Option<BigDecimal>,
    pub large_net_inflow: Option<BigDecimal>,
    pub medium_net_inflow: Option<BigDecimal>,
    pub small_net_inflow: Option<BigDecimal>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = fund_flows)]
pub struct NewFundFlow {
    pub code: String,
    pub trade_date: NaiveDate,
    pub main_net_inflow: Option<BigDecimal>,
    pub super_net_inflow: Option<BigDecimal>,
    pub large_net_inflow: Option<BigDecimal>,
    pub medium_net_inflow: Option<BigDecimal>,
    pub small_net_inflow: Option<BigDecimal>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = margin_trades)]
pub struct NewMarginTrade {
    pub code: String,
    pub trade_date: NaiveDate,
    pub financing_balance: Option<BigDecimal>,
    pub financing_buy: Option<BigDecimal>,
    pub financing_repay: Option<BigDecimal>,
    pub securities_balance: Option<BigDecimal>,
    pub securities_sell: Option<BigDecimal>,
}

/// 龙虎榜为只追加表，(code, trade_date, reason) 去重
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = dragon_tiger)]
pub struct NewDragonTiger {
    pub code: String,
    pub trade_date: NaiveDate,
    pub reason: String,
    pub net_buy: Option<BigDecimal>,
    pub buy_amount: Option<BigDecimal>,
    pub sell_amount: Option<BigDecimal>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = northbound_flows)]
pub struct NewNorthboundFlow {
    pub trade_date: NaiveDate,
    pub sh_net_inflow: Option<BigDecimal>,
    pub sz_net_inflow: Option<BigDecimal>,
    pub total_net_inflow: Option<BigDecimal>,
}
