use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use reqwest::Client;
use serde_json::Value;

use crate::services::errors::{SourceError, SyncError};
use crate::services::rate_gate::RateGate;
use crate::services::source::{MarketDataSource, RealtimeQuote, SectorKind};
use crate::utils::config::IndustrySource;
use crate::utils::percent::normalize_percent_scalar;
use crate::utils::secid::{code_to_market, code_to_secid};

const EM_KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const EM_LIST_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";
const EM_DETAIL_URL: &str = "https://push2.eastmoney.com/api/qt/stock/get";
const EM_KAMT_URL: &str = "https://push2.eastmoney.com/api/qt/kamt/get";
const EM_ZDFB_URL: &str = "https://push2ex.eastmoney.com/getTopicZDFenBu";
const EM_ZT_POOL_URL: &str = "https://push2ex.eastmoney.com/getTopicZTPool";
const EM_DATACENTER_URL: &str = "https://datacenter-web.eastmoney.com/api/data/v1/get";

const EM_UT: &str = "fa5fd1943c7b386f172d6893dbfba10b";
const EM_LIST_UT: &str = "bd1d9ddb04089700cf9c27f6f7426281";

/// 东方财富数据源适配器
///
/// 每个数据集一个方法，统一返回列式帧；列按名字查找，
/// 多出的列仅记日志，缺少必需列抛 SchemaDrift。
/// 所有出站调用经由限频闸门与重试包装
pub struct EastMoneyAdapter {
    client: Client,
    gate: Arc<RateGate>,
    deadline: Duration,
    industry_source: IndustrySource,
}

impl EastMoneyAdapter {
    pub fn new(
        client: Client,
        gate: Arc<RateGate>,
        deadline: Duration,
        industry_source: IndustrySource,
    ) -> Self {
        Self {
            client,
            gate,
            deadline,
            industry_source,
        }
    }

    async fn listing(&self, op: &str, fs: &str, asset_type: &str) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        let fs = fs.to_string();
        let asset_type = asset_type.to_string();
        self.gate
            .call_with_retry(op, self.deadline, move || {
                let client = client.clone();
                let fs = fs.clone();
                let asset_type = asset_type.clone();
                async move { fetch_listing(&client, &fs, &asset_type).await }
            })
            .await
    }

    /// 二级源：板块成分富化，输出列 code, industry, list_date
    async fn industry_enrichment(&self) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        self.gate
            .call_with_retry("symbol_list:industry", self.deadline, move || {
                let client = client.clone();
                async move { fetch_industry_enrichment(&client).await }
            })
            .await
    }
}

#[async_trait::async_trait]
impl MarketDataSource for EastMoneyAdapter {
    /// A 股全市场股票 + 场内 ETF，含二级源行业/上市日富化
    async fn symbol_list(&self) -> Result<DataFrame, SyncError> {
        let stocks = self.listing("symbol_list:stock", STOCK_FS, "stock").await?;
        let etfs = self.listing("symbol_list:etf", ETF_FS, "etf").await?;
        let base = stocks.vstack(&etfs).map_err(polars_drift)?;

        let enrich = self.industry_enrichment().await?;
        merge_enrichment(base, enrich, self.industry_source).map_err(polars_drift)
    }

    /// 日线行情（前复权）
    async fn daily_bars(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        let code = code.to_string();
        self.gate
            .call_with_retry("daily_bars", self.deadline, move || {
                let client = client.clone();
                let code = code.clone();
                async move { fetch_kline(&client, &code, "101", Some((start, end))).await }
            })
            .await
    }

    /// 最近一个交易时段的 1 分钟线
    ///
    /// 输出列: code, timestamp, open, high, low, close, volume
    async fn minute_bars(&self, code: &str) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        let code = code.to_string();
        self.gate
            .call_with_retry("minute_bars", self.deadline, move || {
                let client = client.clone();
                let code = code.clone();
                async move { fetch_minute_kline(&client, &code).await }
            })
            .await
    }

    /// 单标的实时快照
    async fn realtime_quote(&self, code: &str) -> Result<RealtimeQuote, SyncError> {
        let client = self.client.clone();
        let code = code.to_string();
        self.gate
            .call_with_retry("realtime_quote", self.deadline, move || {
                let client = client.clone();
                let code = code.clone();
                async move { fetch_realtime(&client, &code).await }
            })
            .await
    }

    /// 全市场估值快照
    ///
    /// 输出列: code, pe_ttm, pb, ps_ttm, peg, total_mv, circ_mv, dividend_yield
    async fn valuation_snapshot(&self) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        self.gate
            .call_with_retry("valuation_snapshot", self.deadline, move || {
                let client = client.clone();
                async move { fetch_valuation(&client).await }
            })
            .await
    }

    /// 个股资金流（当日）
    ///
    /// 输出列: code, main_net_inflow, super_net_inflow, large_net_inflow,
    /// medium_net_inflow, small_net_inflow
    async fn fund_flow_daily(&self) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        self.gate
            .call_with_retry("fund_flow_daily", self.deadline, move || {
                let client = client.clone();
                async move { fetch_fund_flow(&client).await }
            })
            .await
    }

    /// 两融汇总（指定交易日）
    ///
    /// 输出列: code, trade_date, financing_balance, financing_buy,
    /// financing_repay, securities_balance, securities_sell
    async fn margin_summary(&self, date: NaiveDate) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        self.gate
            .call_with_retry("margin_summary", self.deadline, move || {
                let client = client.clone();
                async move { fetch_margin(&client, date).await }
            })
            .await
    }

    /// 龙虎榜明细（指定交易日）
    ///
    /// 输出列: code, trade_date, reason, net_buy, buy_amount, sell_amount
    async fn dragon_tiger(&self, date: NaiveDate) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        self.gate
            .call_with_retry("dragon_tiger", self.deadline, move || {
                let client = client.clone();
                async move { fetch_dragon_tiger(&client, date).await }
            })
            .await
    }

    /// 北向资金当日净流入（单行帧）
    ///
    /// 输出列: trade_date, sh_net_inflow, sz_net_inflow, total_net_inflow
    async fn northbound_flow(&self, date: NaiveDate) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        self.gate
            .call_with_retry("northbound_flow", self.deadline, move || {
                let client = client.clone();
                async move { fetch_northbound(&client, date).await }
            })
            .await
    }

    /// 市场情绪：涨跌家数分布（单行帧）
    ///
    /// 输出列: trade_date, up_count, down_count, flat_count,
    /// limit_up_count, limit_down_count
    async fn market_sentiment(&self, date: NaiveDate) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        self.gate
            .call_with_retry("market_sentiment", self.deadline, move || {
                let client = client.clone();
                async move { fetch_sentiment(&client, date).await }
            })
            .await
    }

    /// 涨停板池
    ///
    /// 输出列: code, trade_date, reason, streak_days, seal_amount,
    /// first_seal_time, last_seal_time
    async fn limit_up_pool(&self, date: NaiveDate) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        self.gate
            .call_with_retry("limit_up_pool", self.deadline, move || {
                let client = client.clone();
                async move { fetch_limit_up(&client, date).await }
            })
            .await
    }

    /// 行业/概念板块列表与当日行情
    ///
    /// 输出列: sector_code, name, kind, index_level, change_pct, turnover, leader_code
    async fn sector_quotes(&self, kind: SectorKind) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        self.gate
            .call_with_retry("sector_quotes", self.deadline, move || {
                let client = client.clone();
                async move { fetch_sectors(&client, kind).await }
            })
            .await
    }

    /// 单标的财务报表摘要（季度/年度）
    ///
    /// 输出列: code, end_date, pub_date, report_type, revenue, net_profit,
    /// eps, roe, debt_ratio, gross_margin
    async fn financial_summary(&self, code: &str) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        let code = code.to_string();
        self.gate
            .call_with_retry("financial_summary", self.deadline, move || {
                let client = client.clone();
                let code = code.clone();
                async move { fetch_financial(&client, &code).await }
            })
            .await
    }
}

fn sector_fs(kind: SectorKind) -> &'static str {
    match kind {
        SectorKind::Industry => "m:90+t:2",
        SectorKind::Concept => "m:90+t:3",
    }
}

// 沪深京 A 股 / 场内 ETF 的 clist 筛选串
const STOCK_FS: &str = "m:0 t:6,m:0 t:80,m:1 t:2,m:1 t:23,m:0 t:81 s:2048";
const ETF_FS: &str = "b:MK0021,b:MK0022,b:MK0023,b:MK0024";

// ---------- 响应解包与按名取列 ----------

fn envelope(json: &Value, ctx: &str) -> Result<Value, SourceError> {
    match json.get("data") {
        Some(Value::Null) | None => {
            if json.get("data").is_none() {
                Err(SourceError::SchemaDrift(format!(
                    "{}: missing data envelope",
                    ctx
                )))
            } else {
                Err(SourceError::Empty)
            }
        }
        Some(data) => Ok(data.clone()),
    }
}

fn required<'a>(item: &'a Value, key: &str, ctx: &str) -> Result<&'a Value, SourceError> {
    item.get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| SourceError::SchemaDrift(format!("{}: missing required column {}", ctx, key)))
}

/// Number 或 String 统一取 f64；"-" 等占位符视为空
fn num_f64(item: &Value, key: &str) -> Option<f64> {
    match item.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "-" {
                None
            } else {
                trimmed.parse().ok()
            }
        }
        _ => None,
    }
}

/// 百分比语义的列：带百分号或未除百的字符串也能取回
fn pct_f64(item: &Value, key: &str) -> Option<f64> {
    match item.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => normalize_percent_scalar(s.as_str()),
        _ => None,
    }
}

fn val_str(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// 首行多出的未知列仅记录，不失败
fn log_unexpected(item: &Value, expected: &[&str], ctx: &str) {
    if let Some(obj) = item.as_object() {
        for key in obj.keys() {
            if !expected.contains(&key.as_str()) {
                tracing::debug!("{}: 上游新增未识别列 {}", ctx, key);
            }
        }
    }
}

async fn get_json(client: &Client, url: &str, query: &[(&str, &str)]) -> Result<Value, SourceError> {
    let resp = client.get(url).query(query).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(match status.as_u16() {
            429 => SourceError::RateLimited(format!("status {}", status)),
            500..=599 => SourceError::UpstreamUnavailable(format!("status {}", status)),
            _ => SourceError::Unknown(format!("status {}", status)),
        });
    }
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| SourceError::SchemaDrift(format!("bad json: {}", e)))
}

fn diff_rows(data: &Value, ctx: &str) -> Result<Vec<Value>, SourceError> {
    let rows = data
        .get("diff")
        .and_then(|v| v.as_array())
        .ok_or_else(|| SourceError::SchemaDrift(format!("{}: missing diff array", ctx)))?;
    if rows.is_empty() {
        return Err(SourceError::Empty);
    }
    Ok(rows.clone())
}

fn polars_drift(e: PolarsError) -> SyncError {
    SyncError::Source(SourceError::SchemaDrift(format!("frame error: {}", e)))
}

// ---------- 各数据集抓取 ----------

async fn fetch_listing(
    client: &Client,
    fs: &str,
    asset_type: &str,
) -> Result<DataFrame, SourceError> {
    let json = get_json(
        client,
        EM_LIST_URL,
        &[
            ("fs", fs),
            ("fields", "f12,f14,f100"),
            ("fid", "f12"),
            ("po", "0"),
            ("np", "1"),
            ("fltt", "2"),
            ("invt", "2"),
            ("ut", EM_LIST_UT),
            ("pn", "1"),
            ("pz", "10000"),
        ],
    )
    .await?;
    let data = envelope(&json, "listing")?;
    let rows = diff_rows(&data, "listing")?;
    log_unexpected(&rows[0], &["f12", "f14", "f100"], "listing");

    let mut codes: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut names: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut markets: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut industries: Vec<Option<String>> = Vec::with_capacity(rows.len());
    for item in &rows {
        let code = required(item, "f12", "listing")?
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| SourceError::SchemaDrift("listing: f12 not a string".into()))?;
        markets.push(Some(code_to_market(&code).to_string()));
        codes.push(Some(code));
        names.push(val_str(item, "f14"));
        industries.push(val_str(item, "f100").filter(|s| !s.is_empty() && s != "-"));
    }
    let height = codes.len();
    DataFrame::new(vec![
        Series::new("code", codes),
        Series::new("name", names),
        Series::new("market", markets),
        Series::new("asset_type", vec![Some(asset_type.to_string()); height]),
        Series::new("industry", industries),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("listing frame: {}", e)))
}

async fn fetch_industry_enrichment(client: &Client) -> Result<DataFrame, SourceError> {
    let json = get_json(
        client,
        EM_LIST_URL,
        &[
            ("fs", STOCK_FS),
            ("fields", "f12,f100,f26"),
            ("fid", "f12"),
            ("po", "0"),
            ("np", "1"),
            ("fltt", "2"),
            ("invt", "2"),
            ("ut", EM_LIST_UT),
            ("pn", "1"),
            ("pz", "10000"),
        ],
    )
    .await?;
    let data = envelope(&json, "industry")?;
    let rows = diff_rows(&data, "industry")?;
    log_unexpected(&rows[0], &["f12", "f100", "f26"], "industry");

    let mut codes: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut industries: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut list_dates: Vec<Option<NaiveDate>> = Vec::with_capacity(rows.len());
    for item in &rows {
        codes.push(val_str(item, "f12"));
        industries.push(val_str(item, "f100").filter(|s| !s.is_empty() && s != "-"));
        // f26 形如 20100618 的整数
        let list_date = num_f64(item, "f26")
            .map(|v| v as i64)
            .and_then(|v| NaiveDate::parse_from_str(&v.to_string(), "%Y%m%d").ok());
        list_dates.push(list_date);
    }
    DataFrame::new(vec![
        Series::new("code", codes),
        Series::new("industry", industries),
        Series::new("list_date", list_dates),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("industry frame: {}", e)))
}

/// 主源与二级源左连接合并。industry 两源都有时按配置定胜负，
/// 胜方为空再用另一方补位，结果对同一输入恒定
fn merge_enrichment(
    base: DataFrame,
    enrich: DataFrame,
    precedence: IndustrySource,
) -> PolarsResult<DataFrame> {
    let enrich = enrich
        .lazy()
        .rename(["industry"], ["industry_sec"])
        .collect()?;
    let joined = base.join(&enrich, ["code"], ["code"], JoinArgs::new(JoinType::Left))?;

    let (winner, filler) = match precedence {
        IndustrySource::Primary => ("industry", "industry_sec"),
        IndustrySource::Secondary => ("industry_sec", "industry"),
    };
    let merged = joined
        .lazy()
        .with_columns([when(col(winner).is_not_null())
            .then(col(winner))
            .otherwise(col(filler))
            .alias("industry_merged")])
        .drop(["industry", "industry_sec"])
        .rename(["industry_merged"], ["industry"])
        .collect()?;
    Ok(merged)
}

async fn fetch_kline(
    client: &Client,
    code: &str,
    klt: &str,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<DataFrame, SourceError> {
    let secid = code_to_secid(code);
    let (beg, end) = match range {
        Some((s, e)) => (s.format("%Y%m%d").to_string(), e.format("%Y%m%d").to_string()),
        None => ("0".to_string(), "20500101".to_string()),
    };
    let json = get_json(
        client,
        EM_KLINE_URL,
        &[
            ("secid", secid.as_str()),
            ("ut", EM_UT),
            ("fields1", "f1,f2,f3,f4,f5,f6"),
            ("fields2", "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61"),
            ("klt", klt),
            ("fqt", "1"),
            ("beg", beg.as_str()),
            ("end", end.as_str()),
            ("lmt", "1000000"),
        ],
    )
    .await?;
    let data = envelope(&json, "kline")?;
    let klines = required(&data, "klines", "kline")?
        .as_array()
        .cloned()
        .ok_or_else(|| SourceError::SchemaDrift("kline: klines not an array".into()))?;
    if klines.is_empty() {
        return Err(SourceError::Empty);
    }

    let mut dates: Vec<Option<NaiveDate>> = Vec::with_capacity(klines.len());
    let mut opens: Vec<Option<f64>> = Vec::with_capacity(klines.len());
    let mut highs: Vec<Option<f64>> = Vec::with_capacity(klines.len());
    let mut lows: Vec<Option<f64>> = Vec::with_capacity(klines.len());
    let mut closes: Vec<Option<f64>> = Vec::with_capacity(klines.len());
    let mut volumes: Vec<Option<i64>> = Vec::with_capacity(klines.len());
    let mut amounts: Vec<Option<f64>> = Vec::with_capacity(klines.len());
    let mut change_pcts: Vec<Option<f64>> = Vec::with_capacity(klines.len());
    let mut changes: Vec<Option<f64>> = Vec::with_capacity(klines.len());
    let mut turnovers: Vec<Option<f64>> = Vec::with_capacity(klines.len());

    for line in &klines {
        let s = line
            .as_str()
            .ok_or_else(|| SourceError::SchemaDrift("kline: row not a string".into()))?;
        // 日期,开,收,高,低,量,额,振幅,涨跌幅,涨跌额,换手率
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() < 11 {
            return Err(SourceError::SchemaDrift(format!(
                "kline: expected 11 fields, got {}",
                parts.len()
            )));
        }
        dates.push(NaiveDate::parse_from_str(parts[0], "%Y-%m-%d").ok());
        opens.push(parts[1].parse().ok());
        closes.push(parts[2].parse().ok());
        highs.push(parts[3].parse().ok());
        lows.push(parts[4].parse().ok());
        volumes.push(parts[5].parse().ok());
        amounts.push(parts[6].parse().ok());
        change_pcts.push(parts[8].parse().ok());
        changes.push(parts[9].parse().ok());
        turnovers.push(parts[10].parse().ok());
    }

    let height = dates.len();
    DataFrame::new(vec![
        Series::new("code", vec![Some(code.to_string()); height]),
        Series::new("trade_date", dates),
        Series::new("open", opens),
        Series::new("high", highs),
        Series::new("low", lows),
        Series::new("close", closes),
        Series::new("volume", volumes),
        Series::new("amount", amounts),
        Series::new("change", changes),
        Series::new("change_pct", change_pcts),
        Series::new("turnover_rate", turnovers),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("kline frame: {}", e)))
}

async fn fetch_minute_kline(client: &Client, code: &str) -> Result<DataFrame, SourceError> {
    let secid = code_to_secid(code);
    let json = get_json(
        client,
        EM_KLINE_URL,
        &[
            ("secid", secid.as_str()),
            ("ut", EM_UT),
            ("fields1", "f1,f2,f3,f4,f5,f6"),
            ("fields2", "f51,f52,f53,f54,f55,f56,f57"),
            ("klt", "1"),
            ("fqt", "1"),
            ("lmt", "241"),
            ("end", "20500101"),
        ],
    )
    .await?;
    let data = envelope(&json, "minute_kline")?;
    let klines = required(&data, "klines", "minute_kline")?
        .as_array()
        .cloned()
        .ok_or_else(|| SourceError::SchemaDrift("minute_kline: klines not an array".into()))?;
    if klines.is_empty() {
        return Err(SourceError::Empty);
    }

    let mut timestamps: Vec<Option<NaiveDateTime>> = Vec::with_capacity(klines.len());
    let mut opens: Vec<Option<f64>> = Vec::with_capacity(klines.len());
    let mut highs: Vec<Option<f64>> = Vec::with_capacity(klines.len());
    let mut lows: Vec<Option<f64>> = Vec::with_capacity(klines.len());
    let mut closes: Vec<Option<f64>> = Vec::with_capacity(klines.len());
    let mut volumes: Vec<Option<i64>> = Vec::with_capacity(klines.len());

    for line in &klines {
        let s = line
            .as_str()
            .ok_or_else(|| SourceError::SchemaDrift("minute_kline: row not a string".into()))?;
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() < 6 {
            return Err(SourceError::SchemaDrift(format!(
                "minute_kline: expected 6 fields, got {}",
                parts.len()
            )));
        }
        timestamps.push(NaiveDateTime::parse_from_str(parts[0], "%Y-%m-%d %H:%M").ok());
        opens.push(parts[1].parse().ok());
        closes.push(parts[2].parse().ok());
        highs.push(parts[3].parse().ok());
        lows.push(parts[4].parse().ok());
        volumes.push(parts[5].parse().ok());
    }

    let height = timestamps.len();
    DataFrame::new(vec![
        Series::new("code", vec![Some(code.to_string()); height]),
        Series::new("timestamp", timestamps),
        Series::new("open", opens),
        Series::new("high", highs),
        Series::new("low", lows),
        Series::new("close", closes),
        Series::new("volume", volumes),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("minute frame: {}", e)))
}

async fn fetch_realtime(client: &Client, code: &str) -> Result<RealtimeQuote, SourceError> {
    let secid = code_to_secid(code);
    let json = get_json(
        client,
        EM_DETAIL_URL,
        &[
            ("secid", secid.as_str()),
            ("ut", EM_LIST_UT),
            (
                "fields",
                "f43,f44,f45,f46,f47,f48,f57,f58,f60,f169,f170",
            ),
            ("fltt", "2"),
            ("invt", "2"),
        ],
    )
    .await?;
    let data = envelope(&json, "realtime")?;
    log_unexpected(
        &data,
        &[
            "f43", "f44", "f45", "f46", "f47", "f48", "f57", "f58", "f60", "f169", "f170",
        ],
        "realtime",
    );
    let code = required(&data, "f57", "realtime")?
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| SourceError::SchemaDrift("realtime: f57 not a string".into()))?;
    Ok(RealtimeQuote {
        code,
        name: val_str(&data, "f58").unwrap_or_default(),
        price: num_f64(&data, "f43"),
        change: num_f64(&data, "f169"),
        change_pct: pct_f64(&data, "f170"),
        open: num_f64(&data, "f46"),
        high: num_f64(&data, "f44"),
        low: num_f64(&data, "f45"),
        pre_close: num_f64(&data, "f60"),
        volume: num_f64(&data, "f47"),
        amount: num_f64(&data, "f48"),
    })
}

async fn fetch_valuation(client: &Client) -> Result<DataFrame, SourceError> {
    let json = get_json(
        client,
        EM_LIST_URL,
        &[
            ("fs", STOCK_FS),
            ("fields", "f12,f9,f23,f115,f114,f20,f21,f133"),
            ("fid", "f12"),
            ("po", "0"),
            ("np", "1"),
            ("fltt", "2"),
            ("invt", "2"),
            ("ut", EM_LIST_UT),
            ("pn", "1"),
            ("pz", "10000"),
        ],
    )
    .await?;
    let data = envelope(&json, "valuation")?;
    let rows = diff_rows(&data, "valuation")?;
    log_unexpected(
        &rows[0],
        &["f12", "f9", "f23", "f115", "f114", "f20", "f21", "f133"],
        "valuation",
    );

    let mut codes: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut pe_ttm: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut pb: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut ps_ttm: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut peg: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut total_mv: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut circ_mv: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut dividend: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    for item in &rows {
        codes.push(val_str(item, "f12"));
        pe_ttm.push(num_f64(item, "f115"));
        pb.push(num_f64(item, "f23"));
        ps_ttm.push(num_f64(item, "f9"));
        peg.push(num_f64(item, "f114"));
        total_mv.push(num_f64(item, "f20"));
        circ_mv.push(num_f64(item, "f21"));
        dividend.push(pct_f64(item, "f133"));
    }
    DataFrame::new(vec![
        Series::new("code", codes),
        Series::new("pe_ttm", pe_ttm),
        Series::new("pb", pb),
        Series::new("ps_ttm", ps_ttm),
        Series::new("peg", peg),
        Series::new("total_mv", total_mv),
        Series::new("circ_mv", circ_mv),
        Series::new("dividend_yield", dividend),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("valuation frame: {}", e)))
}

async fn fetch_fund_flow(client: &Client) -> Result<DataFrame, SourceError> {
    let json = get_json(
        client,
        EM_LIST_URL,
        &[
            ("fs", STOCK_FS),
            ("fields", "f12,f62,f66,f72,f78,f84"),
            ("fid", "f62"),
            ("po", "1"),
            ("np", "1"),
            ("fltt", "2"),
            ("invt", "2"),
            ("ut", EM_LIST_UT),
            ("pn", "1"),
            ("pz", "10000"),
        ],
    )
    .await?;
    let data = envelope(&json, "fund_flow")?;
    let rows = diff_rows(&data, "fund_flow")?;
    log_unexpected(&rows[0], &["f12", "f62", "f66", "f72", "f78", "f84"], "fund_flow");

    let mut codes: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut main_in: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut super_in: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut large_in: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut medium_in: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut small_in: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    for item in &rows {
        codes.push(val_str(item, "f12"));
        main_in.push(num_f64(item, "f62"));
        super_in.push(num_f64(item, "f66"));
        large_in.push(num_f64(item, "f72"));
        medium_in.push(num_f64(item, "f78"));
        small_in.push(num_f64(item, "f84"));
    }
    DataFrame::new(vec![
        Series::new("code", codes),
        Series::new("main_net_inflow", main_in),
        Series::new("super_net_inflow", super_in),
        Series::new("large_net_inflow", large_in),
        Series::new("medium_net_inflow", medium_in),
        Series::new("small_net_inflow", small_in),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("fund_flow frame: {}", e)))
}

/// 数据中心接口的 result.data 数组
fn datacenter_rows(json: &Value, ctx: &str) -> Result<Vec<Value>, SourceError> {
    let rows = json
        .get("result")
        .and_then(|r| r.get("data"))
        .and_then(|d| d.as_array())
        .ok_or_else(|| SourceError::SchemaDrift(format!("{}: missing result.data", ctx)))?;
    if rows.is_empty() {
        return Err(SourceError::Empty);
    }
    Ok(rows.clone())
}

async fn fetch_margin(client: &Client, date: NaiveDate) -> Result<DataFrame, SourceError> {
    let filter = format!("(DATE='{}')", date.format("%Y-%m-%d"));
    let json = get_json(
        client,
        EM_DATACENTER_URL,
        &[
            ("reportName", "RPTA_WEB_RZRQ_GGMX"),
            ("columns", "ALL"),
            ("pageSize", "5000"),
            ("pageNumber", "1"),
            ("filter", filter.as_str()),
        ],
    )
    .await?;
    let rows = datacenter_rows(&json, "margin")?;

    let mut codes: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut fin_balance: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut fin_buy: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut fin_repay: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut sec_balance: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut sec_sell: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    for item in &rows {
        codes.push(val_str(item, "SCODE"));
        fin_balance.push(num_f64(item, "RZYE"));
        fin_buy.push(num_f64(item, "RZMRE"));
        fin_repay.push(num_f64(item, "RZCHE"));
        sec_balance.push(num_f64(item, "RQYE"));
        sec_sell.push(num_f64(item, "RQMCL"));
    }
    let height = codes.len();
    DataFrame::new(vec![
        Series::new("code", codes),
        Series::new("trade_date", vec![Some(date); height]),
        Series::new("financing_balance", fin_balance),
        Series::new("financing_buy", fin_buy),
        Series::new("financing_repay", fin_repay),
        Series::new("securities_balance", sec_balance),
        Series::new("securities_sell", sec_sell),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("margin frame: {}", e)))
}

async fn fetch_dragon_tiger(client: &Client, date: NaiveDate) -> Result<DataFrame, SourceError> {
    let day = date.format("%Y-%m-%d").to_string();
    let filter = format!("(TRADE_DATE='{}')", day);
    let json = get_json(
        client,
        EM_DATACENTER_URL,
        &[
            ("reportName", "RPT_DAILYBILLBOARD_DETAILSNEW"),
            ("columns", "ALL"),
            ("pageSize", "500"),
            ("pageNumber", "1"),
            ("filter", filter.as_str()),
        ],
    )
    .await?;
    let rows = datacenter_rows(&json, "dragon_tiger")?;

    let mut codes: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut reasons: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut net_buy: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut buys: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut sells: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    for item in &rows {
        codes.push(val_str(item, "SECURITY_CODE"));
        reasons.push(val_str(item, "EXPLANATION"));
        net_buy.push(num_f64(item, "BILLBOARD_NET_AMT"));
        buys.push(num_f64(item, "BILLBOARD_BUY_AMT"));
        sells.push(num_f64(item, "BILLBOARD_SELL_AMT"));
    }
    let height = codes.len();
    DataFrame::new(vec![
        Series::new("code", codes),
        Series::new("trade_date", vec![Some(date); height]),
        Series::new("reason", reasons),
        Series::new("net_buy", net_buy),
        Series::new("buy_amount", buys),
        Series::new("sell_amount", sells),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("dragon_tiger frame: {}", e)))
}

async fn fetch_northbound(client: &Client, date: NaiveDate) -> Result<DataFrame, SourceError> {
    let json = get_json(
        client,
        EM_KAMT_URL,
        &[("ut", EM_LIST_UT), ("fields1", "f1,f3,f5"), ("fields2", "f51,f52")],
    )
    .await?;
    let data = envelope(&json, "northbound")?;
    let hk2sh = required(&data, "hk2sh", "northbound")?;
    let hk2sz = required(&data, "hk2sz", "northbound")?;
    let sh = num_f64(hk2sh, "dayNetAmtIn");
    let sz = num_f64(hk2sz, "dayNetAmtIn");
    let total = match (sh, sz) {
        (Some(a), Some(b)) => Some(a + b),
        _ => None,
    };
    DataFrame::new(vec![
        Series::new("trade_date", vec![Some(date)]),
        Series::new("sh_net_inflow", vec![sh]),
        Series::new("sz_net_inflow", vec![sz]),
        Series::new("total_net_inflow", vec![total]),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("northbound frame: {}", e)))
}

async fn fetch_sentiment(client: &Client, date: NaiveDate) -> Result<DataFrame, SourceError> {
    let json = get_json(
        client,
        EM_ZDFB_URL,
        &[("ut", "7eea3edcaed734bea9cbfc24409ed989"), ("dpt", "wz.ztzt")],
    )
    .await?;
    let data = envelope(&json, "sentiment")?;
    let fenbu = required(&data, "fenbu", "sentiment")?
        .as_array()
        .cloned()
        .ok_or_else(|| SourceError::SchemaDrift("sentiment: fenbu not an array".into()))?;

    // fenbu 为 {涨跌幅桶: 家数} 的对象数组；桶 -11/11 为跌停/涨停
    let mut up = 0i64;
    let mut down = 0i64;
    let mut flat = 0i64;
    let mut limit_up = 0i64;
    let mut limit_down = 0i64;
    for bucket in &fenbu {
        let obj = bucket
            .as_object()
            .ok_or_else(|| SourceError::SchemaDrift("sentiment: bucket not an object".into()))?;
        for (k, v) in obj {
            let level: i64 = k
                .parse()
                .map_err(|_| SourceError::SchemaDrift(format!("sentiment: bad bucket {}", k)))?;
            let count = v.as_i64().unwrap_or(0);
            match level {
                0 => flat += count,
                11 => {
                    up += count;
                    limit_up += count;
                }
                -11 => {
                    down += count;
                    limit_down += count;
                }
                l if l > 0 => up += count,
                _ => down += count,
            }
        }
    }

    DataFrame::new(vec![
        Series::new("trade_date", vec![Some(date)]),
        Series::new("up_count", vec![Some(up)]),
        Series::new("down_count", vec![Some(down)]),
        Series::new("flat_count", vec![Some(flat)]),
        Series::new("limit_up_count", vec![Some(limit_up)]),
        Series::new("limit_down_count", vec![Some(limit_down)]),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("sentiment frame: {}", e)))
}

async fn fetch_limit_up(client: &Client, date: NaiveDate) -> Result<DataFrame, SourceError> {
    let day = date.format("%Y%m%d").to_string();
    let json = get_json(
        client,
        EM_ZT_POOL_URL,
        &[
            ("ut", "7eea3edcaed734bea9cbfc24409ed989"),
            ("dpt", "wz.ztzt"),
            ("Pageindex", "0"),
            ("pagesize", "500"),
            ("sort", "fbt:asc"),
            ("date", day.as_str()),
        ],
    )
    .await?;
    let data = envelope(&json, "limit_up")?;
    let pool = required(&data, "pool", "limit_up")?
        .as_array()
        .cloned()
        .ok_or_else(|| SourceError::SchemaDrift("limit_up: pool not an array".into()))?;
    if pool.is_empty() {
        return Err(SourceError::Empty);
    }
    log_unexpected(&pool[0], &["c", "n", "hybk", "zttj", "fund", "fbt", "lbt", "zbc"], "limit_up");

    let mut codes: Vec<Option<String>> = Vec::with_capacity(pool.len());
    let mut reasons: Vec<Option<String>> = Vec::with_capacity(pool.len());
    let mut streaks: Vec<Option<i64>> = Vec::with_capacity(pool.len());
    let mut seals: Vec<Option<f64>> = Vec::with_capacity(pool.len());
    let mut first_ts: Vec<Option<i64>> = Vec::with_capacity(pool.len());
    let mut last_ts: Vec<Option<i64>> = Vec::with_capacity(pool.len());
    for item in &pool {
        codes.push(val_str(item, "c"));
        reasons.push(val_str(item, "hybk"));
        streaks.push(
            item.get("zttj")
                .and_then(|t| t.get("days"))
                .and_then(|v| v.as_i64()),
        );
        seals.push(num_f64(item, "fund"));
        first_ts.push(item.get("fbt").and_then(|v| v.as_i64()));
        last_ts.push(item.get("lbt").and_then(|v| v.as_i64()));
    }
    let height = codes.len();
    DataFrame::new(vec![
        Series::new("code", codes),
        Series::new("trade_date", vec![Some(date); height]),
        Series::new("reason", reasons),
        Series::new("streak_days", streaks),
        Series::new("seal_amount", seals),
        Series::new("first_seal_time", first_ts),
        Series::new("last_seal_time", last_ts),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("limit_up frame: {}", e)))
}

async fn fetch_sectors(client: &Client, kind: SectorKind) -> Result<DataFrame, SourceError> {
    let json = get_json(
        client,
        EM_LIST_URL,
        &[
            ("fs", sector_fs(kind)),
            ("fields", "f12,f14,f2,f3,f6,f140"),
            ("fid", "f3"),
            ("po", "1"),
            ("np", "1"),
            ("fltt", "2"),
            ("invt", "2"),
            ("ut", EM_LIST_UT),
            ("pn", "1"),
            ("pz", "1000"),
        ],
    )
    .await?;
    let data = envelope(&json, "sectors")?;
    let rows = diff_rows(&data, "sectors")?;
    log_unexpected(&rows[0], &["f12", "f14", "f2", "f3", "f6", "f140"], "sectors");

    let mut codes: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut names: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut levels: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut pcts: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut turnovers: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut leaders: Vec<Option<String>> = Vec::with_capacity(rows.len());
    for item in &rows {
        codes.push(val_str(item, "f12"));
        names.push(val_str(item, "f14"));
        levels.push(num_f64(item, "f2"));
        pcts.push(pct_f64(item, "f3"));
        turnovers.push(num_f64(item, "f6"));
        leaders.push(val_str(item, "f140"));
    }
    let height = codes.len();
    DataFrame::new(vec![
        Series::new("sector_code", codes),
        Series::new("name", names),
        Series::new("kind", vec![Some(kind.as_str().to_string()); height]),
        Series::new("index_level", levels),
        Series::new("change_pct", pcts),
        Series::new("turnover", turnovers),
        Series::new("leader_code", leaders),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("sector frame: {}", e)))
}

async fn fetch_financial(client: &Client, code: &str) -> Result<DataFrame, SourceError> {
    let filter = format!("(SECURITY_CODE=\"{}\")", code);
    let json = get_json(
        client,
        EM_DATACENTER_URL,
        &[
            ("reportName", "RPT_LICO_FN_CPD"),
            ("columns", "ALL"),
            ("pageSize", "40"),
            ("pageNumber", "1"),
            ("sortColumns", "REPORT_DATE"),
            ("sortTypes", "-1"),
            ("filter", filter.as_str()),
        ],
    )
    .await?;
    let rows = datacenter_rows(&json, "financial")?;

    let parse_date = |item: &Value, key: &str| -> Option<NaiveDate> {
        val_str(item, key)
            .and_then(|s| NaiveDate::parse_from_str(&s[..10.min(s.len())], "%Y-%m-%d").ok())
    };

    let mut end_dates: Vec<Option<NaiveDate>> = Vec::with_capacity(rows.len());
    let mut pub_dates: Vec<Option<NaiveDate>> = Vec::with_capacity(rows.len());
    let mut types: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut revenues: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut profits: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut eps: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut roes: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut debts: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    let mut margins: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    for item in &rows {
        end_dates.push(parse_date(item, "REPORT_DATE"));
        pub_dates.push(parse_date(item, "NOTICE_DATE"));
        types.push(val_str(item, "REPORT_TYPE"));
        revenues.push(num_f64(item, "TOTAL_OPERATE_INCOME"));
        profits.push(num_f64(item, "PARENT_NETPROFIT"));
        eps.push(num_f64(item, "BASIC_EPS"));
        roes.push(pct_f64(item, "WEIGHTAVG_ROE"));
        debts.push(num_f64(item, "DEBT_ASSET_RATIO"));
        margins.push(pct_f64(item, "XSMLL"));
    }
    let height = end_dates.len();
    DataFrame::new(vec![
        Series::new("code", vec![Some(code.to_string()); height]),
        Series::new("end_date", end_dates),
        Series::new("pub_date", pub_dates),
        Series::new("report_type", types),
        Series::new("revenue", revenues),
        Series::new("net_profit", profits),
        Series::new("eps", eps),
        Series::new("roe", roes),
        Series::new("debt_ratio", debts),
        Series::new("gross_margin", margins),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("financial frame: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_distinguishes_empty_and_drift() {
        let drift = json!({"rc": 0});
        assert!(matches!(
            envelope(&drift, "t"),
            Err(SourceError::SchemaDrift(_))
        ));
        let empty = json!({"rc": 0, "data": null});
        assert!(matches!(envelope(&empty, "t"), Err(SourceError::Empty)));
        let ok = json!({"rc": 0, "data": {"x": 1}});
        assert!(envelope(&ok, "t").is_ok());
    }

    #[test]
    fn required_column_missing_is_drift() {
        let item = json!({"f12": "000001"});
        assert!(required(&item, "f12", "t").is_ok());
        assert!(matches!(
            required(&item, "f14", "t"),
            Err(SourceError::SchemaDrift(_))
        ));
    }

    #[test]
    fn numeric_lookups_handle_strings_and_placeholders() {
        let item = json!({"a": 3.25, "b": "4.5%", "c": "-", "d": "12.5"});
        assert_eq!(num_f64(&item, "a"), Some(3.25));
        assert_eq!(num_f64(&item, "c"), None);
        assert_eq!(num_f64(&item, "d"), Some(12.5));
        assert_eq!(pct_f64(&item, "b"), Some(4.5));
    }
}
