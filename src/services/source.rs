use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::DataFrame;
use serde::Serialize;

use crate::services::errors::SyncError;

/// 实时快照（L3 按需查询返回）
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeQuote {
    pub code: String,
    pub name: String,
    pub price: Option<f64>,
    pub change: Option<f64>,
    pub change_pct: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub pre_close: Option<f64>,
    pub volume: Option<f64>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorKind {
    Industry,
    Concept,
}

impl SectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectorKind::Industry => "industry",
            SectorKind::Concept => "concept",
        }
    }
}

/// 行情数据源抽象：每个数据集一个方法，统一返回列式帧。
/// 列按名字查找；缺少必需列实现侧抛 SchemaDrift
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    /// 列: code, name, market, asset_type, industry, list_date
    async fn symbol_list(&self) -> Result<DataFrame, SyncError>;

    /// 列: code, trade_date, open, high, low, close, volume, amount,
    /// change, change_pct, turnover_rate
    async fn daily_bars(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, SyncError>;

    /// 列: code, timestamp, open, high, low, close, volume
    async fn minute_bars(&self, code: &str) -> Result<DataFrame, SyncError>;

    async fn realtime_quote(&self, code: &str) -> Result<RealtimeQuote, SyncError>;

    /// 列: code, pe_ttm, pb, ps_ttm, peg, total_mv, circ_mv, dividend_yield
    async fn valuation_snapshot(&self) -> Result<DataFrame, SyncError>;

    /// 列: code, main/super/large/medium/small_net_inflow
    async fn fund_flow_daily(&self) -> Result<DataFrame, SyncError>;

    /// 列: code, trade_date, financing_*, securities_*
    async fn margin_summary(&self, date: NaiveDate) -> Result<DataFrame, SyncError>;

    /// 列: code, trade_date, reason, net_buy, buy_amount, sell_amount
    async fn dragon_tiger(&self, date: NaiveDate) -> Result<DataFrame, SyncError>;

    /// 单行帧: trade_date, sh/sz/total_net_inflow
    async fn northbound_flow(&self, date: NaiveDate) -> Result<DataFrame, SyncError>;

    /// 单行帧: trade_date, up/down/flat/limit_up/limit_down_count
    async fn market_sentiment(&self, date: NaiveDate) -> Result<DataFrame, SyncError>;

    /// 列: code, trade_date, reason, streak_days, seal_amount, first/last_seal_time
    async fn limit_up_pool(&self, date: NaiveDate) -> Result<DataFrame, SyncError>;

    /// 列: sector_code, name, kind, index_level, change_pct, turnover, leader_code
    async fn sector_quotes(&self, kind: SectorKind) -> Result<DataFrame, SyncError>;

    /// 列: code, end_date, pub_date, report_type, revenue, net_profit,
    /// eps, roe, debt_ratio, gross_margin
    async fn financial_summary(&self, code: &str) -> Result<DataFrame, SyncError>;
}

/// 新闻数据源抽象
///
/// 列: title, content, source, publish_time, url, related_codes(JSON 数组串)
#[async_trait::async_trait]
pub trait NewsFeed: Send + Sync {
    async fn news_since(&self, since: DateTime<Utc>) -> Result<DataFrame, SyncError>;
    async fn stock_news(&self, code: &str, limit: usize) -> Result<DataFrame, SyncError>;
}

/// 向量服务抽象：文本 → 定长向量
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn max_batch_size(&self) -> usize;
    fn dimension(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SyncError>;
}
