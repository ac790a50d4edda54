use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Shanghai;
use polars::prelude::*;
use reqwest::Client;
use serde_json::Value;

use crate::services::errors::{SourceError, SyncError};
use crate::services::rate_gate::RateGate;
use crate::services::source::NewsFeed;

const EM_FAST_NEWS_URL: &str = "https://np-weblist.eastmoney.com/comm/web/getFastNewsList";
const EM_STOCK_NEWS_URL: &str = "https://np-listapi.eastmoney.com/comm/web/getListInfo";

/// 财经快讯数据源
///
/// 全市快讯 + 个股新闻轮询两个端点，统一输出列:
/// title, content, source, publish_time, url, related_codes(JSON 数组串)
pub struct NewsSource {
    client: Client,
    gate: Arc<RateGate>,
    deadline: Duration,
}

impl NewsSource {
    pub fn new(client: Client, gate: Arc<RateGate>, deadline: Duration) -> Self {
        Self {
            client,
            gate,
            deadline,
        }
    }
}

#[async_trait::async_trait]
impl NewsFeed for NewsSource {
    /// since 之后发布的全市快讯
    async fn news_since(&self, since: DateTime<Utc>) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        let df = self
            .gate
            .call_with_retry("news_since", self.deadline, move || {
                let client = client.clone();
                async move { fetch_fast_news(&client).await }
            })
            .await?;
        // 端点只给最新若干条，时间窗过滤在本地完成
        let since_naive = since.with_timezone(&Shanghai).naive_local();
        df.lazy()
            .filter(col("publish_time").gt(lit(since_naive)))
            .collect()
            .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("news filter: {}", e))))
    }

    /// 单只股票最新新闻
    async fn stock_news(&self, code: &str, limit: usize) -> Result<DataFrame, SyncError> {
        let client = self.client.clone();
        let code = code.to_string();
        self.gate
            .call_with_retry("stock_news", self.deadline, move || {
                let client = client.clone();
                let code = code.clone();
                async move { fetch_stock_news(&client, &code, limit).await }
            })
            .await
    }
}

/// 北京时间字符串转 UTC
pub fn cn_time_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    match Shanghai.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        // 夏令时问题在 Asia/Shanghai 不存在，歧义时取早值兜底
        chrono::LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        chrono::LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

fn parse_cn_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M"))
        .ok()
}

async fn fetch_fast_news(client: &Client) -> Result<DataFrame, SourceError> {
    let resp = client
        .get(EM_FAST_NEWS_URL)
        .query(&[("client", "web"), ("biz", "web_724"), ("fastColumn", "102"), ("pageSize", "200")])
        .send()
        .await?;
    let body = resp.text().await?;
    let json: Value = serde_json::from_str(&body)
        .map_err(|e| SourceError::SchemaDrift(format!("fast news: bad json: {}", e)))?;

    let list = json
        .get("data")
        .and_then(|d| d.get("fastNewsList"))
        .and_then(|l| l.as_array())
        .ok_or_else(|| SourceError::SchemaDrift("fast news: missing data.fastNewsList".into()))?;
    if list.is_empty() {
        return Err(SourceError::Empty);
    }

    let mut titles: Vec<Option<String>> = Vec::with_capacity(list.len());
    let mut contents: Vec<Option<String>> = Vec::with_capacity(list.len());
    let mut times: Vec<Option<NaiveDateTime>> = Vec::with_capacity(list.len());
    let mut urls: Vec<Option<String>> = Vec::with_capacity(list.len());
    let mut related: Vec<Option<String>> = Vec::with_capacity(list.len());
    for item in list {
        let title = item
            .get("title")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SourceError::SchemaDrift("fast news: missing title".into()))?;
        let show_time = item
            .get("showTime")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SourceError::SchemaDrift("fast news: missing showTime".into()))?;
        titles.push(Some(title.to_string()));
        contents.push(
            item.get("summary")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        );
        times.push(parse_cn_datetime(show_time));
        urls.push(item.get("url").and_then(|v| v.as_str()).map(|s| s.to_string()));
        // 关联标的：股票代码数组，保存为 JSON 字符串列
        let codes: Vec<String> = item
            .get("stockList")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.get("code").and_then(|c| c.as_str()))
                    .map(|c| c.to_string())
                    .collect()
            })
            .unwrap_or_default();
        related.push(serde_json::to_string(&codes).ok());
    }
    let height = titles.len();
    DataFrame::new(vec![
        Series::new("title", titles),
        Series::new("content", contents),
        Series::new("source", vec![Some("eastmoney_724".to_string()); height]),
        Series::new("publish_time", times),
        Series::new("url", urls),
        Series::new("related_codes", related),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("fast news frame: {}", e)))
}

async fn fetch_stock_news(
    client: &Client,
    code: &str,
    limit: usize,
) -> Result<DataFrame, SourceError> {
    let limit_s = limit.to_string();
    let resp = client
        .get(EM_STOCK_NEWS_URL)
        .query(&[
            ("client", "web"),
            ("biz", "web_news"),
            ("stock", code),
            ("pageSize", limit_s.as_str()),
            ("pageIndex", "1"),
        ])
        .send()
        .await?;
    let body = resp.text().await?;
    let json: Value = serde_json::from_str(&body)
        .map_err(|e| SourceError::SchemaDrift(format!("stock news: bad json: {}", e)))?;

    let list = json
        .get("data")
        .and_then(|d| d.get("list"))
        .and_then(|l| l.as_array())
        .ok_or_else(|| SourceError::SchemaDrift("stock news: missing data.list".into()))?;
    if list.is_empty() {
        return Err(SourceError::Empty);
    }

    let mut titles: Vec<Option<String>> = Vec::with_capacity(list.len());
    let mut contents: Vec<Option<String>> = Vec::with_capacity(list.len());
    let mut times: Vec<Option<NaiveDateTime>> = Vec::with_capacity(list.len());
    let mut urls: Vec<Option<String>> = Vec::with_capacity(list.len());
    let mut related: Vec<Option<String>> = Vec::with_capacity(list.len());
    let related_json = serde_json::to_string(&[code]).ok();
    for item in list {
        let title = item
            .get("Art_Title")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SourceError::SchemaDrift("stock news: missing Art_Title".into()))?;
        let show_time = item
            .get("Art_ShowTime")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SourceError::SchemaDrift("stock news: missing Art_ShowTime".into()))?;
        titles.push(Some(title.to_string()));
        contents.push(
            item.get("Art_Content")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        );
        times.push(parse_cn_datetime(show_time));
        urls.push(
            item.get("Art_Url")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        );
        related.push(related_json.clone());
    }
    let height = titles.len();
    DataFrame::new(vec![
        Series::new("title", titles),
        Series::new("content", contents),
        Series::new("source", vec![Some("eastmoney_stock".to_string()); height]),
        Series::new("publish_time", times),
        Series::new("url", urls),
        Series::new("related_codes", related),
    ])
    .map_err(|e| SourceError::SchemaDrift(format!("stock news frame: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cn_datetime_parsing() {
        assert!(parse_cn_datetime("2024-01-15 09:30:15").is_some());
        assert!(parse_cn_datetime("2024-01-15 09:30").is_some());
        assert!(parse_cn_datetime("20240115").is_none());
    }

    #[test]
    fn cn_time_maps_to_utc_minus_eight() {
        let naive = NaiveDateTime::parse_from_str("2024-01-15 09:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let utc = cn_time_to_utc(naive);
        assert_eq!(utc.to_rfc3339(), "2024-01-15T01:30:00+00:00");
    }
}
