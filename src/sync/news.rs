use std::sync::Arc;

use chrono::{Duration, Utc};
use polars::prelude::*;

use crate::models::NewNewsArticle;
use crate::repositories::{job_run, news, stock};
use crate::runtime::{CancelSignal, JobProgress};
use crate::services::errors::{SourceError, SyncError};
use crate::services::news_source::cn_time_to_utc;
use crate::services::transform::clean_keyed;
use crate::sync::context::SyncContext;
use crate::sync::scope::shard_codes;

pub const GLOBAL_TASK: &str = "global_news";
pub const ROTATION_TASK: &str = "stock_news_rotation";

/// 时间窗回溯重叠量，吸收窗口边缘丢失
const WINDOW_OVERLAP_MINUTES: i64 = 5;
/// 冷启动回看时长
const COLD_START_HOURS: i64 = 24;
/// 轮询时每只股票抓取条数
const PER_STOCK_LIMIT: usize = 5;

/// 全市快讯同步 (L2)：时间窗回溯增量
pub async fn sync_global(ctx: Arc<SyncContext>, _cancel: CancelSignal) -> anyhow::Result<JobProgress> {
    let since = {
        let mut conn = ctx.conn()?;
        job_run::last_success_time(&mut conn, GLOBAL_TASK)?
    }
    .map(|t| t - Duration::minutes(WINDOW_OVERLAP_MINUTES))
    .unwrap_or_else(|| Utc::now() - Duration::hours(COLD_START_HOURS));

    tracing::info!("开始同步全市快讯: since={}", since);
    let df = match ctx.news.news_since(since).await {
        Ok(df) => df,
        Err(SyncError::Source(SourceError::Empty)) => {
            tracing::info!("窗口内无新快讯");
            return Ok(JobProgress::default());
        }
        Err(e) => return Err(e.into()),
    };

    let progress = write_articles(&ctx, df)?;
    tracing::info!(
        "全市快讯同步完成: fetched={}, written={}",
        progress.fetched,
        progress.written
    );
    Ok(progress)
}

/// 自选股个股新闻轮询 (L2)
pub async fn sync_watchlist_rotation(
    ctx: Arc<SyncContext>,
    cancel: CancelSignal,
) -> anyhow::Result<JobProgress> {
    let codes = {
        let mut conn = ctx.conn()?;
        stock::watchlist_codes(&mut conn)?
    };
    if codes.is_empty() {
        tracing::info!("自选股为空，跳过个股新闻轮询");
        return Ok(JobProgress::default());
    }

    let mut progress = JobProgress::default();
    for shard in shard_codes(&codes, ctx.sync_cfg.batch_size) {
        cancel.checkpoint()?;
        for code in &shard {
            match ctx.news.stock_news(code, PER_STOCK_LIMIT).await {
                Ok(df) => {
                    let p = write_articles(&ctx, df)?;
                    progress.merge(p);
                    ctx.errors.record_success(ROTATION_TASK, code);
                }
                Err(SyncError::Source(SourceError::Empty)) => {
                    ctx.errors.record_success(ROTATION_TASK, code);
                }
                Err(e @ SyncError::Source(SourceError::SchemaDrift(_))) => {
                    ctx.errors
                        .record_failure(ROTATION_TASK, code, e.kind(), &e.to_string());
                    return Err(e.into());
                }
                Err(e) => {
                    progress.errors += 1;
                    ctx.errors
                        .record_failure(ROTATION_TASK, code, e.kind(), &e.to_string());
                }
            }
        }
    }
    Ok(progress)
}

/// 清洗（(source, url) 去重）并只追加写入
fn write_articles(ctx: &SyncContext, df: DataFrame) -> Result<JobProgress, SyncError> {
    let (clean, stats) = clean_keyed(df, &["source", "url"])
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("clean: {}", e))))?;
    stats.guard_drift()?;

    let rows = frame_to_rows(&clean)
        .map_err(|e| SyncError::Source(SourceError::SchemaDrift(format!("rows: {}", e))))?;
    let written = {
        let mut conn = ctx.conn()?;
        news::insert_ignore_many(&mut conn, &rows)?
    };

    let mut progress = JobProgress::default();
    progress.absorb_clean(&stats);
    progress.written = written as u32;
    Ok(progress)
}

fn frame_to_rows(df: &DataFrame) -> PolarsResult<Vec<NewNewsArticle>> {
    let titles = df.column("title")?.str()?;
    let contents = df.column("content")?.str()?;
    let sources = df.column("source")?.str()?;
    let times = df
        .column("publish_time")?
        .datetime()?
        .as_datetime_iter()
        .collect::<Vec<_>>();
    let urls = df.column("url")?.str()?;
    let related = df.column("related_codes")?.str()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(title), Some(source), Some(naive), Some(url)) =
            (titles.get(i), sources.get(i), times[i], urls.get(i))
        else {
            continue;
        };
        let related_stocks = related
            .get(i)
            .and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok());
        rows.push(NewNewsArticle {
            title: title.to_string(),
            content: contents.get(i).unwrap_or_default().to_string(),
            summary: None,
            source: source.to_string(),
            publish_time: cn_time_to_utc(naive),
            url: url.to_string(),
            related_stocks,
        });
    }
    Ok(rows)
}
