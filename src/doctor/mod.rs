use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::models::NewDoctorReport;
use crate::repositories::{doctor_report, market_data, stock};
use crate::runtime::{Job, JobRuntime};
use crate::sync::context::SyncContext;
use crate::sync::scope::{shard_codes, shard_fingerprint};
use crate::sync::daily_quote;
use crate::utils::trading_day::{freshness_allowance, latest_trading_day, today_cn};

/// 覆盖率红线
const COVERAGE_TARGET: f64 = 0.95;
/// 行业元数据完整率红线
const METADATA_TARGET: f64 = 0.9;
/// 质量检查回看天数
const QUALITY_WINDOW_DAYS: u64 = 3;
/// 补录分片上限
const BACKFILL_SHARD_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub metric: String,
    /// healthy | warning | critical
    pub status: String,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AuditReport {
    pub run_date: NaiveDate,
    pub check_date: NaiveDate,
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub missing_total: usize,
    pub backfill_shards: usize,
}

/// 数据医生：覆盖率 / 新鲜度 / 元数据完整性 / 质量巡检，
/// 缺口按分片下发补录任务；同指纹分片靠 dedup_key 保证不并跑
pub async fn run_audit(
    ctx: Arc<SyncContext>,
    runtime: Option<Arc<JobRuntime>>,
) -> anyhow::Result<AuditReport> {
    let today = today_cn();
    let check_date = latest_trading_day(today - Days::new(1));
    tracing::info!("开始数据健康巡检: check_date={}", check_date);

    let mut checks = Vec::new();
    let mut missing: Vec<String> = Vec::new();

    {
        let mut conn = ctx.conn()?;

        // 1. 覆盖率：股票与 ETF 分开统计，缺失代码精确到标的
        let synced: HashSet<String> = market_data::codes_with_bar_on(&mut conn, check_date)?
            .into_iter()
            .collect();
        for asset_type in ["stock", "etf"] {
            let all = stock::active_codes(&mut conn, Some(asset_type))?;
            let total = all.len();
            if total == 0 {
                checks.push(check(
                    format!("{}_coverage", asset_type),
                    "healthy",
                    1.0,
                    COVERAGE_TARGET,
                    format!("无活跃 {} 标的", asset_type),
                ));
                continue;
            }
            let mut absent: Vec<String> =
                all.into_iter().filter(|c| !synced.contains(c)).collect();
            let covered = total - absent.len();
            let coverage = covered as f64 / total as f64;
            let status = if coverage >= COVERAGE_TARGET {
                "healthy"
            } else if coverage >= 0.8 {
                "warning"
            } else {
                "critical"
            };
            checks.push(check(
                format!("{}_coverage", asset_type),
                status,
                coverage,
                COVERAGE_TARGET,
                format!(
                    "{} 覆盖率 {:.1}% ({}/{})",
                    asset_type,
                    coverage * 100.0,
                    covered,
                    total
                ),
            ));
            if coverage < COVERAGE_TARGET {
                missing.append(&mut absent);
            }
        }

        // 2. 新鲜度：最新交易日距今的滞后
        let latest = market_data::max_trade_date(&mut conn)?;
        match latest {
            Some(latest) => {
                // 周末以最近交易日为基准，避免误报
                let lag = (latest_trading_day(today) - latest).num_days();
                let allowed = freshness_allowance(today);
                let status = if lag <= allowed { "healthy" } else { "critical" };
                checks.push(check(
                    "freshness".to_string(),
                    status,
                    lag as f64,
                    allowed as f64,
                    format!("最新日线 {} (滞后 {} 天)", latest, lag),
                ));
            }
            None => checks.push(check(
                "freshness".to_string(),
                "critical",
                // JSON 序列化不接受无穷，用明显越界的哨兵值
                9999.0,
                1.0,
                "库内无任何日线数据".to_string(),
            )),
        }

        // 3. 行业元数据完整性
        let (with_industry, total) = stock::active_with_industry_count(&mut conn)?;
        let ratio = if total > 0 {
            with_industry as f64 / total as f64
        } else {
            1.0
        };
        let status = if ratio >= METADATA_TARGET {
            "healthy"
        } else {
            "warning"
        };
        checks.push(check(
            "metadata".to_string(),
            status,
            ratio,
            METADATA_TARGET,
            format!("行业覆盖率 {:.1}%", ratio * 100.0),
        ));

        // 4. 质量：近 3 天违反不变量的行数，期望为 0
        let since = today - Days::new(QUALITY_WINDOW_DAYS);
        let abnormal = market_data::quality_violations_since(&mut conn, since)?;
        let status = if abnormal == 0 { "healthy" } else { "warning" };
        checks.push(check(
            "quality".to_string(),
            status,
            abnormal as f64,
            0.0,
            format!("最近 {} 天异常记录 {} 条", QUALITY_WINDOW_DAYS, abnormal),
        ));
    }

    // 精准补录：缺失标的分片下发，dedup_key 保证同指纹分片不并跑
    let shards = shard_codes(&missing, BACKFILL_SHARD_SIZE);
    let mut submitted = 0usize;
    if let Some(runtime) = &runtime {
        for shard in &shards {
            let fingerprint = shard_fingerprint(shard);
            let dedup_key = format!("backfill:daily_quotes:{}", fingerprint);
            let ctx = ctx.clone();
            let shard = shard.clone();
            let job = Job::new("backfill:daily_quotes", move |_cancel| async move {
                let progress = daily_quote::sync_shard(&ctx, &shard).await?;
                Ok(progress)
            })
            .with_dedup_key(dedup_key);
            if runtime.submit(job).await {
                submitted += 1;
            }
        }
        if !missing.is_empty() {
            tracing::info!(
                "已下发补录任务: missing={}, shards={}, submitted={}",
                missing.len(),
                shards.len(),
                submitted
            );
        }
    }

    let has_critical = checks.iter().any(|c| c.status == "critical");
    let passed = !has_critical && missing.is_empty();
    let report = AuditReport {
        run_date: today,
        check_date,
        passed,
        checks,
        missing_total: missing.len(),
        backfill_shards: shards.len(),
    };

    for c in &report.checks {
        tracing::info!("[{}] {}", c.status.to_uppercase(), c.message);
    }

    // 巡检结果落库供运维回看，动作本身已自动执行
    {
        let mut conn = ctx.conn()?;
        let row = NewDoctorReport {
            run_date: report.run_date,
            passed: report.passed,
            report: serde_json::to_value(&report)?,
        };
        if let Err(e) = doctor_report::create(&mut conn, &row) {
            tracing::warn!("巡检报告落库失败: {}", e);
        }
    }

    Ok(report)
}

fn check(
    metric: String,
    status: &str,
    value: f64,
    threshold: f64,
    message: String,
) -> CheckResult {
    CheckResult {
        metric,
        status: status.to_string(),
        value,
        threshold,
        message,
    }
}
