use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Asia::Shanghai;
use tokio_cron_scheduler::{JobBuilder, JobScheduler};

use crate::doctor;
use crate::runtime::{Job, JobProgress, JobRuntime};
use crate::scheduler::generate::{Trigger, TriggerSpec};
use crate::scheduler::registry::TaskKind;
use crate::sync;
use crate::sync::context::SyncContext;

/// 把触发器集合装到 cron 调度器上：cron 触发用
/// tokio-cron-scheduler（上海时区），间隔触发用错峰的 interval 循环。
/// 每次触发只是向运行时投递任务；同名任务靠 dedup_key 防重入
pub async fn install(
    scheduler: &JobScheduler,
    specs: Vec<TriggerSpec>,
    ctx: Arc<SyncContext>,
    runtime: Arc<JobRuntime>,
) -> Result<(), Box<dyn std::error::Error>> {
    for spec in specs {
        match spec.trigger {
            Trigger::Cron(expr) => {
                let ctx = ctx.clone();
                let runtime = runtime.clone();
                let kind = spec.kind;
                let name = spec.task_name;
                let job = JobBuilder::new()
                    .with_timezone(Shanghai)
                    .with_cron_job_type()
                    .with_schedule(expr.as_str())?
                    .with_run_async(Box::new(move |_uuid, _l| {
                        let ctx = ctx.clone();
                        let runtime = runtime.clone();
                        Box::pin(async move {
                            submit_task(&runtime, ctx, kind, name).await;
                        })
                    }))
                    .build()?;
                scheduler.add(job).await?;
                tracing::info!("已注册 cron 任务: {}", name);
            }
            Trigger::Interval {
                every_seconds,
                initial_delay_seconds,
            } => {
                let ctx = ctx.clone();
                let runtime = runtime.clone();
                let kind = spec.kind;
                let name = spec.task_name;
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(initial_delay_seconds)).await;
                    let mut ticker = tokio::time::interval(Duration::from_secs(every_seconds));
                    loop {
                        ticker.tick().await;
                        submit_task(&runtime, ctx.clone(), kind, name).await;
                    }
                });
                tracing::info!(
                    "已注册间隔任务: {} (every={}s, delay={}s)",
                    name,
                    every_seconds,
                    initial_delay_seconds
                );
            }
        }
    }
    Ok(())
}

/// 任务种类到同步器入口的分发；dedup_key 取任务名，
/// 同名任务同一时刻至多一个在跑
pub async fn submit_task(
    runtime: &Arc<JobRuntime>,
    ctx: Arc<SyncContext>,
    kind: TaskKind,
    name: &str,
) -> bool {
    let job = build_job(ctx, runtime.clone(), kind, name);
    runtime.submit(job).await
}

pub fn build_job(
    ctx: Arc<SyncContext>,
    runtime: Arc<JobRuntime>,
    kind: TaskKind,
    name: &str,
) -> Job {
    let job = match kind {
        TaskKind::SymbolList => {
            Job::new(name, move |cancel| sync::stock_list::sync(ctx, cancel))
        }
        TaskKind::DailyQuotes => {
            Job::new(name, move |cancel| sync::daily_quote::sync_all(ctx, cancel))
        }
        TaskKind::Valuation => Job::new(name, move |cancel| sync::valuation::sync(ctx, cancel)),
        TaskKind::FundFlow => Job::new(name, move |cancel| {
            sync::capital_flow::sync_fund_flow(ctx, cancel)
        }),
        TaskKind::MarginTrade => Job::new(name, move |cancel| {
            sync::capital_flow::sync_margin(ctx, cancel)
        }),
        TaskKind::DragonTiger => Job::new(name, move |cancel| {
            sync::capital_flow::sync_dragon_tiger(ctx, cancel)
        }),
        TaskKind::NorthboundFlow => Job::new(name, move |cancel| {
            sync::capital_flow::sync_northbound(ctx, cancel)
        }),
        TaskKind::MarketSentiment => {
            Job::new(name, move |cancel| sync::sentiment::sync(ctx, cancel))
        }
        TaskKind::SectorQuotes => Job::new(name, move |cancel| sync::sector::sync(ctx, cancel)),
        TaskKind::TechIndicators => Job::new(name, move |cancel| {
            sync::tech_indicator::sync_all(ctx, cancel)
        }),
        TaskKind::GlobalNews => Job::new(name, move |cancel| sync::news::sync_global(ctx, cancel)),
        TaskKind::StockNewsRotation => Job::new(name, move |cancel| {
            sync::news::sync_watchlist_rotation(ctx, cancel)
        }),
        TaskKind::WatchlistQuotes => Job::new(name, move |cancel| {
            sync::daily_quote::sync_watchlist(ctx, cancel)
        }),
        TaskKind::MinuteQuotes => Job::new(name, move |cancel| {
            sync::minute_quote::sync_watchlist(ctx, cancel)
        }),
        TaskKind::NewsEmbeddings => {
            Job::new(name, move |cancel| sync::embeddings::sync(ctx, cancel))
        }
        TaskKind::FinancialStatements => {
            Job::new(name, move |cancel| sync::financial::sync_all(ctx, cancel))
        }
        TaskKind::NewsCleanup => {
            Job::new(name, move |cancel| sync::news_cleanup::cleanup(ctx, cancel))
        }
        TaskKind::DoctorCheck => Job::new(name, move |_cancel| async move {
            doctor::run_audit(ctx, Some(runtime)).await?;
            Ok(JobProgress::default())
        }),
    };
    let name = job.name.clone();
    job.with_dedup_key(name)
}
