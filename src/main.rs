use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use leeksaver::{db, doctor, repositories, scheduler, sync, utils};
use leeksaver::runtime::{DbErrorSink, Job, JobRuntime};
use leeksaver::scheduler::TaskKind;
use leeksaver::services::eastmoney::EastMoneyAdapter;
use leeksaver::services::embedding::EmbeddingClient;
use leeksaver::services::news_source::NewsSource;
use leeksaver::services::rate_gate::RateGate;
use leeksaver::sync::SyncContext;
use leeksaver::utils::config::AppConfig;

#[derive(Parser)]
#[command(name = "leeksaver", about = "LeekSaver A 股数据同步核心")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 启动调度守护进程
    Serve,
    /// 同步任务操作
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// 数据健康巡检
    Doctor {
        #[command(subcommand)]
        action: DoctorAction,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// 即席触发一次同步任务
    Trigger {
        /// 同步器名（如 daily_quotes / symbol_list / financial_statements）
        syncer: String,
        /// 仅同步指定标的
        #[arg(long)]
        code: Option<String>,
        /// 起始日期 YYYY-MM-DD（仅日线）
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// 查看任务状态
    Status {
        #[arg(long)]
        task: Option<String>,
    },
}

#[derive(Subcommand)]
enum DoctorAction {
    /// 同步执行巡检并打印 JSON 报告
    Run,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    utils::logging::init_logging();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("启动失败: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = AppConfig::from_env()?;
    let (ctx, runtime) = build_context(&config)?;

    match cli.command {
        Command::Serve => serve(config, ctx, runtime).await,
        Command::Sync { action } => match action {
            SyncAction::Trigger { syncer, code, date } => {
                trigger(ctx, runtime, &syncer, code, date).await
            }
            SyncAction::Status { task } => status(config, ctx, task),
        },
        Command::Doctor { action } => match action {
            DoctorAction::Run => {
                // 与调度内巡检同构：缺口补录自动下发，跑完再退出
                let report = doctor::run_audit(ctx, Some(runtime.clone())).await?;
                wait_until_drained(&runtime).await;
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(if report.passed { 0 } else { 1 })
            }
        },
    }
}

/// 组合根：全部依赖在此装配一次，再以显式引用传入各组件
fn build_context(config: &AppConfig) -> anyhow::Result<(Arc<SyncContext>, Arc<JobRuntime>)> {
    let db_pool = db::build_pool(&config.database_url, config.db_pool_max)?;
    let client = utils::http_client::create_em_client()?;

    // 每个上游一个限频闸门，桶容量与速率一致
    let gate = Arc::new(RateGate::new(config.sync.rate_qps, config.sync.rate_qps));
    let source = Arc::new(EastMoneyAdapter::new(
        client.clone(),
        gate.clone(),
        config.sync.call_deadline,
        config.sync.industry_source,
    ));
    let news = Arc::new(NewsSource::new(
        client.clone(),
        gate,
        config.sync.call_deadline,
    ));
    let embeddings = Arc::new(EmbeddingClient::new(client, config.embedding.clone()));
    let errors = Arc::new(DbErrorSink::new(db_pool.clone()));

    let realtime = Arc::new(leeksaver::services::realtime::RealtimeCache::new(
        config.schedule.realtime_cache_ttl,
        config.schedule.realtime_stale_grace,
    ));

    let runtime = JobRuntime::start(config.sync.workers, Some(db_pool.clone()), errors.clone());
    let ctx = Arc::new(SyncContext {
        db: db_pool,
        source,
        news,
        embeddings,
        errors,
        realtime,
        sync_cfg: config.sync.clone(),
        news_cfg: config.news.clone(),
    });
    Ok((ctx, runtime))
}

async fn serve(
    config: AppConfig,
    ctx: Arc<SyncContext>,
    runtime: Arc<JobRuntime>,
) -> anyhow::Result<i32> {
    let specs = scheduler::generate_schedule(
        &scheduler::registry(),
        &config.schedule,
        config.financial_schedule,
        config.cleanup_schedule,
    );

    let cron = tokio_cron_scheduler::JobScheduler::new()
        .await
        .map_err(|e| anyhow::anyhow!("创建调度器失败: {}", e))?;
    scheduler::install::install(&cron, specs, ctx, runtime)
        .await
        .map_err(|e| anyhow::anyhow!("装载调度失败: {}", e))?;
    cron.start()
        .await
        .map_err(|e| anyhow::anyhow!("启动调度器失败: {}", e))?;
    tracing::info!("调度器已启动，L1 每日 {:02}:{:02} 执行", config.schedule.l1_daily_time.0, config.schedule.l1_daily_time.1);

    tokio::signal::ctrl_c().await?;
    tracing::info!("收到退出信号，停止调度");
    Ok(0)
}

/// 即席触发：入队后等运行时空转再退出，保证任务真正执行完
async fn trigger(
    ctx: Arc<SyncContext>,
    runtime: Arc<JobRuntime>,
    syncer: &str,
    code: Option<String>,
    date: Option<NaiveDate>,
) -> anyhow::Result<i32> {
    let job = match (resolve_syncer(syncer), code) {
        (Some(TaskKind::DailyQuotes), Some(code)) => {
            let ctx = ctx.clone();
            Job::new("adhoc:daily_quotes", move |_cancel| async move {
                let p = sync::daily_quote::sync_single(&ctx, &code, date, None).await?;
                Ok(p)
            })
        }
        (Some(kind), _) => {
            scheduler::install::build_job(ctx.clone(), runtime.clone(), kind, &format!("adhoc:{}", syncer))
        }
        (None, _) => {
            eprintln!("未知同步器: {}", syncer);
            return Ok(2);
        }
    };

    let submitted = runtime.submit(job).await;
    if !submitted {
        eprintln!("同名任务在途，已跳过");
        return Ok(0);
    }
    println!("已入队: {}", syncer);
    wait_until_drained(&runtime).await;
    Ok(0)
}

/// 等运行时把在途任务全部跑完（含途中追加的子任务）再退出进程
async fn wait_until_drained(runtime: &Arc<JobRuntime>) {
    loop {
        let (submitted, succeeded, failed, cancelled, _) = runtime.metrics().snapshot();
        if succeeded + failed + cancelled >= submitted {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

fn resolve_syncer(name: &str) -> Option<TaskKind> {
    match name {
        "symbol_list" | "stock_list" => Some(TaskKind::SymbolList),
        "daily_quotes" => Some(TaskKind::DailyQuotes),
        "valuation" => Some(TaskKind::Valuation),
        "fund_flow" => Some(TaskKind::FundFlow),
        "margin_trade" => Some(TaskKind::MarginTrade),
        "dragon_tiger" => Some(TaskKind::DragonTiger),
        "northbound_flow" => Some(TaskKind::NorthboundFlow),
        "market_sentiment" => Some(TaskKind::MarketSentiment),
        "sector_quotes" => Some(TaskKind::SectorQuotes),
        "tech_indicators" => Some(TaskKind::TechIndicators),
        "global_news" => Some(TaskKind::GlobalNews),
        "stock_news_rotation" => Some(TaskKind::StockNewsRotation),
        "watchlist_quotes" => Some(TaskKind::WatchlistQuotes),
        "minute_quotes" => Some(TaskKind::MinuteQuotes),
        "news_embeddings" => Some(TaskKind::NewsEmbeddings),
        "financial_statements" => Some(TaskKind::FinancialStatements),
        "news_cleanup" => Some(TaskKind::NewsCleanup),
        "doctor" => Some(TaskKind::DoctorCheck),
        _ => None,
    }
}

/// 任务状态：job_runs 最近一次运行 + 推算的下次触发 + 最近错误
fn status(config: AppConfig, ctx: Arc<SyncContext>, task: Option<String>) -> anyhow::Result<i32> {
    let specs = scheduler::generate_schedule(
        &scheduler::registry(),
        &config.schedule,
        config.financial_schedule,
        config.cleanup_schedule,
    );
    let mut conn = ctx.conn()?;
    let now = chrono::Utc::now();

    for spec in specs {
        if let Some(filter) = &task {
            if spec.task_name != filter.as_str() {
                continue;
            }
        }
        let last = repositories::job_run::latest_by_name(&mut conn, spec.task_name)?;
        let next = scheduler::next_fire(&spec.trigger, now, last.as_ref().map(|r| r.started_at))
            .map(|t| {
                t.with_timezone(&chrono_tz::Asia::Shanghai)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| "-".to_string());

        match last {
            Some(run) => {
                let progress = if run.fetched > 0 {
                    format!("{:.0}%", run.accepted as f64 / run.fetched as f64 * 100.0)
                } else {
                    "-".to_string()
                };
                println!(
                    "{:<40} last={} status={} progress={} next={}",
                    spec.task_name,
                    run.started_at
                        .with_timezone(&chrono_tz::Asia::Shanghai)
                        .format("%Y-%m-%d %H:%M:%S"),
                    run.status,
                    progress,
                    next
                );
                if let Some(err) = run.error_message {
                    println!("{:<40}   error: {}", "", err);
                }
            }
            None => {
                println!("{:<40} last=never next={}", spec.task_name, next);
            }
        }
    }
    Ok(0)
}
