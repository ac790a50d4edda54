use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::db::DbPool;
use crate::models::{NewJobRun, UpdateJobRun};
use crate::repositories::job_run;
use crate::runtime::error_tracker::ErrorSink;
use crate::runtime::job::{cancel_pair, Job, JobProgress, JobStatus};
use crate::services::errors::{SyncError, SyncErrorKind};

/// 任务级错误登记时的占位标的
pub const TASK_LEVEL_TARGET: &str = "*";

#[derive(Debug, Default)]
pub struct PoolMetrics {
    pub submitted: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    pub dedup_skipped: AtomicU64,
}

impl PoolMetrics {
    pub fn snapshot(&self) -> (u64, u64, u64, u64, u64) {
        (
            self.submitted.load(Ordering::Relaxed),
            self.succeeded.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.cancelled.load(Ordering::Relaxed),
            self.dedup_skipped.load(Ordering::Relaxed),
        )
    }
}

/// 任务运行时：W 个 worker 消费同一条任务通道
///
/// dedup_key 相同的任务同一时刻至多一个在运行，重复提交是空操作；
/// 截止时间到达后注入取消信号，由同步器在分片边界协作退出。
/// 任务失败不会击穿 worker：记日志、登记错误、释放工位
pub struct JobRuntime {
    tx: mpsc::Sender<Job>,
    in_flight: Mutex<HashSet<String>>,
    metrics: PoolMetrics,
    db: Option<DbPool>,
    errors: Arc<dyn ErrorSink>,
}

impl JobRuntime {
    pub fn start(
        workers: usize,
        db: Option<DbPool>,
        errors: Arc<dyn ErrorSink>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel::<Job>(256);
        let runtime = Arc::new(Self {
            tx,
            in_flight: Mutex::new(HashSet::new()),
            metrics: PoolMetrics::default(),
            db,
            errors,
        });

        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        for worker_id in 0..workers.max(1) {
            let runtime = runtime.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => runtime.run_one(job, worker_id).await,
                        None => break,
                    }
                }
            });
        }
        runtime
    }

    /// 入队；dedup_key 已在途时丢弃并返回 false
    pub async fn submit(&self, job: Job) -> bool {
        if let Some(key) = &job.dedup_key {
            let mut in_flight = self.in_flight.lock().expect("in_flight poisoned");
            if !in_flight.insert(key.clone()) {
                self.metrics.dedup_skipped.fetch_add(1, Ordering::Relaxed);
                tracing::info!("重复任务已跳过: name={}, dedup_key={}", job.name, key);
                return false;
            }
        }
        self.metrics.submitted.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.tx.send(job).await {
            // 通道关闭只发生在进程退出路径
            tracing::warn!("任务入队失败: {}", e);
            return false;
        }
        true
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    async fn run_one(&self, job: Job, worker_id: usize) {
        let Job {
            name,
            dedup_key,
            deadline,
            run,
        } = job;
        tracing::info!("worker-{} 领取任务: {}", worker_id, name);

        let started = Utc::now();
        let run_id = self.persist_start(&name);

        let (handle, signal) = cancel_pair();
        let fut = run(signal);
        tokio::pin!(fut);

        let outcome = tokio::select! {
            result = &mut fut => result,
            _ = sleep(deadline) => {
                tracing::warn!("任务超时，注入取消信号: name={}, deadline={:?}", name, deadline);
                handle.cancel();
                fut.await
            }
        };

        let (status, progress, error_message) = match outcome {
            Ok(progress) => (JobStatus::Succeeded, progress, None),
            Err(e) => {
                let kind = e
                    .downcast_ref::<SyncError>()
                    .map(|s| s.kind())
                    .unwrap_or(SyncErrorKind::Unknown);
                let status = if kind == SyncErrorKind::Cancelled {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Failed
                };
                (status, JobProgress::default(), Some((kind, e.to_string())))
            }
        };

        match status {
            JobStatus::Succeeded => {
                self.metrics.succeeded.fetch_add(1, Ordering::Relaxed);
                // 任务级错误闭环：同名任务此前整体失败过则标记恢复
                self.errors.record_success(&name, TASK_LEVEL_TARGET);
                tracing::info!(
                    "任务完成: name={}, fetched={}, accepted={}, written={}, errors={}",
                    name,
                    progress.fetched,
                    progress.accepted,
                    progress.written,
                    progress.errors
                );
            }
            JobStatus::Cancelled => {
                self.metrics.cancelled.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("任务已取消: name={}", name);
            }
            _ => {
                self.metrics.failed.fetch_add(1, Ordering::Relaxed);
                if let Some((kind, message)) = &error_message {
                    self.errors
                        .record_failure(&name, TASK_LEVEL_TARGET, *kind, message);
                }
            }
        }

        self.persist_finish(run_id, started, status, progress, error_message.map(|e| e.1));

        if let Some(key) = dedup_key {
            self.in_flight
                .lock()
                .expect("in_flight poisoned")
                .remove(&key);
        }
    }

    fn persist_start(&self, name: &str) -> Option<i32> {
        let pool = self.db.as_ref()?;
        match pool.get() {
            Ok(mut conn) => {
                let row = NewJobRun {
                    job_name: name.to_string(),
                    status: JobStatus::Running.as_str().to_string(),
                    started_at: Utc::now(),
                };
                match job_run::create(&mut conn, &row) {
                    Ok(created) => Some(created.id),
                    Err(e) => {
                        tracing::warn!("创建 job_runs 记录失败: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!("获取连接失败，任务状态未落库: {}", e);
                None
            }
        }
    }

    fn persist_finish(
        &self,
        run_id: Option<i32>,
        started: chrono::DateTime<Utc>,
        status: JobStatus,
        progress: JobProgress,
        error_message: Option<String>,
    ) {
        let (Some(pool), Some(run_id)) = (self.db.as_ref(), run_id) else {
            return;
        };
        let completed = Utc::now();
        let update = UpdateJobRun {
            status: Some(status.as_str().to_string()),
            completed_at: Some(completed),
            fetched: Some(progress.fetched as i32),
            accepted: Some(progress.accepted as i32),
            written: Some(progress.written as i32),
            errors: Some(progress.errors as i32),
            details: None,
            error_message,
            duration_ms: Some((completed - started).num_milliseconds()),
        };
        if let Ok(mut conn) = pool.get() {
            if let Err(e) = job_run::update(&mut conn, run_id, &update) {
                tracing::warn!("更新 job_runs 记录失败: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::errors::SyncErrorKind;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    struct NullSink;
    impl ErrorSink for NullSink {
        fn record_failure(&self, _: &str, _: &str, _: SyncErrorKind, _: &str) {}
        fn record_success(&self, _: &str, _: &str) {}
    }

    fn test_runtime(workers: usize) -> Arc<JobRuntime> {
        JobRuntime::start(workers, None, Arc::new(NullSink))
    }

    #[tokio::test]
    async fn dedup_key_allows_single_concurrent_run() {
        let runtime = test_runtime(4);
        let runs = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let runs = runs.clone();
            let job = Job::new("backfill", move |_cancel| {
                let runs = runs.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(JobProgress::default())
                }
            })
            .with_dedup_key("backfill:daily_quotes:h1");
            runtime.submit(job).await;
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.metrics().dedup_skipped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn dedup_key_free_after_completion() {
        let runtime = test_runtime(2);
        let runs = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let runs = runs.clone();
            let job = Job::new("backfill", move |_cancel| {
                let runs = runs.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(JobProgress::default())
                }
            })
            .with_dedup_key("backfill:daily_quotes:h2");
            runtime.submit(job).await;
            // 等第一个跑完，key 应已释放
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(runtime.metrics().dedup_skipped.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn deadline_cancels_between_shards() {
        let runtime = test_runtime(1);
        let shards_done = Arc::new(AtomicU32::new(0));

        let shards = shards_done.clone();
        let job = Job::new("slow_sync", move |cancel| {
            let shards = shards.clone();
            async move {
                for _ in 0..100 {
                    // 分片边界检查取消信号
                    cancel.checkpoint().map_err(anyhow::Error::from)?;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    shards.fetch_add(1, Ordering::SeqCst);
                }
                Ok(JobProgress::default())
            }
        })
        .with_deadline(Duration::from_millis(120));
        runtime.submit(job).await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        let done = shards_done.load(Ordering::SeqCst);
        assert!(done >= 1 && done < 100, "shards done = {}", done);
        assert_eq!(runtime.metrics().cancelled.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn failure_releases_worker() {
        let runtime = test_runtime(1);

        let job = Job::new("broken", |_cancel| async {
            Err(anyhow::anyhow!("boom"))
        });
        runtime.submit(job).await;

        let ran = Arc::new(AtomicU32::new(0));
        let ran_in = ran.clone();
        let job = Job::new("after_broken", move |_cancel| {
            let ran = ran_in.clone();
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(JobProgress::default())
            }
        });
        runtime.submit(job).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.metrics().failed.load(Ordering::Relaxed), 1);
    }
}
