use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::services::errors::SyncError;
use crate::services::transform::CleanStats;

/// 取消信号：运行时在截止时间到达时置位，
/// 同步器只在分片边界检查，分片内不中断
#[derive(Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// 分片边界检查点
    pub fn checkpoint(&self) -> Result<(), SyncError> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// 即席调用用的常开信号；发送端即刻丢弃，值保持 false
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}

pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// 分片/任务进度，逐片累计后写入 job_runs
#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct JobProgress {
    pub fetched: u32,
    pub accepted: u32,
    pub written: u32,
    pub errors: u32,
}

impl JobProgress {
    pub fn merge(&mut self, other: JobProgress) {
        self.fetched += other.fetched;
        self.accepted += other.accepted;
        self.written += other.written;
        self.errors += other.errors;
    }

    pub fn absorb_clean(&mut self, stats: &CleanStats) {
        self.fetched += stats.input as u32;
        self.accepted += stats.accepted as u32;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<JobProgress>> + Send>>;
pub type JobFn = Box<dyn FnOnce(CancelSignal) -> JobFuture + Send>;

/// 运行时的工作单元
pub struct Job {
    pub name: String,
    pub dedup_key: Option<String>,
    pub deadline: Duration,
    pub run: JobFn,
}

/// 默认任务时限，对齐上游整体调度节奏
pub const DEFAULT_JOB_DEADLINE: Duration = Duration::from_secs(3600);

impl Job {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(CancelSignal) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<JobProgress>> + Send + 'static,
    {
        Self {
            name: name.into(),
            dedup_key: None,
            deadline: DEFAULT_JOB_DEADLINE,
            run: Box::new(move |cancel| Box::pin(f(cancel))),
        }
    }

    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}
