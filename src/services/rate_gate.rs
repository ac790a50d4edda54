use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};

use crate::services::errors::{SourceError, SyncError};

/// 重试次数上限
const MAX_ATTEMPTS: u32 = 3;
/// 退避基数
const BACKOFF_BASE: Duration = Duration::from_secs(1);
/// 单次退避上限
const BACKOFF_CAP: Duration = Duration::from_secs(30);

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// 上游限频闸门：令牌桶，容量 C、速率 R 个/秒。
/// 等待期间持有异步锁，后到者按 FIFO 排队
pub struct RateGate {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl RateGate {
    pub fn new(capacity: u32, refill_per_sec: u32) -> Self {
        Self {
            capacity: capacity as f64,
            refill_per_sec: refill_per_sec.max(1) as f64,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// 取走一个令牌，不足则挂起等待补充
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        loop {
            let now = Instant::now();
            let elapsed = now.duration_since(state.last_refill).as_secs_f64();
            state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            state.last_refill = now;

            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                return;
            }

            let deficit = (1.0 - state.tokens) / self.refill_per_sec;
            // 随机抖动，避免风控识别出固定节奏
            let jitter = rand::thread_rng().gen_range(0.05..0.2);
            sleep(Duration::from_secs_f64(deficit + jitter)).await;
        }
    }

    /// 限频 + 重试包装：RateLimited / UpstreamUnavailable（含传输超时）
    /// 按 base * 2^i + jitter(0, base) 退避重试，整体受 deadline 约束。
    /// SchemaDrift / Empty / Unknown 一律不重试
    pub async fn call_with_retry<T, F, Fut>(
        &self,
        op_name: &str,
        deadline: Duration,
        mut op: F,
    ) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let attempts = async {
            let mut attempt: u32 = 0;
            loop {
                self.acquire().await;
                match op().await {
                    Ok(v) => return Ok(v),
                    Err(e) if e.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                        let exp = BACKOFF_BASE
                            .saturating_mul(2u32.saturating_pow(attempt))
                            .min(BACKOFF_CAP);
                        let jitter = Duration::from_secs_f64(
                            rand::thread_rng().gen_range(0.0..BACKOFF_BASE.as_secs_f64()),
                        );
                        attempt += 1;
                        tracing::warn!(
                            "上游调用失败，准备第 {} 次重试: op={}, error={}",
                            attempt,
                            op_name,
                            e
                        );
                        sleep(exp + jitter).await;
                    }
                    Err(e) => return Err(SyncError::Source(e)),
                }
            }
        };

        match timeout(deadline, attempts).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("上游调用整体超时: op={}, deadline={:?}", op_name, deadline);
                Err(SyncError::DeadlineExceeded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn one_minute_window_bounded_by_rate() {
        // C=5, R=5：任意 60 秒窗口内取令牌次数 <= R*60 + C
        let gate = RateGate::new(5, 5);
        let start = Instant::now();
        let mut acquired = 0u32;
        loop {
            gate.acquire().await;
            if start.elapsed() >= Duration::from_secs(60) {
                break;
            }
            acquired += 1;
        }
        assert!(acquired <= 5 * 60 + 5, "acquired = {}", acquired);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds_with_backoff() {
        let gate = RateGate::new(5, 5);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let start = Instant::now();

        let result = gate
            .call_with_retry("test", Duration::from_secs(60), move || {
                let calls = calls_in.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(SourceError::RateLimited("429".into()))
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 两次退避共 base + 2*base = 3s，抖动上限各 1s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed = {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(7), "elapsed = {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn schema_drift_is_not_retried() {
        let gate = RateGate::new(5, 5);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let result: Result<(), SyncError> = gate
            .call_with_retry("test", Duration::from_secs(60), move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::SchemaDrift("missing column".into()))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(SyncError::Source(SourceError::SchemaDrift(_)))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_caps_total_wait() {
        let gate = RateGate::new(5, 5);
        let result: Result<(), SyncError> = gate
            .call_with_retry("test", Duration::from_secs(2), || async {
                Err(SourceError::UpstreamUnavailable("502".into()))
            })
            .await;
        assert!(matches!(result, Err(SyncError::DeadlineExceeded)));
    }
}
