//! sync_errors 生命周期契约：失败登记、重试累加、成功闭环。
//! 内存 Sink 实现与 sync_error 仓储相同的 create-or-increment /
//! resolve-all 语义，验证同步器的调用模式满足闭环性质。

use std::sync::{Arc, Mutex};

use leeksaver::runtime::ErrorSink;
use leeksaver::services::errors::SyncErrorKind;

#[derive(Debug, Clone)]
struct Row {
    task: String,
    target: String,
    kind: SyncErrorKind,
    retry_count: i32,
    resolved: bool,
}

#[derive(Default)]
struct MemorySink {
    rows: Mutex<Vec<Row>>,
}

impl MemorySink {
    fn unresolved(&self, task: &str, target: &str) -> Vec<Row> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.task == task && r.target == target && !r.resolved)
            .cloned()
            .collect()
    }

    fn all(&self) -> Vec<Row> {
        self.rows.lock().unwrap().clone()
    }
}

impl ErrorSink for MemorySink {
    fn record_failure(&self, task: &str, target: &str, kind: SyncErrorKind, _message: &str) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.task == task && r.target == target && !r.resolved)
        {
            row.retry_count += 1;
            row.kind = kind;
            return;
        }
        rows.push(Row {
            task: task.to_string(),
            target: target.to_string(),
            kind,
            retry_count: 0,
            resolved: false,
        });
    }

    fn record_success(&self, task: &str, target: &str) {
        let mut rows = self.rows.lock().unwrap();
        for row in rows.iter_mut() {
            if row.task == task && row.target == target && !row.resolved {
                row.resolved = true;
            }
        }
    }
}

#[test]
fn repeated_failures_collapse_into_one_row() {
    let sink = MemorySink::default();
    for _ in 0..3 {
        sink.record_failure(
            "daily_quotes",
            "000002",
            SyncErrorKind::UpstreamUnavailable,
            "502",
        );
    }
    let rows = sink.unresolved("daily_quotes", "000002");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].retry_count, 2);
}

#[test]
fn success_resolves_exactly_one_row_without_orphans() {
    // n 次失败 + 一次成功：恰好一行已闭环，无残留未解决行
    let sink = MemorySink::default();
    for _ in 0..4 {
        sink.record_failure(
            "daily_quotes",
            "000002",
            SyncErrorKind::UpstreamUnavailable,
            "502",
        );
    }
    sink.record_success("daily_quotes", "000002");

    let all = sink.all();
    let resolved: Vec<_> = all.iter().filter(|r| r.resolved).collect();
    assert_eq!(resolved.len(), 1);
    assert!(sink.unresolved("daily_quotes", "000002").is_empty());

    // 后续再次成功不产生新行
    sink.record_success("daily_quotes", "000002");
    assert_eq!(sink.all().len(), 1);
}

#[test]
fn keys_are_isolated_per_task_and_target() {
    let sink = MemorySink::default();
    sink.record_failure("daily_quotes", "000002", SyncErrorKind::RateLimited, "429");
    sink.record_failure("financial_statements", "000002", SyncErrorKind::Unknown, "x");
    sink.record_failure("daily_quotes", "600519", SyncErrorKind::RateLimited, "429");

    sink.record_success("daily_quotes", "000002");

    assert!(sink.unresolved("daily_quotes", "000002").is_empty());
    assert_eq!(sink.unresolved("financial_statements", "000002").len(), 1);
    assert_eq!(sink.unresolved("daily_quotes", "600519").len(), 1);
}

#[test]
fn failure_after_resolution_opens_fresh_row() {
    let sink = MemorySink::default();
    sink.record_failure("daily_quotes", "000002", SyncErrorKind::UpstreamUnavailable, "502");
    sink.record_success("daily_quotes", "000002");
    sink.record_failure("daily_quotes", "000002", SyncErrorKind::UpstreamUnavailable, "502");

    let all = sink.all();
    assert_eq!(all.len(), 2);
    let fresh = sink.unresolved("daily_quotes", "000002");
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].retry_count, 0);
}
