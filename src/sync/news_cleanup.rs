use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::repositories::{news, stock};
use crate::runtime::{CancelSignal, JobProgress};
use crate::sync::context::SyncContext;

pub const TASK_NAME: &str = "news_cleanup";

/// 过期新闻清理（SPECIAL，每周一次）
///
/// 超过保留期的文章删除；开启自选股保护时，
/// related_stocks 与当前自选股有交集的文章豁免
pub async fn cleanup(ctx: Arc<SyncContext>, _cancel: CancelSignal) -> anyhow::Result<JobProgress> {
    let retention = ctx.news_cfg.retention_days;
    let protect = ctx.news_cfg.protect_watchlist;
    let cutoff = Utc::now() - Duration::days(retention);
    tracing::info!(
        "开始清理过期新闻: retention_days={}, protect_watchlist={}",
        retention,
        protect
    );

    let mut conn = ctx.conn()?;
    let protected: HashSet<String> = if protect {
        stock::watchlist_codes(&mut conn)?.into_iter().collect()
    } else {
        HashSet::new()
    };

    let candidates = news::expired_candidates(&mut conn, cutoff)?;
    let total = candidates.len();
    let doomed: Vec<i32> = candidates
        .into_iter()
        .filter(|(_, related)| !is_protected(related.as_ref(), &protected))
        .map(|(id, _)| id)
        .collect();
    let deleted = news::delete_by_ids(&mut conn, &doomed)?;

    tracing::info!(
        "新闻清理完成: expired={}, deleted={}, protected={}",
        total,
        deleted,
        total - deleted
    );
    Ok(JobProgress {
        fetched: total as u32,
        accepted: doomed.len() as u32,
        written: deleted as u32,
        errors: 0,
    })
}

/// 保护判定：related_stocks JSON 数组与自选股集合有交集
fn is_protected(related: Option<&serde_json::Value>, protected: &HashSet<String>) -> bool {
    if protected.is_empty() {
        return false;
    }
    let Some(serde_json::Value::Array(codes)) = related else {
        return false;
    };
    codes
        .iter()
        .filter_map(|v| v.as_str())
        .any(|code| protected.contains(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn protected_set(codes: &[&str]) -> HashSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn overlap_protects_article() {
        let related = json!(["000001", "600519"]);
        assert!(is_protected(Some(&related), &protected_set(&["600519"])));
    }

    #[test]
    fn no_overlap_allows_deletion() {
        let related = json!(["000002"]);
        assert!(!is_protected(Some(&related), &protected_set(&["600519"])));
    }

    #[test]
    fn missing_related_allows_deletion() {
        assert!(!is_protected(None, &protected_set(&["600519"])));
        let not_array = json!("000001");
        assert!(!is_protected(Some(&not_array), &protected_set(&["000001"])));
    }

    #[test]
    fn disabled_protection_is_empty_set() {
        let related = json!(["600519"]);
        assert!(!is_protected(Some(&related), &HashSet::new()));
    }
}
