use std::sync::Arc;

use crate::repositories::news;
use crate::runtime::{CancelSignal, JobProgress, TASK_LEVEL_TARGET};
use crate::sync::context::SyncContext;

pub const TASK_NAME: &str = "news_embeddings";

/// 标题参与向量的正文截断长度（字符）
const CONTENT_CLIP: usize = 2000;

/// 新闻向量补齐 (L2)：embedding 为空的文章按
/// 提供商声明的批大小分批送向量服务
pub async fn sync(ctx: Arc<SyncContext>, cancel: CancelSignal) -> anyhow::Result<JobProgress> {
    let batch_size = ctx.embeddings.max_batch_size().max(1);
    let mut progress = JobProgress::default();

    loop {
        cancel.checkpoint()?;
        let pending = {
            let mut conn = ctx.conn()?;
            news::pending_embedding(&mut conn, batch_size as i64)?
        };
        if pending.is_empty() {
            break;
        }
        progress.fetched += pending.len() as u32;

        let texts: Vec<String> = pending
            .iter()
            .map(|a| {
                let clipped: String = a.content.chars().take(CONTENT_CLIP).collect();
                format!("{}\n{}", a.title, clipped)
            })
            .collect();

        let vectors = match ctx.embeddings.embed(&texts).await {
            Ok(v) => v,
            Err(e) => {
                ctx.errors
                    .record_failure(TASK_NAME, TASK_LEVEL_TARGET, e.kind(), &e.to_string());
                return Err(e.into());
            }
        };

        {
            let mut conn = ctx.conn()?;
            for (article, vector) in pending.iter().zip(vectors.iter()) {
                news::set_embedding(&mut conn, article.id, vector)?;
                progress.written += 1;
            }
        }
        progress.accepted += pending.len() as u32;

        if pending.len() < batch_size {
            break;
        }
    }

    if progress.written > 0 {
        ctx.errors.record_success(TASK_NAME, TASK_LEVEL_TARGET);
        tracing::info!("新闻向量生成完成: written={}", progress.written);
    }
    Ok(progress)
}
