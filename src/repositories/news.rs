use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::db::PgPoolConn;
use crate::models::{NewNewsArticle, NewsArticle};
use crate::repositories::chunk::rows_per_chunk;
use crate::schema::news_articles;
use crate::services::errors::RepoError;

/// 新闻只追加；(source, url) 唯一索引吸收重复
pub fn insert_ignore_many(
    conn: &mut PgPoolConn,
    rows: &[NewNewsArticle],
) -> Result<usize, RepoError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let per_chunk = rows_per_chunk(7);
    let mut written = 0;
    for (index, chunk) in rows.chunks(per_chunk).enumerate() {
        let inserted = conn
            .transaction(|conn| {
                diesel::insert_into(news_articles::table)
                    .values(chunk)
                    .on_conflict_do_nothing()
                    .execute(conn)
            })
            .map_err(|source| RepoError::Chunk { index, source })?;
        written += inserted;
    }
    Ok(written)
}

/// 尚未生成向量的文章，按发布时间从新到旧
pub fn pending_embedding(
    conn: &mut PgPoolConn,
    limit: i64,
) -> Result<Vec<NewsArticle>, RepoError> {
    let rows = news_articles::table
        .filter(news_articles::embedding.is_null())
        .order(news_articles::publish_time.desc())
        .limit(limit)
        .load::<NewsArticle>(conn)?;
    Ok(rows)
}

pub fn set_embedding(
    conn: &mut PgPoolConn,
    article_id: i32,
    vector: &[f32],
) -> Result<usize, RepoError> {
    let updated = diesel::update(news_articles::table.find(article_id))
        .set(news_articles::embedding.eq(Some(vector.to_vec())))
        .execute(conn)?;
    Ok(updated)
}

/// 过期候选：早于 cutoff 的 (id, related_stocks)。
/// 自选股保护的重叠判断在调用方内存中完成
pub fn expired_candidates(
    conn: &mut PgPoolConn,
    cutoff: DateTime<Utc>,
) -> Result<Vec<(i32, Option<serde_json::Value>)>, RepoError> {
    let rows = news_articles::table
        .filter(news_articles::publish_time.lt(cutoff))
        .select((news_articles::id, news_articles::related_stocks))
        .load::<(i32, Option<serde_json::Value>)>(conn)?;
    Ok(rows)
}

pub fn delete_by_ids(conn: &mut PgPoolConn, ids: &[i32]) -> Result<usize, RepoError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut deleted = 0;
    // 删除同样分块，避免超长 IN 列表
    for chunk in ids.chunks(rows_per_chunk(1)) {
        deleted += diesel::delete(news_articles::table.filter(news_articles::id.eq_any(chunk)))
            .execute(conn)?;
    }
    Ok(deleted)
}

pub fn latest_publish_time(conn: &mut PgPoolConn) -> Result<Option<DateTime<Utc>>, RepoError> {
    let ts = news_articles::table
        .select(diesel::dsl::max(news_articles::publish_time))
        .first::<Option<DateTime<Utc>>>(conn)?;
    Ok(ts)
}
