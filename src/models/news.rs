use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::schema::news_articles;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = news_articles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewsArticle {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub source: String,
    pub publish_time: DateTime<Utc>,
    pub url: String,
    pub related_stocks: Option<serde_json::Value>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = news_articles)]
pub struct NewNewsArticle {
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub source: String,
    pub publish_time: DateTime<Utc>,
    pub url: String,
    pub related_stocks: Option<serde_json::Value>,
}
