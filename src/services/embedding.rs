use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::services::errors::{SourceError, SyncError};
use crate::services::source::EmbeddingProvider;
use crate::utils::config::EmbeddingConfig;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

/// 向量服务客户端（OpenAI 兼容 /embeddings 协议）。
/// 只消费 "文本 → 向量" 一个能力，批大小与维度由提供商声明
pub struct EmbeddingClient {
    client: Client,
    cfg: EmbeddingConfig,
}

impl EmbeddingClient {
    pub fn new(client: Client, cfg: EmbeddingConfig) -> Self {
        Self { client, cfg }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SourceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.cfg.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.cfg.api_key)
            .json(&EmbeddingRequest {
                model: &self.cfg.model,
                input: texts,
            })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                429 => SourceError::RateLimited(format!("embedding status {}", status)),
                500..=599 => SourceError::UpstreamUnavailable(format!("embedding status {}", status)),
                _ => SourceError::Unknown(format!("embedding status {}", status)),
            });
        }
        let body: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::SchemaDrift(format!("embedding: bad json: {}", e)))?;
        if body.data.len() != texts.len() {
            return Err(SourceError::SchemaDrift(format!(
                "embedding: {} inputs but {} vectors",
                texts.len(),
                body.data.len()
            )));
        }
        for item in &body.data {
            if item.embedding.len() != self.cfg.dimension {
                return Err(SourceError::SchemaDrift(format!(
                    "embedding: expected dim {}, got {}",
                    self.cfg.dimension,
                    item.embedding.len()
                )));
            }
        }
        Ok(body.data.into_iter().map(|i| i.embedding).collect())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for EmbeddingClient {
    fn max_batch_size(&self) -> usize {
        self.cfg.batch_size
    }

    fn dimension(&self) -> usize {
        self.cfg.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SyncError> {
        Ok(self.embed_batch(texts).await?)
    }
}
