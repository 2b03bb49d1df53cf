use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use flowmap_core::Settings;

use crate::ContextBuildError;

/// Computes one embedding vector per input text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ContextBuildError>;
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embeddings from a local Ollama server (`POST /api/embed`).
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            batch_size: 32,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.ollama_url, &settings.embedding_model)
            .with_batch_size(settings.embed_batch_size)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ContextBuildError> {
        let request = OllamaEmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| ContextBuildError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ContextBuildError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| ContextBuildError::Request(format!("parse embed response: {e}")))?;

        if data.embeddings.len() != texts.len() {
            return Err(ContextBuildError::CountMismatch {
                expected: texts.len(),
                got: data.embeddings.len(),
            });
        }
        Ok(data.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ContextBuildError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        log::debug!("embedded {} texts with {}", texts.len(), self.model);
        Ok(vectors)
    }
}
