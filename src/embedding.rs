//! # Embedding Module
//!
//! ## Purpose
//! Sentence embedding collaborators behind a single trait so chunking and
//! retrieval never depend on a concrete model. The engine ships an Ollama
//! HTTP backend plus a deterministic feature-hashing backend for offline
//! operation and tests.
//!
//! ## Input/Output Specification
//! - **Input**: Sentence or chunk text
//! - **Output**: Fixed-dimension `Vec<f32>` embeddings
//! - **Failure model**: backend unavailability at startup is fatal to
//!   ingestion; per-text failures carry a text preview for logging
//!
//! ## Key Features
//! - `Embedder` trait with ordered batch embedding
//! - Cosine similarity over raw vectors
//! - Backend selection driven entirely by injected configuration

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::errors::{RagError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Sentence embedding collaborator
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding vector dimension
    fn dimension(&self) -> usize;

    /// Backend identifier for logging
    fn name(&self) -> &str;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Verify the backend is reachable. Called once before ingestion; a
    /// failure aborts the batch so no partial index is built.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the embedder selected by configuration
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Ollama => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension))),
    }
}

/// Cosine similarity between two vectors. Zero for mismatched lengths or
/// zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Embedder backed by the Ollama embeddings endpoint
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder from configuration
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(RagError::Http)?;

        Ok(Self {
            client,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let preview: String = text.chars().take(60).collect();

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": text,
            }))
            .send()
            .await
            .map_err(|e| RagError::EmbeddingFailed {
                text_preview: preview.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RagError::EmbeddingFailed {
                text_preview: preview,
                reason: format!("backend returned HTTP {}", response.status()),
            });
        }

        let body: OllamaEmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| RagError::EmbeddingFailed {
                    text_preview: preview,
                    reason: e.to_string(),
                })?;

        if body.embedding.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: body.embedding.len(),
            });
        }

        Ok(body.embedding)
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingBackendUnavailable {
                details: format!("{}: {}", self.base_url, e),
            })?
            .error_for_status()
            .map_err(|e| RagError::EmbeddingBackendUnavailable {
                details: format!("{}: {}", self.base_url, e),
            })?;
        Ok(())
    }
}

/// Deterministic feature-hashing embedder.
///
/// Lowercased alphanumeric tokens are hashed into `dimension` buckets and the
/// resulting count vector is L2-normalized. Texts sharing vocabulary get high
/// cosine similarity, which is enough for offline runs and deterministic
/// tests. Not a substitute for a trained model in production.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create a hashing embedder with the given dimension
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "feature-hashing"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}
