//! In-memory similarity index over embedded resume chunks.
//!
//! Rebuilt from scratch every run; nothing is persisted.

use tracing::info;

use crate::errors::AppError;
use crate::llm_client::LlmClient;

/// Chunks per embeddings request.
const EMBED_BATCH_SIZE: usize = 64;
/// Number of chunks handed to the letter prompt.
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone)]
pub struct ResumeChunk {
    pub chunk_id: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct ResumeIndex {
    chunks: Vec<ResumeChunk>,
    dimension: Option<usize>,
}

impl ResumeIndex {
    /// Embeds `texts` in batches and indexes them in order.
    pub async fn build(llm: &LlmClient, texts: Vec<String>) -> Result<Self, AppError> {
        let mut index = ResumeIndex::default();
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let embeddings = llm.embed(batch).await?;
            for (text, embedding) in batch.iter().zip(embeddings) {
                index.insert(text.clone(), embedding)?;
            }
        }
        info!(
            "Indexed {} resume chunk(s) (dimension {:?})",
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    pub fn insert(&mut self, text: String, embedding: Vec<f32>) -> Result<(), AppError> {
        match self.dimension {
            Some(expected) if expected != embedding.len() => {
                return Err(AppError::Resume(format!(
                    "Embedding dimension mismatch: expected {expected}, got {}",
                    embedding.len()
                )));
            }
            None => self.dimension = Some(embedding.len()),
            _ => {}
        }
        let chunk_id = self.chunks.len();
        self.chunks.push(ResumeChunk {
            chunk_id,
            text,
            embedding,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Returns up to `top_k` chunks ordered by descending cosine similarity.
    /// Ties keep insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(&ResumeChunk, f32)> {
        let mut scored: Vec<(&ResumeChunk, f32)> = self
            .chunks
            .iter()
            .map(|c| (c, cosine_similarity(query, &c.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        scored
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
