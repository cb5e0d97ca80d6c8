//! The embedding model is an external collaborator: this crate only defines
//! the contract it must satisfy and never executes a model itself.

use crate::error::Result;
use async_trait::async_trait;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptType {
    Code,
    Docs,
    Query,
}

/// A vector embedding provider. Implementations wrap whatever runtime the
/// host process has on hand; this crate never loads a model itself.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable model identity, persisted in `metadata.json` so a later search
    /// can detect a model swap (see `model_compat`).
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str, prompt_type: PromptType) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String], prompt_type: PromptType) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text, prompt_type).await?);
        }
        Ok(out)
    }
}

/// Deterministic stand-in used by tests and by any host that has not wired
/// up a real model yet. Produces a hash-derived unit vector, never zero.
pub struct DeterministicTestEmbedder {
    name: String,
    dim: usize,
}

impl DeterministicTestEmbedder {
    pub fn new(name: impl Into<String>, dim: usize) -> Self {
        Self { name: name.into(), dim }
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicTestEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str, _prompt_type: PromptType) -> Result<Vec<f32>> {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();

        let mut vec = Vec::with_capacity(self.dim);
        for i in 0..self.dim {
            let byte = digest[i % digest.len()];
            vec.push((byte as f32 / 255.0) * 2.0 - 1.0);
        }
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        } else {
            vec[0] = 1.0;
        }
        Ok(vec)
    }
}
