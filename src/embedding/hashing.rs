//! Offline feature-hashing embedder.
//!
//! Each whitespace-separated token (lowercased, ASCII punctuation trimmed)
//! is hashed into one of `dims` buckets with a ±1 sign, and the resulting
//! vector is L2-normalised. Texts sharing vocabulary land close together
//! under cosine similarity. The output depends only on the input text, so
//! two builds over the same document rank identically.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;
use crate::error::{RagError, RagResult};

pub(super) const DEFAULT_DIMS: usize = 256;

/// Deterministic bag-of-words embedder that needs no network or model files.
pub struct HashingProvider {
    dims: usize,
}

impl HashingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut word = [0u8; 8];
            word.copy_from_slice(&digest[..8]);
            let h = u64::from_le_bytes(word);
            let bucket = (h % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMS)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn model_name(&self) -> &str {
        "hashing-v1"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        if self.dims == 0 {
            return Err(RagError::EmbeddingService(
                "hashing embedder configured with zero dimensions".to_string(),
            ));
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[tokio::test]
    async fn same_text_same_vector() {
        let p = HashingProvider::default();
        let out = p
            .embed(&["Photosynthesis needs light".into(), "photosynthesis needs LIGHT.".into()])
            .await
            .unwrap();
        assert_eq!(out[0], out[1]);
        assert_eq!(out[0].len(), DEFAULT_DIMS);
    }

    #[tokio::test]
    async fn shared_vocabulary_scores_higher() {
        let p = HashingProvider::new(512);
        let out = p
            .embed(&[
                "What is the capital of Japan?".into(),
                "The capital of Japan is Tokyo.".into(),
                "Plants make food using sunlight and chlorophyll.".into(),
            ])
            .await
            .unwrap();
        let related = cosine_similarity(&out[0], &out[1]);
        let unrelated = cosine_similarity(&out[0], &out[2]);
        assert!(related > unrelated, "{} <= {}", related, unrelated);
    }

    #[tokio::test]
    async fn blank_text_is_zero_vector() {
        let p = HashingProvider::new(8);
        let out = p.embed(&["   ".into()]).await.unwrap();
        assert!(out[0].iter().all(|x| *x == 0.0));
    }
}
