use anyhow::{anyhow, Result};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use twox_hash::XxHash64;

use ragdb_core::config::EmbeddingSettings;
use ragdb_core::traits::Embedder;
use ragdb_text::normalize;

/// Deterministic feature-hashing embedder.
///
/// Each normalized token lands in one of `dim` buckets with a hash-derived
/// sign; the result is L2-normalized. Texts sharing vocabulary get a
/// positive cosine similarity, which is enough for local and offline use.
pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("hashing:xxh64:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in normalize(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v { *x /= norm; }
        }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Embedder selected by the `[embedding]` configuration section.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    match settings.provider.as_str() {
        "hashing" => {
            tracing::info!(dim = settings.dim, "Using hashing embedder");
            Ok(Arc::new(HashingEmbedder::new(settings.dim)))
        }
        other => Err(anyhow!("Unknown embedding provider '{other}'")),
    }
}
