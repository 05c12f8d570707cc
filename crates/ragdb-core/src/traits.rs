use std::sync::Arc;

use crate::error::Result;
use crate::types::{Chunk, DocumentInfo, IndexInfo, IndexSnapshot};

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (part of the embedding cache key).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_text(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Index management collaborator. The query path only calls `snapshot`.
pub trait IndexStore: Send + Sync {
    fn list_indexes(&self) -> Result<Vec<IndexInfo>>;
    fn create_index(&self, name: &str) -> Result<IndexInfo>;
    fn delete_index(&self, name: &str) -> Result<()>;
    fn get_index(&self, name: &str) -> Result<IndexInfo>;
    fn snapshot(&self, name: &str) -> Result<Arc<IndexSnapshot>>;

    fn add_document(&self, index: &str, document: DocumentInfo, chunks: Vec<Chunk>) -> Result<()>;
    fn list_documents(&self, index: &str) -> Result<Vec<DocumentInfo>>;
    fn get_document(&self, index: &str, document_id: &str) -> Result<DocumentInfo>;
    fn delete_document(&self, index: &str, document_id: &str) -> Result<DocumentInfo>;
}

