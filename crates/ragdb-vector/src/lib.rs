//! Dense-vector side of retrieval: the query embedding cache, cosine
//! similarity search over index snapshots and the local index store.
pub mod cache;
pub mod search;
pub mod store;

pub use cache::{CacheStats, EmbeddingCache};
pub use search::{cosine_similarity, search_vector, VectorHit};
pub use store::LocalIndexStore;
