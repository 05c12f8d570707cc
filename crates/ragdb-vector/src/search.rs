use ragdb_core::types::IndexSnapshot;

/// Vector hit against an index snapshot. `position` indexes `snapshot.chunks`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub position: usize,
    /// Cosine similarity mapped into [0, 1] via `(cos + 1) / 2`.
    pub score: f32,
    pub cosine: f32,
}

/// Cosine similarity; 0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na <= 0.0 || nb <= 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0)
}

/// Top-k chunks of `snapshot` by similarity to `query`, descending. Equal
/// scores keep chunk insertion order.
pub fn search_vector(snapshot: &IndexSnapshot, query: &[f32], k: usize) -> Vec<VectorHit> {
    if snapshot.is_empty() || k == 0 {
        return Vec::new();
    }
    let mut skipped = 0usize;
    let mut hits: Vec<VectorHit> = Vec::with_capacity(snapshot.chunks.len());
    for (position, chunk) in snapshot.chunks.iter().enumerate() {
        if chunk.embedding.len() != query.len() {
            skipped += 1;
            continue;
        }
        let cosine = cosine_similarity(query, &chunk.embedding);
        hits.push(VectorHit { position, score: ((cosine + 1.0) / 2.0).clamp(0.0, 1.0), cosine });
    }
    if skipped > 0 {
        tracing::warn!(index = %snapshot.name, skipped, dim = query.len(), "chunks without a matching embedding were skipped");
    }
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(k);
    tracing::debug!(index = %snapshot.name, returned = hits.len(), "vector search");
    hits
}
