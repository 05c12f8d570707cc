//! Score fusion and reranking of vector and keyword candidates.
use std::cmp::Ordering;
use std::collections::HashMap;

use ragdb_core::types::{IndexSnapshot, ScoreBreakdown, ScoredCandidate};
use ragdb_text::{KeywordHit, KeywordScorer};
use ragdb_vector::VectorHit;

pub const VECTOR_WEIGHT: f32 = 0.7;
pub const KEYWORD_WEIGHT: f32 = 1.0 - VECTOR_WEIGHT;

pub fn fused_score(vector_score: f32, keyword_score: f32) -> f32 {
    VECTOR_WEIGHT * vector_score + KEYWORD_WEIGHT * keyword_score
}

/// Descending score, then vector rank, then keyword rank; a missing rank sorts last.
pub fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    let rank = |r: Option<usize>| r.unwrap_or(usize::MAX);
    b.score
        .total_cmp(&a.score)
        .then_with(|| rank(a.breakdown.vector_rank).cmp(&rank(b.breakdown.vector_rank)))
        .then_with(|| rank(a.breakdown.keyword_rank).cmp(&rank(b.breakdown.keyword_rank)))
}

/// Hybrid fusion of one index's candidates.
///
/// Candidates are unioned by chunk; a side that did not retrieve a chunk
/// contributes 0. With `rerank`, every candidate's keyword component is
/// recomputed against the query, so vector-only hits get their real keyword
/// relevance instead of 0.
pub fn fuse(
    snapshot: &IndexSnapshot,
    vector_hits: &[VectorHit],
    keyword_hits: &[KeywordHit],
    rerank: Option<&KeywordScorer>,
    k: usize,
) -> Vec<ScoredCandidate> {
    let mut order: Vec<usize> = Vec::new();
    let mut by_position: HashMap<usize, ScoreBreakdown> = HashMap::new();

    for (rank, hit) in vector_hits.iter().enumerate() {
        let b = by_position.entry(hit.position).or_insert_with(|| {
            order.push(hit.position);
            ScoreBreakdown::default()
        });
        b.vector_score = hit.score;
        b.vector_rank = Some(rank);
    }
    for (rank, hit) in keyword_hits.iter().enumerate() {
        let b = by_position.entry(hit.position).or_insert_with(|| {
            order.push(hit.position);
            ScoreBreakdown::default()
        });
        b.keyword_score = hit.score;
        b.keyword_rank = Some(rank);
    }

    let mut fused: Vec<ScoredCandidate> = order
        .into_iter()
        .filter_map(|position| {
            let chunk = snapshot.chunks.get(position)?;
            let mut breakdown = by_position.get(&position).copied().unwrap_or_default();
            if let Some(scorer) = rerank {
                breakdown.keyword_score = scorer.normalized(position);
            }
            let score = fused_score(breakdown.vector_score, breakdown.keyword_score);
            Some(ScoredCandidate::new(chunk.clone(), snapshot.name.clone(), score, breakdown))
        })
        .collect();

    fused.sort_by(compare_candidates);
    fused.truncate(k);
    fused
}

/// Vector-only ranking: the fused score is the vector score.
pub fn from_vector(snapshot: &IndexSnapshot, hits: &[VectorHit]) -> Vec<ScoredCandidate> {
    hits.iter()
        .enumerate()
        .filter_map(|(rank, hit)| {
            let chunk = snapshot.chunks.get(hit.position)?;
            let breakdown = ScoreBreakdown { vector_score: hit.score, vector_rank: Some(rank), ..Default::default() };
            Some(ScoredCandidate::new(chunk.clone(), snapshot.name.clone(), hit.score, breakdown))
        })
        .collect()
}

/// Keyword-only ranking: the fused score is the keyword score.
pub fn from_keyword(snapshot: &IndexSnapshot, hits: &[KeywordHit]) -> Vec<ScoredCandidate> {
    hits.iter()
        .enumerate()
        .filter_map(|(rank, hit)| {
            let chunk = snapshot.chunks.get(hit.position)?;
            let breakdown = ScoreBreakdown { keyword_score: hit.score, keyword_rank: Some(rank), ..Default::default() };
            Some(ScoredCandidate::new(chunk.clone(), snapshot.name.clone(), hit.score, breakdown))
        })
        .collect()
}

/// Merges per-index rankings (in request order) into one top-k list.
/// Equal candidates keep the order of the index they came from.
pub fn merge(per_index: Vec<Vec<ScoredCandidate>>, k: usize) -> Vec<ScoredCandidate> {
    let mut all: Vec<ScoredCandidate> = per_index.into_iter().flatten().collect();
    all.sort_by(compare_candidates);
    all.truncate(k);
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_core::types::Chunk;

    fn chunk(id: &str, tokens: &[&str]) -> Chunk {
        let tokens: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        let mut term_freqs = HashMap::new();
        for t in &tokens {
            *term_freqs.entry(t.clone()).or_insert(0) += 1;
        }
        Chunk {
            id: id.to_string(),
            doc_id: "doc".to_string(),
            document_name: "doc.txt".to_string(),
            chunk_index: 0,
            text: tokens.join(" "),
            tokens,
            term_freqs,
            embedding: Vec::new(),
            metadata: Default::default(),
        }
    }

    fn snapshot() -> IndexSnapshot {
        IndexSnapshot::new(
            "kb",
            vec![chunk("c0", &["refund", "policy"]), chunk("c1", &["shipping", "rates"]), chunk("c2", &["refund", "window"])],
        )
    }

    fn vh(position: usize, score: f32) -> VectorHit {
        VectorHit { position, score, cosine: score * 2.0 - 1.0 }
    }

    fn kh(position: usize, score: f32) -> KeywordHit {
        KeywordHit { position, score, raw: score }
    }

    #[test]
    fn one_sided_candidates_are_kept_with_zero() {
        let snap = snapshot();
        let fused = fuse(&snap, &[vh(1, 0.9)], &[kh(0, 1.0)], None, 5);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].chunk.id, "c1");
        assert!((fused[0].score - 0.63).abs() < 1e-6);
        assert_eq!(fused[1].chunk.id, "c0");
        assert!((fused[1].score - 0.3).abs() < 1e-6);
        assert_eq!(fused[1].breakdown.vector_score, 0.0);
    }

    #[test]
    fn rerank_scores_vector_only_hits_against_the_query() {
        let snap = snapshot();
        let tokens = vec!["refund".to_string()];
        let scorer = KeywordScorer::new(&snap.chunks, &tokens);
        // c2 was only retrieved by the vector side but contains "refund".
        let fused = fuse(&snap, &[vh(2, 0.6)], &[kh(0, 1.0)], Some(&scorer), 5);
        let c2 = fused.iter().find(|c| c.chunk.id == "c2").expect("c2 kept");
        assert!(c2.breakdown.keyword_score > 0.0);
        assert_eq!(c2.breakdown.keyword_rank, None);
        assert!((c2.score - fused_score(0.6, c2.breakdown.keyword_score)).abs() < 1e-6);
    }

    #[test]
    fn equal_scores_follow_vector_rank() {
        let snap = snapshot();
        let fused = fuse(&snap, &[vh(2, 0.5), vh(0, 0.5), vh(1, 0.5)], &[], None, 3);
        let ids: Vec<&str> = fused.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c0", "c1"]);
    }

    #[test]
    fn merge_is_sorted_and_bounded() {
        let snap = snapshot();
        let a = from_vector(&snap, &[vh(0, 0.9), vh(1, 0.4)]);
        let b = from_vector(&IndexSnapshot::new("other", snap.chunks.clone()), &[vh(2, 0.7)]);
        let merged = merge(vec![a, b], 2);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].chunk.id, "c0");
        assert_eq!(merged[1].index_name, "other");
        assert!(merged.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
