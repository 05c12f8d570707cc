//! Relevance filtering and budgeted context assembly.
use std::collections::HashSet;

use ragdb_core::chunker::{truncate_at_break, truncate_to_sentence};
use ragdb_core::types::ScoredCandidate;

/// Placed between chunk texts; counts toward the context budget.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub results: Vec<ScoredCandidate>,
    pub context: String,
    /// Length of `context` in characters.
    pub context_length: usize,
    /// Candidates dropped by the relevance floor.
    pub filtered_out: usize,
    /// Distinct indexes with at least one included chunk.
    pub indexes_used: usize,
}

/// Drops candidates scoring below `min_score`, then appends chunk texts in
/// rank order while they fit in `max_context_chars`.
///
/// The first chunk that does not fit is cut back to its last whole sentence
/// within the remaining budget and assembly stops there. If not even one of
/// its sentences fits, it is left out, unless it is the top candidate: that
/// one is cut at the last line break or space within the budget and becomes
/// the sole result.
pub fn assemble(candidates: Vec<ScoredCandidate>, min_score: f32, max_context_chars: usize) -> AssembledContext {
    let total = candidates.len();
    let relevant: Vec<ScoredCandidate> = candidates.into_iter().filter(|c| c.score >= min_score).collect();
    let filtered_out = total - relevant.len();
    let sep_len = CONTEXT_SEPARATOR.chars().count();

    let mut results: Vec<ScoredCandidate> = Vec::new();
    let mut used = 0usize;
    for mut candidate in relevant {
        let sep = if results.is_empty() { 0 } else { sep_len };
        let remaining = max_context_chars.saturating_sub(used + sep);
        let len = candidate.chunk.text.chars().count();
        if used + sep < max_context_chars && len <= remaining {
            used += sep + len;
            results.push(candidate);
            continue;
        }
        let cut = match truncate_to_sentence(&candidate.chunk.text, remaining) {
            Some(prefix) if !prefix.is_empty() => Some(prefix),
            // The top candidate is never dropped; without a sentence boundary it is cut hard.
            _ if results.is_empty() => Some(truncate_at_break(&candidate.chunk.text, remaining)),
            _ => None,
        };
        match cut {
            Some(prefix) if !prefix.is_empty() => {
                let prefix = prefix.to_string();
                tracing::debug!(chunk = %candidate.chunk.id, kept = prefix.len(), original = candidate.chunk.text.len(), "truncated chunk");
                candidate.chunk.text = prefix;
                candidate.truncated = true;
                results.push(candidate);
            }
            _ => {
                tracing::debug!(chunk = %candidate.chunk.id, remaining, "no whole sentence fits the remaining context budget");
            }
        }
        break;
    }

    let context = results.iter().map(|c| c.chunk.text.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR);
    let indexes_used = results.iter().map(|c| c.index_name.as_str()).collect::<HashSet<_>>().len();
    AssembledContext { context_length: context.chars().count(), results, context, filtered_out, indexes_used }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_core::types::{Chunk, ScoreBreakdown};

    fn candidate(index: &str, text: &str, score: f32) -> ScoredCandidate {
        let chunk = Chunk {
            id: format!("{index}:{score}"),
            doc_id: "doc".to_string(),
            document_name: "doc.txt".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            tokens: Vec::new(),
            term_freqs: Default::default(),
            embedding: Vec::new(),
            metadata: Default::default(),
        };
        ScoredCandidate::new(chunk, index, score, ScoreBreakdown::default())
    }

    #[test]
    fn filters_below_min_score() {
        let out = assemble(vec![candidate("a", "Kept.", 0.8), candidate("a", "Dropped.", 0.2)], 0.3, 100);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.filtered_out, 1);
        assert_eq!(out.context, "Kept.");
        assert_eq!(out.context_length, 5);
    }

    #[test]
    fn separators_count_toward_the_budget() {
        // 10 + 2 + 10 = 22 chars fits exactly.
        let out = assemble(vec![candidate("a", "Aaaa bbbb.", 0.9), candidate("b", "Cccc dddd.", 0.8)], 0.0, 22);
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.context_length, 22);
        assert_eq!(out.indexes_used, 2);

        let out = assemble(vec![candidate("a", "Aaaa bbbb.", 0.9), candidate("b", "Cccc dddd.", 0.8)], 0.0, 21);
        assert_eq!(out.results.len(), 1);
        assert!(out.context_length <= 21);
    }

    #[test]
    fn stops_after_truncation() {
        let out = assemble(
            vec![
                candidate("a", "First chunk here.", 0.9),
                candidate("a", "Second one. Has two sentences.", 0.8),
                candidate("a", "Third.", 0.7),
            ],
            0.0,
            35,
        );
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[1].chunk.text, "Second one.");
        assert!(out.results[1].truncated);
        assert_eq!(out.context, "First chunk here.\n\nSecond one.");
        assert!(out.context_length <= 35);
    }

    #[test]
    fn oversized_top_candidate_is_cut_to_a_sentence() {
        let out = assemble(vec![candidate("a", "One two three. Four five six seven.", 0.9)], 0.0, 20);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.context, "One two three.");
    }

    #[test]
    fn top_candidate_without_sentence_boundary_is_cut_hard() {
        let rows: Vec<String> = (0..200).map(|i| format!("{i},widget refund,{}", i * 3)).collect();
        let csv = rows.join("\n");
        assert!(csv.chars().count() > 2000);
        let out = assemble(vec![candidate("a", &csv, 0.9), candidate("a", "Next.", 0.8)], 0.0, 2000);
        assert_eq!(out.results.len(), 1);
        assert!(out.results[0].truncated);
        assert!(out.context_length <= 2000 && out.context_length > 1900);
        assert!(csv.starts_with(&out.context));
        assert!(out.context.ends_with(|c: char| c.is_ascii_digit()), "cut at a row boundary");
    }

    #[test]
    fn unfittable_chunk_is_dropped() {
        let out = assemble(vec![candidate("a", "Exactly ten", 0.9), candidate("a", "A much longer sentence.", 0.8)], 0.0, 15);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.context, "Exactly ten");
    }
}
