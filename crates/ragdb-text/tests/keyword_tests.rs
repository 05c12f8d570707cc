use ragdb_core::types::{Chunk, IndexSnapshot};
use ragdb_text::{normalize, search_keyword, term_frequencies, KeywordScorer};

fn chunk(i: usize, text: &str) -> Chunk {
    let tokens = normalize(text);
    Chunk {
        id: format!("doc:{i}"),
        doc_id: "doc".to_string(),
        document_name: "policies.txt".to_string(),
        chunk_index: i,
        text: text.to_string(),
        term_freqs: term_frequencies(&tokens),
        tokens,
        embedding: Vec::new(),
        metadata: Default::default(),
    }
}

fn policies() -> IndexSnapshot {
    IndexSnapshot::new(
        "policies",
        vec![
            chunk(0, "Our refund policy allows returns within thirty days."),
            chunk(1, "Shipping is free on orders over fifty dollars."),
            chunk(2, "A refund is issued to the original payment method."),
        ],
    )
}

#[test]
fn refund_policy_keyword_query() {
    let index = policies();
    let hits = search_keyword(&index, &normalize("refund policy"), 2);
    assert!(!hits.is_empty() && hits.len() <= 2);
    for h in &hits {
        assert!((0.0..=1.0).contains(&h.score), "score {} out of range", h.score);
        let tokens = &index.chunks[h.position].tokens;
        assert!(tokens.iter().any(|t| t == "refund" || t == "policy"));
    }
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    // The chunk with both terms ranks first.
    assert_eq!(hits[0].position, 0);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}

#[test]
fn rare_terms_weigh_more_than_common_ones() {
    let index = IndexSnapshot::new(
        "idf",
        vec![
            chunk(0, "policy terms apply"),
            chunk(1, "policy updates monthly"),
            chunk(2, "warranty terms apply"),
        ],
    );
    let scorer = KeywordScorer::new(&index.chunks, &normalize("policy warranty"));
    // "warranty" appears once in the corpus, "policy" twice.
    assert!(scorer.raw(2) > scorer.raw(0));
    assert_eq!(scorer.matching(), 3);
}

#[test]
fn no_matching_token_gives_empty_result() {
    let index = policies();
    assert!(search_keyword(&index, &normalize("zebra"), 5).is_empty());
    assert!(search_keyword(&index, &normalize("?!"), 5).is_empty());
    assert!(search_keyword(&IndexSnapshot::new("empty", vec![]), &normalize("refund"), 5).is_empty());
}

#[test]
fn ties_keep_insertion_order() {
    let index = IndexSnapshot::new(
        "ties",
        vec![chunk(0, "alpha refund"), chunk(1, "beta gamma"), chunk(2, "delta refund"), chunk(3, "omega refund")],
    );
    let hits = search_keyword(&index, &normalize("refund"), 3);
    let positions: Vec<_> = hits.iter().map(|h| h.position).collect();
    assert_eq!(positions, vec![0, 2, 3]);
    assert!(hits.iter().all(|h| (h.score - 1.0).abs() < 1e-6), "equal matches normalize to 1");
}

#[test]
fn repeated_query_tokens_count_once() {
    let index = policies();
    let once = KeywordScorer::new(&index.chunks, &normalize("refund"));
    let twice = KeywordScorer::new(&index.chunks, &normalize("refund refund REFUND"));
    assert!((once.raw(0) - twice.raw(0)).abs() < 1e-6);
}
