use ragdb_core::config::EmbeddingSettings;
use ragdb_core::traits::Embedder;
use ragdb_embed::{get_default_embedder, HashingEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let embedder = get_default_embedder(&EmbeddingSettings::default()).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim follows settings");
    assert_eq!(embedder.dim(), 384);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_vocabulary_is_closer() {
    let embedder = HashingEmbedder::new(256);
    let q = embedder.embed_text("Refund policy").expect("embed");
    let near = embedder.embed_text("our refund policy explained").expect("embed");
    let far = embedder.embed_text("shipping rates for pallets").expect("embed");
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn empty_text_embeds_to_zero_vector() {
    let v = HashingEmbedder::new(8).embed_text("").expect("embed");
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn unknown_provider_is_an_error() {
    let settings = EmbeddingSettings { provider: "remote".to_string(), dim: 8 };
    assert!(get_default_embedder(&settings).is_err());
}
