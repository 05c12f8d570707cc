use ragdb_core::chunker::{split_sentences, Chunker};
use ragdb_core::config::{Config, RetrievalSettings};
use ragdb_core::Error;

fn policy_text() -> String {
    [
        "Refunds are issued within five business days.",
        "Items must be returned unused.",
        "Shipping costs are not refunded unless the item arrived damaged.",
        "Store credit never expires.",
        "Gift cards cannot be exchanged for cash.",
        "Contact support for any other question about this policy.",
    ]
    .join(" ")
}

#[test]
fn chunks_form_a_sentence_aligned_partition() {
    let text = policy_text();
    let sentences = split_sentences(&text);
    let chunks: Vec<_> = Chunker::new(15, 6).chunks(&text).collect();
    assert!(chunks.len() > 1, "text is longer than one chunk");

    // Every chunk is a run of whole sentences.
    for c in &chunks {
        assert_eq!(c.text, sentences[c.start_sentence..=c.end_sentence].join(" "));
        assert!(!c.text.is_empty());
    }

    // Dropping the overlapping prefix of each chunk reconstructs the sentence list.
    let mut rebuilt = Vec::new();
    let mut next = 0usize;
    for c in &chunks {
        assert!(c.start_sentence <= next, "no gaps between chunks");
        assert!(c.end_sentence >= next, "every chunk adds a new sentence");
        rebuilt.extend_from_slice(&sentences[next..=c.end_sentence]);
        next = c.end_sentence + 1;
    }
    assert_eq!(rebuilt, sentences);
}

#[test]
fn chunk_size_and_overlap_are_bounded() {
    let text = policy_text();
    let sentences = split_sentences(&text);
    let (size, overlap) = (15, 6);
    let chunks: Vec<_> = Chunker::new(size, overlap).chunks(&text).collect();
    for pair in chunks.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let shared: usize = (cur.start_sentence..=prev.end_sentence)
            .map(|i| sentences[i].split_whitespace().count())
            .sum();
        assert!(shared <= overlap, "overlap of {shared} words exceeds {overlap}");
    }
    for c in &chunks {
        assert!(c.word_count <= size + overlap, "chunk of {} words", c.word_count);
    }
}

#[test]
fn oversized_sentence_becomes_its_own_chunk() {
    let long = format!("Alpha {} end.", "word ".repeat(39).trim_end());
    let text = format!("Short one. {long} Short two.");
    let chunks: Vec<_> = Chunker::new(10, 0).chunks(&text).collect();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[1].text, long);
    assert_eq!(chunks[1].word_count, 41);
}

#[test]
fn chunk_sequence_is_restartable() {
    let text = policy_text();
    let chunker = Chunker::new(12, 4);
    let first: Vec<_> = chunker.chunks(&text).collect();
    let again: Vec<_> = chunker.chunks(&text).collect();
    assert_eq!(first, again);
    let iter = chunker.chunks(&text);
    assert_eq!(iter.clone().count(), iter.count());
}

#[test]
fn config_layers_files_and_env() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        jail.create_file(
            "config.toml",
            r#"
            [retrieval]
            cache_size = 50
            min_score = 0.4

            [storage]
            dir = "/var/lib/ragdb"
            "#,
        )?;
        jail.create_file("config.test.toml", "[retrieval]\nmax_context_chars = 1500\n")?;
        jail.set_env("APP_RETRIEVAL__CACHE_SIZE", "7");

        let config = Config::load().map_err(|e| e.to_string())?;
        let retrieval = config.retrieval().map_err(|e| e.to_string())?;
        assert_eq!(retrieval.cache_size, 7, "env overrides files");
        assert_eq!(retrieval.max_context_chars, 1500, "environment file is merged over config.toml");
        assert!((retrieval.min_score - 0.4).abs() < 1e-6);
        assert!((retrieval.chat_min_score - 0.5).abs() < 1e-6, "unset keys keep defaults");
        assert_eq!(config.storage().map_err(|e| e.to_string())?.dir, "/var/lib/ragdb");
        Ok(())
    });
}

#[test]
fn missing_config_yields_defaults() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        let config = Config::load().map_err(|e| e.to_string())?;
        assert_eq!(config.retrieval().map_err(|e| e.to_string())?, RetrievalSettings::default());
        assert_eq!(config.embedding().map_err(|e| e.to_string())?.provider, "hashing");
        Ok(())
    });
}

#[test]
fn invalid_settings_are_rejected() {
    let bad_overlap = RetrievalSettings { chunk_overlap: 600, ..Default::default() };
    assert!(matches!(bad_overlap.validate(), Err(Error::InvalidConfig(_))));

    let bad_score = RetrievalSettings { min_score: 1.5, ..Default::default() };
    assert!(matches!(bad_score.validate(), Err(Error::InvalidConfig(_))));

    let bad_cache = RetrievalSettings { cache_size: 0, ..Default::default() };
    assert!(matches!(bad_cache.validate(), Err(Error::InvalidConfig(_))));

    let no_cache = RetrievalSettings { cache_enabled: false, cache_size: 0, ..Default::default() };
    assert!(no_cache.validate().is_ok());
}
