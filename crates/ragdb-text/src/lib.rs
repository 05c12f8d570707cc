//! ragdb-text
//!
//! Query/chunk normalization on a tantivy analyzer and TF-IDF keyword
//! retrieval over precomputed chunk term statistics.

pub mod keyword;
pub mod tokenizer;

pub use keyword::{search_keyword, KeywordHit, KeywordScorer};
pub use tokenizer::{normalize, normalize_to_text, term_frequencies};
