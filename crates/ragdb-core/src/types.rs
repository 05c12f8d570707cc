//! Domain types shared by the retrieval crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// An immutable unit of retrievable text.
///
/// - `id`: `"{doc_id}:{chunk_index}"`, unique within an index
/// - `doc_id`/`document_name`: owning document
/// - `text`: sentence-aligned span produced by the chunker
/// - `tokens`: normalized token sequence of `text`
/// - `term_freqs`: precomputed token counts used by keyword scoring
/// - `embedding`: dense vector computed at ingestion time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub document_name: String,
    pub chunk_index: usize,
    pub text: String,
    pub tokens: Vec<String>,
    pub term_freqs: HashMap<String, u32>,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Meta,
}

impl Chunk {
    /// Number of tokens, the length used to normalize keyword scores.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub total_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub stats: IndexStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentInfo {
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub chunks: usize,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Meta,
}

/// Read-only view of an index handed to the retrievers.
///
/// Chunks keep insertion order; retrievers rely on it for tie-breaking.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pub name: String,
    pub chunks: Vec<Chunk>,
}

impl IndexSnapshot {
    pub fn new(name: impl Into<String>, chunks: Vec<Chunk>) -> Self {
        Self { name: name.into(), chunks }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Vector,
    Keyword,
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Vector => "vector",
            SearchMode::Keyword => "keyword",
            SearchMode::Hybrid => "hybrid",
        }
    }

    pub fn needs_embedding(self) -> bool {
        !matches!(self, SearchMode::Keyword)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(SearchMode::Vector),
            "keyword" => Ok(SearchMode::Keyword),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(Error::InvalidRequest(format!(
                "mode must be one of: vector, keyword, hybrid (got '{other}')"
            ))),
        }
    }
}

/// Per-source components of a candidate's score.
///
/// Ranks are zero-based positions in the originating retriever's result list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub vector_score: f32,
    pub keyword_score: f32,
    pub vector_rank: Option<usize>,
    pub keyword_rank: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub chunk: Chunk,
    pub index_name: String,
    pub score: f32,
    pub breakdown: ScoreBreakdown,
    /// Set when context assembly cut the chunk text at a sentence boundary.
    pub truncated: bool,
}

impl ScoredCandidate {
    pub fn new(chunk: Chunk, index_name: impl Into<String>, score: f32, breakdown: ScoreBreakdown) -> Self {
        Self { chunk, index_name: index_name.into(), score, breakdown, truncated: false }
    }
}
