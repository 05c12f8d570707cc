//! Request and response shapes of the query endpoint.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use ragdb_core::config::RetrievalSettings;
use ragdb_core::types::{SearchMode, ScoredCandidate};
use ragdb_core::Error;

/// Which caller is asking; selects the default relevance floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryPurpose {
    #[default]
    Search,
    Chat,
}

impl QueryPurpose {
    pub fn default_min_score(self, settings: &RetrievalSettings) -> f32 {
        match self {
            QueryPurpose::Search => settings.min_score,
            QueryPurpose::Chat => settings.chat_min_score,
        }
    }
}

fn default_mode() -> String {
    SearchMode::default().as_str().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub index_names: Vec<String>,
    pub query: String,
    /// Requested result count; `None` uses the configured default.
    #[serde(default)]
    pub k: Option<i64>,
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Overrides the purpose's default relevance floor.
    #[serde(default)]
    pub min_score: Option<f32>,
    #[serde(default)]
    pub purpose: QueryPurpose,
}

impl QueryRequest {
    pub fn new<I, S>(index_names: I, query: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index_names: index_names.into_iter().map(Into::into).collect(),
            query: query.into(),
            k: None,
            mode: default_mode(),
            min_score: None,
            purpose: QueryPurpose::default(),
        }
    }

    pub fn with_k(mut self, k: i64) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode.as_str().to_string();
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_purpose(mut self, purpose: QueryPurpose) -> Self {
        self.purpose = purpose;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub document_name: String,
    pub document_id: String,
    pub chunk_id: String,
    pub index_name: String,
    pub vector_score: f32,
    pub keyword_score: f32,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResultItem {
    pub text: String,
    pub score: f32,
    pub metadata: ResultMetadata,
}

impl From<ScoredCandidate> for QueryResultItem {
    fn from(c: ScoredCandidate) -> Self {
        Self {
            score: c.score,
            metadata: ResultMetadata {
                document_name: c.chunk.document_name,
                document_id: c.chunk.doc_id,
                chunk_id: c.chunk.id,
                index_name: c.index_name,
                vector_score: c.breakdown.vector_score,
                keyword_score: c.breakdown.keyword_score,
                truncated: c.truncated,
            },
            text: c.chunk.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub results: Vec<QueryResultItem>,
    pub total_results: usize,
    pub mode: String,
    /// Wall-clock seconds for the whole pipeline.
    pub query_time: f64,
    pub context_length: usize,
    pub indexes_searched: usize,
    pub indexes_used: usize,
    pub partial: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub cache_hit: bool,
    #[serde(default)]
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    /// Response for a query that failed as a whole; the message is safe to show users.
    pub fn failure(mode: impl Into<String>, error: &Error, elapsed: Duration) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            total_results: 0,
            mode: mode.into(),
            query_time: elapsed.as_secs_f64(),
            context_length: 0,
            indexes_searched: 0,
            indexes_used: 0,
            partial: false,
            warnings: Vec::new(),
            cache_hit: false,
            context: String::new(),
            error: Some(error.display_message()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub indexes_count: usize,
}
