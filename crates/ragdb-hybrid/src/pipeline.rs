//! Async query pipeline.
//!
//! Per query: Received → Normalizing → Embedding → Retrieving → Fusing →
//! Filtering → Assembling → Done. Validation and embedding failures end the
//! query; per-index failures become warnings on an otherwise successful
//! response.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use ragdb_core::config::RetrievalSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::{Embedder, IndexStore};
use ragdb_core::types::{IndexSnapshot, ScoredCandidate, SearchMode};
use ragdb_text::{normalize, search_keyword, KeywordScorer};
use ragdb_vector::{search_vector, EmbeddingCache};

use crate::api::{HealthStatus, QueryRequest, QueryResponse, QueryResultItem};
use crate::context::assemble;
use crate::fusion;

/// Candidates fetched per retriever, as a multiple of k, before hybrid fusion.
const HYBRID_FETCH_FACTOR: usize = 2;

/// A request that passed validation.
#[derive(Debug, Clone)]
struct Plan {
    indexes: Vec<String>,
    query: String,
    mode: SearchMode,
    k: usize,
    min_score: f32,
    warnings: Vec<String>,
}

pub struct QueryEngine {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn Embedder>,
    cache: Option<Arc<EmbeddingCache>>,
    settings: RetrievalSettings,
}

impl QueryEngine {
    /// Builds an engine with its own embedding cache when caching is enabled.
    pub fn new(store: Arc<dyn IndexStore>, embedder: Arc<dyn Embedder>, settings: RetrievalSettings) -> Self {
        let cache = settings.cache_enabled.then(|| Arc::new(EmbeddingCache::new(settings.cache_size)));
        Self { store, embedder, cache, settings }
    }

    /// Replaces the embedding cache, e.g. to share one between engines.
    pub fn with_cache(mut self, cache: Option<Arc<EmbeddingCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> Option<&Arc<EmbeddingCache>> {
        self.cache.as_ref()
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub fn health(&self) -> Result<HealthStatus> {
        Ok(HealthStatus { status: "healthy".to_string(), indexes_count: self.store.list_indexes()?.len() })
    }

    /// Runs a query and always produces a response; whole-query failures
    /// come back with `success: false` and a displayable message.
    pub async fn query(&self, request: &QueryRequest, cancel: &CancellationToken) -> QueryResponse {
        let started = Instant::now();
        match self.execute(request, cancel).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, query = %request.query, "query failed");
                QueryResponse::failure(request.mode.trim().to_ascii_lowercase(), &e, started.elapsed())
            }
        }
    }

    pub async fn execute(&self, request: &QueryRequest, cancel: &CancellationToken) -> Result<QueryResponse> {
        let started = Instant::now();
        tracing::debug!(stage = "received", indexes = ?request.index_names, mode = %request.mode);
        let plan = self.plan(request)?;

        tracing::debug!(stage = "normalizing");
        let tokens = Arc::new(normalize(&plan.query));

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let (query_vec, cache_hit) = if plan.mode.needs_embedding() {
            tracing::debug!(stage = "embedding");
            let (v, hit) = self.embed_query(&plan.query, cancel).await?;
            (Some(v), hit)
        } else {
            (None, false)
        };

        tracing::debug!(stage = "retrieving", indexes = plan.indexes.len());
        let retrievals = plan
            .indexes
            .iter()
            .map(|name| self.retrieve(name.clone(), Arc::clone(&tokens), query_vec.clone(), plan.mode, plan.k, cancel));
        let outcomes = join_all(retrievals).await;

        let mut warnings = plan.warnings.clone();
        let mut per_index = Vec::new();
        let mut missing = 0usize;
        let mut partial = false;
        for (name, outcome) in plan.indexes.iter().zip(outcomes) {
            match outcome {
                Ok(candidates) => per_index.push(candidates),
                Err(e) if e.is_per_index() => {
                    tracing::warn!(index = %name, error = %e, "index skipped");
                    if matches!(e, Error::IndexNotFound(_)) {
                        missing += 1;
                    }
                    partial = true;
                    warnings.push(e.display_message());
                }
                Err(e) => return Err(e),
            }
        }
        if missing == plan.indexes.len() {
            return Err(Error::IndexNotFound(plan.indexes.join(", ")));
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tracing::debug!(stage = "fusing");
        let indexes_searched = per_index.len();
        let merged = fusion::merge(per_index, plan.k);

        tracing::debug!(stage = "filtering", candidates = merged.len(), min_score = plan.min_score);
        let assembled = assemble(merged, plan.min_score, self.settings.max_context_chars);
        tracing::debug!(stage = "assembling", included = assembled.results.len(), filtered_out = assembled.filtered_out);

        let results: Vec<QueryResultItem> = assembled.results.into_iter().map(QueryResultItem::from).collect();
        let query_time = started.elapsed().as_secs_f64();
        tracing::info!(
            mode = %plan.mode,
            results = results.len(),
            context_length = assembled.context_length,
            cache_hit,
            partial,
            query_time,
            "query done"
        );
        Ok(QueryResponse {
            success: true,
            total_results: results.len(),
            results,
            mode: plan.mode.as_str().to_string(),
            query_time,
            context_length: assembled.context_length,
            indexes_searched,
            indexes_used: assembled.indexes_used,
            partial,
            warnings,
            cache_hit,
            context: assembled.context,
            error: None,
        })
    }

    fn plan(&self, request: &QueryRequest) -> Result<Plan> {
        let mut seen = HashSet::new();
        let indexes: Vec<String> = request
            .index_names
            .iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty() && seen.insert(n.clone()))
            .collect();
        if indexes.is_empty() {
            return Err(Error::InvalidRequest("at least one index name is required".into()));
        }

        let query = request.query.trim();
        if query.is_empty() {
            return Err(Error::InvalidRequest("query text must not be empty".into()));
        }
        let mode: SearchMode = request.mode.parse()?;

        let mut warnings = Vec::new();
        let k = match request.k {
            None => self.settings.default_k,
            Some(k) if k <= 0 => return Err(Error::InvalidRequest(format!("k must be positive, got {k}"))),
            Some(k) => {
                let k = usize::try_from(k).unwrap_or(usize::MAX);
                if k > self.settings.max_k {
                    warnings.push(format!("k={k} exceeds the maximum; using {}", self.settings.max_k));
                    self.settings.max_k
                } else {
                    k
                }
            }
        };

        let min_score = match request.min_score {
            Some(s) if !(0.0..=1.0).contains(&s) => {
                return Err(Error::InvalidRequest(format!("min_score must be within [0, 1], got {s}")))
            }
            Some(s) => s,
            None => request.purpose.default_min_score(&self.settings),
        };

        Ok(Plan { indexes, query: query.to_string(), mode, k, min_score, warnings })
    }

    async fn embed_query(&self, query: &str, cancel: &CancellationToken) -> Result<(Arc<[f32]>, bool)> {
        let embedder = Arc::clone(&self.embedder);
        let cache = self.cache.clone();
        let text = query.to_string();
        let task = tokio::task::spawn_blocking(move || {
            let compute = |t: &str| embedder.embed_text(t);
            match cache {
                Some(cache) => cache.get_or_compute(embedder.embedder_id(), &text, compute),
                None => compute(&text).map(|v| (Arc::from(v), false)),
            }
        });

        let timeout = self.settings.query_timeout();
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = tokio::time::timeout(timeout, task) => match res {
                Err(_) => Err(timeout_error("embedding", timeout)),
                Ok(Err(join)) => Err(Error::EmbeddingFailure(format!("embedding task failed: {join}"))),
                Ok(Ok(Err(e))) => Err(Error::EmbeddingFailure(format!("{e:#}"))),
                Ok(Ok(Ok((vector, hit)))) => {
                    tracing::debug!(cache_hit = hit, dim = vector.len(), "query embedded");
                    Ok((vector, hit))
                }
            },
        }
    }

    async fn retrieve(
        &self,
        name: String,
        tokens: Arc<Vec<String>>,
        query_vec: Option<Arc<[f32]>>,
        mode: SearchMode,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredCandidate>> {
        let store = Arc::clone(&self.store);
        let index = name.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<Vec<ScoredCandidate>> {
            let snapshot = store.snapshot(&index)?;
            Ok(rank_index(&snapshot, &tokens, query_vec.as_deref(), mode, k))
        });

        let timeout = self.settings.query_timeout();
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = tokio::time::timeout(timeout, task) => match res {
                Err(_) => Err(timeout_error(&format!("index '{name}'"), timeout)),
                Ok(Err(join)) => Err(Error::Storage(format!("retrieval for '{name}' failed: {join}"))),
                Ok(Ok(candidates)) => candidates,
            },
        }
    }
}

fn timeout_error(stage: &str, after: Duration) -> Error {
    Error::Timeout { stage: stage.to_string(), after_ms: after.as_millis() as u64 }
}

/// Retrieval and fusion for one index snapshot.
fn rank_index(
    snapshot: &IndexSnapshot,
    tokens: &[String],
    query_vec: Option<&[f32]>,
    mode: SearchMode,
    k: usize,
) -> Vec<ScoredCandidate> {
    if snapshot.is_empty() {
        return Vec::new();
    }
    match (mode, query_vec) {
        (SearchMode::Keyword, _) => fusion::from_keyword(snapshot, &search_keyword(snapshot, tokens, k)),
        (SearchMode::Vector, Some(q)) => fusion::from_vector(snapshot, &search_vector(snapshot, q, k)),
        (SearchMode::Hybrid, Some(q)) => {
            let fetch = k.saturating_mul(HYBRID_FETCH_FACTOR);
            let scorer = KeywordScorer::new(&snapshot.chunks, tokens);
            let keyword_hits = scorer.top_k(fetch);
            let vector_hits = search_vector(snapshot, q, fetch);
            fusion::fuse(snapshot, &vector_hits, &keyword_hits, Some(&scorer), k)
        }
        (_, None) => Vec::new(),
    }
}
