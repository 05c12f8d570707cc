use ragdb_core::types::{Chunk, IndexSnapshot};

/// Keyword hit against an index snapshot. `position` indexes `snapshot.chunks`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordHit {
	pub position: usize,
	/// Min-max normalized into [0, 1] across every matching chunk.
	pub score: f32,
	pub raw: f32,
}

/// TF-IDF scores of one query against every chunk of an index.
///
/// `raw = Σ tf(token, chunk) · idf(token) / len(chunk)` over the distinct
/// query tokens, with `idf = ln((N + 1) / (df + 1)) + 1`.
pub struct KeywordScorer {
	raw: Vec<f32>,
	min: f32,
	max: f32,
}

impl KeywordScorer {
	pub fn new(chunks: &[Chunk], query_tokens: &[String]) -> Self {
		let mut terms: Vec<&str> = Vec::new();
		for t in query_tokens {
			if !terms.contains(&t.as_str()) {
				terms.push(t.as_str());
			}
		}

		let n = chunks.len() as f32;
		let idf: Vec<f32> = terms
			.iter()
			.map(|t| {
				let df = chunks.iter().filter(|c| c.term_freqs.contains_key(*t)).count() as f32;
				((n + 1.0) / (df + 1.0)).ln() + 1.0
			})
			.collect();

		let raw: Vec<f32> = chunks
			.iter()
			.map(|c| {
				let len = c.token_count();
				if len == 0 {
					return 0.0;
				}
				let sum: f32 = terms
					.iter()
					.zip(&idf)
					.map(|(t, idf)| c.term_freqs.get(*t).copied().unwrap_or(0) as f32 * idf)
					.sum();
				sum / len as f32
			})
			.collect();

		let (mut min, mut max) = (f32::INFINITY, 0.0f32);
		for &r in raw.iter().filter(|r| **r > 0.0) {
			min = min.min(r);
			max = max.max(r);
		}
		Self { raw, min, max }
	}

	pub fn raw(&self, position: usize) -> f32 {
		self.raw.get(position).copied().unwrap_or(0.0)
	}

	/// Normalized score of the chunk at `position`; chunks without any query
	/// token score 0. When every match scores the same, each gets 1.
	pub fn normalized(&self, position: usize) -> f32 {
		let r = self.raw(position);
		if r <= 0.0 {
			return 0.0;
		}
		let span = self.max - self.min;
		if span <= f32::EPSILON {
			return 1.0;
		}
		((r - self.min) / span).clamp(0.0, 1.0)
	}

	pub fn matching(&self) -> usize {
		self.raw.iter().filter(|r| **r > 0.0).count()
	}

	/// Best `k` matching chunks, descending; ties keep insertion order.
	pub fn top_k(&self, k: usize) -> Vec<KeywordHit> {
		let mut hits: Vec<KeywordHit> = self
			.raw
			.iter()
			.enumerate()
			.filter(|(_, r)| **r > 0.0)
			.map(|(position, &raw)| KeywordHit { position, score: self.normalized(position), raw })
			.collect();
		hits.sort_by(|a, b| b.raw.total_cmp(&a.raw));
		hits.truncate(k);
		hits
	}
}

/// Top-k keyword candidates of `snapshot` for already-normalized query tokens.
pub fn search_keyword(snapshot: &IndexSnapshot, query_tokens: &[String], k: usize) -> Vec<KeywordHit> {
	if snapshot.is_empty() || query_tokens.is_empty() || k == 0 {
		return Vec::new();
	}
	let scorer = KeywordScorer::new(&snapshot.chunks, query_tokens);
	let hits = scorer.top_k(k);
	tracing::debug!(index = %snapshot.name, matching = scorer.matching(), returned = hits.len(), "keyword search");
	hits
}
