use std::collections::HashMap;

use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer, TokenStream};

fn build_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default()).filter(LowerCaser).build()
}

/// Case-folded, punctuation-free token sequence of `text`.
///
/// Idempotent: `normalize(&normalize_to_text(&normalize(t))) == normalize(t)`.
pub fn normalize(text: &str) -> Vec<String> {
	let mut analyzer = build_analyzer();
	let mut stream = analyzer.token_stream(text);
	let mut tokens = Vec::new();
	while stream.advance() {
		// Lowercasing can emit combining marks (e.g. for 'İ'); drop them so a
		// second pass sees the same tokens.
		for part in stream.token().text.split(|c: char| !c.is_alphanumeric()) {
			if !part.is_empty() {
				tokens.push(part.to_string());
			}
		}
	}
	tokens
}

pub fn normalize_to_text(tokens: &[String]) -> String {
	tokens.join(" ")
}

pub fn term_frequencies(tokens: &[String]) -> HashMap<String, u32> {
	let mut freqs = HashMap::new();
	for t in tokens {
		*freqs.entry(t.clone()).or_insert(0) += 1;
	}
	freqs
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn folds_case_and_strips_punctuation() {
		assert_eq!(normalize("Refund-Policy: READ it, please!"), vec!["refund", "policy", "read", "it", "please"]);
		assert!(normalize("  ...  ").is_empty());
		assert!(normalize("").is_empty());
	}

	#[test]
	fn normalization_is_idempotent() {
		for text in ["Ünïcode Straße, naïve café.", "İstanbul's 2nd-hand shops", "tabs\tand\nnewlines"] {
			let once = normalize(text);
			assert_eq!(normalize(&normalize_to_text(&once)), once, "{text}");
		}
	}

	#[test]
	fn counts_terms() {
		let tokens = normalize("refund the refund");
		let tf = term_frequencies(&tokens);
		assert_eq!(tf.get("refund"), Some(&2));
		assert_eq!(tf.get("the"), Some(&1));
	}
}
