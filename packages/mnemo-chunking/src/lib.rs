mod html;
mod markdown;
mod text;

use serde_json::{Map, Value};
use unicode_segmentation::UnicodeSegmentation;

pub const DEFAULT_MAX_TOKENS: i64 = 200;
pub const DEFAULT_OVERLAP: i64 = 50;

/// A span of text destined to be embedded as a single vector.
///
/// Standard metadata keys:
///   - `parser`: the strategy actually used ("fallback", "markdown", "html", "html-fallback").
///   - `chunk_index`: 0-based position within the emitted sequence.
///   - `total_chunks`: final count for the content item.
///   - `source_heading`: heading line a markdown chunk belongs to.
///   - `source_tags`: HTML tag path leading to the chunk.
#[derive(Clone, Debug)]
pub struct Chunk {
	pub text: String,
	pub metadata: Map<String, Value>,
}

/// What the chunker needs to know about a content item.
#[derive(Clone, Copy, Debug)]
pub struct ChunkInput<'a> {
	pub body: &'a str,
	pub content_type: &'a str,
	/// Content metadata; a `chunker` key overrides MIME-based dispatch.
	pub metadata: Option<&'a Value>,
}

/// Selects a strategy from the metadata override or the MIME type, runs it,
/// and stamps `parser` and `total_chunks` onto every emitted chunk.
pub fn chunk_content(input: &ChunkInput<'_>, max_tokens: i64, overlap: i64) -> Vec<Chunk> {
	let (max_tokens, overlap) = clamp_params(max_tokens, overlap);
	let mut strategy = input
		.metadata
		.and_then(|meta| meta.get("chunker"))
		.and_then(Value::as_str)
		.map(|name| name.to_lowercase())
		.filter(|name| !name.is_empty());

	if strategy.is_none() {
		let content_type = input.content_type.to_lowercase();

		if content_type.contains("markdown") {
			strategy = Some("markdown".to_string());
		} else if content_type.contains("html") {
			strategy = Some("html".to_string());
		}
	}

	let strategy = strategy.unwrap_or_else(|| "fallback".to_string());
	let (mut chunks, parser) = match strategy.as_str() {
		"markdown" => (markdown::chunk(input.body, max_tokens, overlap), "markdown"),
		"html" => html::chunk(input.body, max_tokens, overlap),
		"fallback" => (text::chunk(input.body, max_tokens, overlap), "fallback"),
		other => {
			tracing::warn!(chunker = other, "Unknown chunker requested; using fallback.");

			(text::chunk(input.body, max_tokens, overlap), "fallback")
		},
	};
	let total = chunks.len() as i64;

	for chunk in &mut chunks {
		chunk.metadata.insert("parser".to_string(), Value::from(parser));
		chunk.metadata.insert("total_chunks".to_string(), Value::from(total));
	}

	chunks
}

/// Token count approximation: whitespace-separated field count. The
/// approximation is part of the chunking contract.
pub(crate) fn estimate_tokens(text: &str) -> i64 {
	text.split_whitespace().count() as i64
}

/// max_tokens <= 0 takes the default; negative overlap takes the default;
/// overlap >= max_tokens clamps to max_tokens - 1 so accumulation always
/// makes progress.
pub(crate) fn clamp_params(max_tokens: i64, overlap: i64) -> (i64, i64) {
	let max_tokens = if max_tokens <= 0 { DEFAULT_MAX_TOKENS } else { max_tokens };
	let overlap = if overlap < 0 { DEFAULT_OVERLAP } else { overlap };
	let overlap = if overlap >= max_tokens { max_tokens - 1 } else { overlap };

	(max_tokens, overlap)
}

/// Trailing whole sentences of `text` whose cumulative token count stays
/// within `overlap_tokens`. When not even one sentence fits, the last
/// sentence alone is taken. Texts without sentence boundaries fall back to
/// word-level overlap.
pub(crate) fn sentence_overlap(text: &str, overlap_tokens: i64) -> String {
	if overlap_tokens <= 0 || text.is_empty() {
		return String::new();
	}

	let sentences = text
		.split_sentence_bounds()
		.map(str::trim)
		.filter(|sentence| !sentence.is_empty())
		.collect::<Vec<_>>();

	if sentences.is_empty() {
		return word_overlap(text, overlap_tokens);
	}

	let mut taken = Vec::new();
	let mut accumulated = 0;

	for sentence in sentences.iter().rev() {
		let tokens = estimate_tokens(sentence);

		if accumulated + tokens <= overlap_tokens {
			taken.insert(0, *sentence);

			accumulated += tokens;
		} else {
			if taken.is_empty() {
				taken.push(*sentence);
			}

			break;
		}
	}

	if taken.is_empty() {
		return String::new();
	}

	let mut out = taken.join(" ");

	out.push(' ');

	out
}

fn word_overlap(text: &str, overlap_tokens: i64) -> String {
	let words = text.split_whitespace().collect::<Vec<_>>();

	if words.is_empty() {
		return String::new();
	}

	let take = (overlap_tokens as usize).min(words.len());
	let mut out = words[words.len() - take..].join(" ");

	out.push(' ');

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn plain(body: &str) -> ChunkInput<'_> {
		ChunkInput { body, content_type: "text/plain; charset=utf-8", metadata: None }
	}

	#[test]
	fn clamps_parameters() {
		assert_eq!(clamp_params(0, 10), (DEFAULT_MAX_TOKENS, 10));
		assert_eq!(clamp_params(100, -1), (100, DEFAULT_OVERLAP));
		assert_eq!(clamp_params(10, 10), (10, 9));
		assert_eq!(clamp_params(10, 50), (10, 9));
	}

	#[test]
	fn empty_body_emits_no_chunks() {
		assert!(chunk_content(&plain(""), 200, 50).is_empty());
		assert!(chunk_content(&plain("   \n\n  "), 200, 50).is_empty());
	}

	#[test]
	fn single_token_chunks_with_zero_overlap() {
		let chunks = chunk_content(&plain("one two three"), 1, 0);

		assert_eq!(chunks.len(), 3);

		for (index, chunk) in chunks.iter().enumerate() {
			assert_eq!(chunk.text.split_whitespace().count(), 1);
			assert_eq!(chunk.metadata["chunk_index"], serde_json::json!(index));
			assert_eq!(chunk.metadata["total_chunks"], serde_json::json!(3));
			assert_eq!(chunk.metadata["parser"], serde_json::json!("fallback"));
		}
	}

	#[test]
	fn oversized_overlap_terminates() {
		let body = (0..200).map(|n| n.to_string()).collect::<Vec<_>>().join(" ");
		let chunks = chunk_content(&plain(&body), 10, 100);

		assert!(!chunks.is_empty());
		assert!(chunks.len() < 500, "oversized overlap must not loop");
	}

	#[test]
	fn metadata_override_selects_strategy() {
		let meta = serde_json::json!({ "chunker": "markdown" });
		let input = ChunkInput {
			body: "## Heading\nbody text",
			content_type: "text/plain; charset=utf-8",
			metadata: Some(&meta),
		};
		let chunks = chunk_content(&input, 200, 50);

		assert_eq!(chunks[0].metadata["parser"], serde_json::json!("markdown"));
	}

	#[test]
	fn unknown_override_falls_back() {
		let meta = serde_json::json!({ "chunker": "pdf" });
		let input = ChunkInput {
			body: "some text",
			content_type: "text/plain; charset=utf-8",
			metadata: Some(&meta),
		};
		let chunks = chunk_content(&input, 200, 50);

		assert_eq!(chunks[0].metadata["parser"], serde_json::json!("fallback"));
	}

	#[test]
	fn sentence_overlap_prefers_whole_sentences() {
		let text = "First sentence here. Second one follows. Third closes it.";
		let overlap = sentence_overlap(text, 6);

		assert_eq!(overlap, "Second one follows. Third closes it. ");
	}

	#[test]
	fn sentence_overlap_takes_last_sentence_when_nothing_fits() {
		let text = "Alpha beta gamma delta. Epsilon zeta eta theta iota kappa.";
		let overlap = sentence_overlap(text, 2);

		assert_eq!(overlap, "Epsilon zeta eta theta iota kappa. ");
	}

	#[test]
	fn chunk_tokens_cover_original_text() {
		let body = "one two three four five six seven eight nine ten";
		let chunks = chunk_content(&plain(body), 4, 0);
		let rejoined =
			chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>().join(" ");

		assert_eq!(
			rejoined.split_whitespace().collect::<Vec<_>>(),
			body.split_whitespace().collect::<Vec<_>>()
		);
	}
}
