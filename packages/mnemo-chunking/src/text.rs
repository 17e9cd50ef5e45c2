//! Fallback plain-text strategy: paragraph split on blank lines, then line
//! split, then word split, accumulated into chunks with sentence-aware
//! overlap at the boundaries.

use serde_json::{Map, Value};

use crate::{Chunk, estimate_tokens, sentence_overlap};

pub(crate) fn chunk(body: &str, max_tokens: i64, overlap: i64) -> Vec<Chunk> {
	let pieces = split_pieces(body, max_tokens);

	accumulate(&pieces, max_tokens, overlap, &Map::new())
}

/// Breaks the body into pieces no larger than `max_tokens`: paragraphs that
/// fit stay whole, oversized paragraphs fall back to lines, oversized lines
/// to fixed word windows.
pub(crate) fn split_pieces(body: &str, max_tokens: i64) -> Vec<String> {
	let text = body.trim();
	let mut pieces = Vec::new();

	if text.is_empty() {
		return pieces;
	}

	for paragraph in text.split("\n\n") {
		let paragraph = paragraph.trim();

		if paragraph.is_empty() {
			continue;
		}
		if estimate_tokens(paragraph) <= max_tokens {
			pieces.push(paragraph.to_string());

			continue;
		}

		for line in paragraph.split('\n') {
			let line = line.trim();

			if line.is_empty() {
				continue;
			}
			if estimate_tokens(line) <= max_tokens {
				pieces.push(line.to_string());

				continue;
			}

			let words = line.split_whitespace().collect::<Vec<_>>();
			let mut start = 0;

			while start < words.len() {
				let end = (start + max_tokens as usize).min(words.len());

				pieces.push(words[start..end].join(" "));

				start = end;
			}
		}
	}

	pieces
}

/// Packs pieces into chunks without exceeding `max_tokens`, seeding each new
/// chunk with sentence-aware overlap from the one just finalized. When the
/// next piece still does not fit after the overlap reset, the overlap chunk
/// is finalized with a warning flag and accumulation starts fresh.
pub(crate) fn accumulate(
	pieces: &[String],
	max_tokens: i64,
	overlap: i64,
	base_metadata: &Map<String, Value>,
) -> Vec<Chunk> {
	let mut chunks = Vec::new();
	let mut current = String::new();
	let mut current_tokens = 0;
	let mut chunk_index = chunks.len() as i64;

	for (position, piece) in pieces.iter().enumerate() {
		let piece_tokens = estimate_tokens(piece);

		if current_tokens > 0 && current_tokens + piece_tokens > max_tokens {
			let finalized = current.trim().to_string();
			let mut metadata = base_metadata.clone();

			metadata.insert("chunk_index".to_string(), Value::from(chunk_index));
			chunks.push(Chunk { text: finalized.clone(), metadata });

			chunk_index += 1;
			current = sentence_overlap(&finalized, overlap);
			current_tokens = estimate_tokens(&current);

			if current_tokens > 0 && current_tokens + piece_tokens > max_tokens {
				let mut metadata = base_metadata.clone();

				metadata.insert("chunk_index".to_string(), Value::from(chunk_index));
				metadata.insert("warning".to_string(), Value::from("Overlap truncated"));
				chunks.push(Chunk { text: current.trim().to_string(), metadata });

				chunk_index += 1;
				current = String::new();
				current_tokens = 0;
			}
		}

		if !current.is_empty() && !current.ends_with(' ') {
			current.push(' ');
		}

		current.push_str(piece);

		current_tokens += piece_tokens;

		if position == pieces.len() - 1 && !current.trim().is_empty() {
			let mut metadata = base_metadata.clone();

			metadata.insert("chunk_index".to_string(), Value::from(chunk_index));
			chunks.push(Chunk { text: current.trim().to_string(), metadata });
		}
	}

	chunks
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn paragraphs_that_fit_stay_whole() {
		let pieces = split_pieces("alpha beta\n\ngamma delta", 10);

		assert_eq!(pieces, vec!["alpha beta".to_string(), "gamma delta".to_string()]);
	}

	#[test]
	fn oversized_lines_become_word_windows() {
		let pieces = split_pieces("a b c d e", 2);

		assert_eq!(pieces, vec!["a b".to_string(), "c d".to_string(), "e".to_string()]);
	}

	#[test]
	fn warning_chunk_appears_when_overlap_cannot_shrink() {
		// Unpunctuated pieces make the sentence overlap return the whole
		// previous chunk, which forces the safeguard path.
		let pieces =
			vec!["one two three four five".to_string(), "six seven eight nine ten".to_string()];
		let chunks = accumulate(&pieces, 5, 4, &Map::new());

		assert!(chunks.iter().any(|chunk| chunk.metadata.contains_key("warning")));
	}

	#[test]
	fn chunk_indices_are_sequential() {
		let pieces = (0..6).map(|n| format!("word{n} filler")).collect::<Vec<_>>();
		let chunks = accumulate(&pieces, 4, 0, &Map::new());

		for (position, chunk) in chunks.iter().enumerate() {
			assert_eq!(chunk.metadata["chunk_index"], serde_json::json!(position));
		}
	}
}
