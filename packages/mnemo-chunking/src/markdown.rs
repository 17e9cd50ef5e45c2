//! Markdown strategy: the body is split at `##`-and-deeper heading lines,
//! each section is chunked independently, and every emitted chunk carries the
//! heading line it belongs to.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::{Chunk, text};

fn heading_pattern() -> &'static Regex {
	static PATTERN: OnceLock<Regex> = OnceLock::new();

	PATTERN.get_or_init(|| Regex::new(r"(?m)^#{2,}\s+.*$").expect("valid regex"))
}

pub(crate) fn chunk(body: &str, max_tokens: i64, overlap: i64) -> Vec<Chunk> {
	let trimmed = body.trim();
	let mut chunks = Vec::new();

	if trimmed.is_empty() {
		return chunks;
	}

	let headings = heading_pattern().find_iter(trimmed).collect::<Vec<_>>();

	if headings.is_empty() {
		chunks.extend(chunk_section(trimmed, "", max_tokens, overlap));
	} else {
		chunks.extend(chunk_section(&trimmed[..headings[0].start()], "", max_tokens, overlap));

		for (position, heading) in headings.iter().enumerate() {
			let section_end = headings.get(position + 1).map(|next| next.start()).unwrap_or(trimmed.len());
			let section = &trimmed[heading.end()..section_end];

			chunks.extend(chunk_section(section, heading.as_str().trim(), max_tokens, overlap));
		}
	}

	for (position, chunk) in chunks.iter_mut().enumerate() {
		chunk.metadata.insert("chunk_index".to_string(), Value::from(position as i64));
	}

	chunks
}

fn chunk_section(section: &str, heading: &str, max_tokens: i64, overlap: i64) -> Vec<Chunk> {
	let section = section.trim();

	if section.is_empty() {
		return Vec::new();
	}

	let mut base_metadata = Map::new();

	base_metadata.insert("source_heading".to_string(), Value::from(heading));

	let pieces = text::split_pieces(section, max_tokens);

	text::accumulate(&pieces, max_tokens, overlap, &base_metadata)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_on_headings_and_tags_chunks() {
		let body = "## Intro\npara1\n\n## Body\npara2";
		let chunks = chunk(body, 200, 50);

		assert_eq!(chunks.len(), 2);
		assert_eq!(chunks[0].text, "para1");
		assert_eq!(chunks[0].metadata["source_heading"], serde_json::json!("## Intro"));
		assert_eq!(chunks[0].metadata["chunk_index"], serde_json::json!(0));
		assert_eq!(chunks[1].text, "para2");
		assert_eq!(chunks[1].metadata["source_heading"], serde_json::json!("## Body"));
		assert_eq!(chunks[1].metadata["chunk_index"], serde_json::json!(1));
	}

	#[test]
	fn preamble_before_first_heading_is_kept() {
		let body = "lead paragraph\n\n## Section\nbody";
		let chunks = chunk(body, 200, 50);

		assert_eq!(chunks.len(), 2);
		assert_eq!(chunks[0].text, "lead paragraph");
		assert_eq!(chunks[0].metadata["source_heading"], serde_json::json!(""));
		assert_eq!(chunks[1].metadata["source_heading"], serde_json::json!("## Section"));
	}

	#[test]
	fn body_without_headings_is_one_section() {
		let chunks = chunk("just a plain paragraph", 200, 50);

		assert_eq!(chunks.len(), 1);
		assert_eq!(chunks[0].metadata["source_heading"], serde_json::json!(""));
	}

	#[test]
	fn single_hash_headings_do_not_split() {
		let chunks = chunk("# Title\nbody text under a level-one heading", 200, 50);

		assert_eq!(chunks.len(), 1);
	}

	#[test]
	fn chunk_indices_run_across_sections() {
		let body = "## A\none two three four five six\n\n## B\nseven eight nine ten eleven twelve";
		let chunks = chunk(body, 3, 0);

		for (position, chunk) in chunks.iter().enumerate() {
			assert_eq!(chunk.metadata["chunk_index"], serde_json::json!(position));
		}

		assert!(chunks.len() >= 4);
	}
}
