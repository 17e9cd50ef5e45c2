//! HTML strategy: walks the parsed document tree, skipping non-content
//! elements, splitting at block boundaries, and recording the block tag path
//! of every chunk. When the tree yields nothing usable the body is re-chunked
//! as plain text under the `html-fallback` parser tag.

use ego_tree::NodeRef;
use scraper::{Html, node::Node};
use serde_json::{Map, Value};

use crate::{Chunk, estimate_tokens, sentence_overlap, text};

const IGNORED_TAGS: [&str; 8] =
	["script", "style", "head", "nav", "footer", "aside", "form", "noscript"];
const BLOCK_TAGS: [&str; 30] = [
	"address",
	"article",
	"blockquote",
	"canvas",
	"dd",
	"div",
	"dl",
	"dt",
	"fieldset",
	"figcaption",
	"figure",
	"h1",
	"h2",
	"h3",
	"h4",
	"h5",
	"h6",
	"header",
	"hr",
	"li",
	"main",
	"ol",
	"p",
	"pre",
	"section",
	"table",
	"tbody",
	"tfoot",
	"ul",
	"video",
];

pub(crate) fn chunk(body: &str, max_tokens: i64, overlap: i64) -> (Vec<Chunk>, &'static str) {
	let trimmed = body.trim();

	if trimmed.is_empty() {
		return (Vec::new(), "html");
	}

	let document = Html::parse_document(trimmed);
	let mut state = State {
		chunks: Vec::new(),
		current: String::new(),
		current_tokens: 0,
		tag_stack: Vec::new(),
		chunk_index: 0,
		max_tokens,
		overlap,
	};

	traverse(document.tree.root(), &mut state);

	if !state.current.trim().is_empty() {
		state.finalize(None);
	}
	if state.chunks.is_empty() {
		tracing::warn!("HTML parsing yielded no chunks for a non-empty body; falling back to text.");

		return (text::chunk(body, max_tokens, overlap), "html-fallback");
	}

	(state.chunks, "html")
}

struct State {
	chunks: Vec<Chunk>,
	current: String,
	current_tokens: i64,
	tag_stack: Vec<String>,
	chunk_index: i64,
	max_tokens: i64,
	overlap: i64,
}
impl State {
	fn finalize(&mut self, warning: Option<&str>) {
		let mut metadata = Map::new();

		metadata.insert("chunk_index".to_string(), Value::from(self.chunk_index));
		metadata.insert(
			"source_tags".to_string(),
			Value::Array(self.tag_stack.iter().map(|tag| Value::from(tag.as_str())).collect()),
		);

		if let Some(warning) = warning {
			metadata.insert("warning".to_string(), Value::from(warning));
		}

		self.chunks.push(Chunk { text: self.current.trim().to_string(), metadata });

		self.chunk_index += 1;
		self.current = String::new();
		self.current_tokens = 0;
	}

	fn push_text(&mut self, raw: &str) {
		let text = raw.trim();

		if text.is_empty() {
			return;
		}

		let tokens = estimate_tokens(text);

		if self.current_tokens > 0 && self.current_tokens + tokens > self.max_tokens {
			let finalized = self.current.trim().to_string();

			self.finalize(None);

			let seed = sentence_overlap(&finalized, self.overlap);

			self.current_tokens = estimate_tokens(&seed);
			self.current = seed;

			if self.current_tokens > 0 && self.current_tokens + tokens > self.max_tokens {
				self.finalize(Some("Overlap truncated"));
			}
		}
		if !self.current.is_empty() && !self.current.ends_with(' ') && !self.current.ends_with('\n') {
			self.current.push(' ');
		}

		self.current.push_str(text);

		self.current_tokens += tokens;
	}

	fn block_separator(&mut self) {
		if !self.current.is_empty() && !self.current.ends_with("\n\n") {
			self.current.push_str("\n\n");
		}
	}
}

fn traverse(node: NodeRef<'_, Node>, state: &mut State) {
	match node.value() {
		Node::Element(element) => {
			let name = element.name();

			if IGNORED_TAGS.contains(&name) {
				return;
			}

			let is_block = BLOCK_TAGS.contains(&name);

			if is_block {
				state.tag_stack.push(name.to_string());
				state.block_separator();
			}

			for child in node.children() {
				traverse(child, state);
			}

			if is_block {
				state.block_separator();
				state.tag_stack.pop();
			}
		},
		Node::Text(text) => {
			state.push_text(&text);
		},
		_ => {
			for child in node.children() {
				traverse(child, state);
			}
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_text_and_tag_paths() {
		let body = "<html><body><div><p>alpha beta</p><p>gamma delta</p></div></body></html>";
		let (chunks, parser) = chunk(body, 200, 50);

		assert_eq!(parser, "html");
		assert_eq!(chunks.len(), 1);
		assert!(chunks[0].text.contains("alpha beta"));
		assert!(chunks[0].text.contains("gamma delta"));
	}

	#[test]
	fn skips_script_and_style_content() {
		let body = "\
<html><head><title>ignored</title></head><body>\
<script>var x = 1;</script><style>p { color: red }</style>\
<p>visible words only</p></body></html>";
		let (chunks, _) = chunk(body, 200, 50);

		assert_eq!(chunks.len(), 1);
		assert!(chunks[0].text.contains("visible words only"));
		assert!(!chunks[0].text.contains("var x"));
		assert!(!chunks[0].text.contains("color"));
		assert!(!chunks[0].text.contains("ignored"));
	}

	#[test]
	fn splits_when_exceeding_max_tokens() {
		let paragraphs = (0..8)
			.map(|n| format!("<p>word{n}a word{n}b word{n}c. word{n}d word{n}e.</p>"))
			.collect::<String>();
		let body = format!("<html><body>{paragraphs}</body></html>");
		let (chunks, _) = chunk(&body, 10, 2);

		assert!(chunks.len() > 1);

		for chunk in &chunks {
			assert!(chunk.metadata.contains_key("chunk_index"));
			assert!(chunk.metadata.contains_key("source_tags"));
		}
	}

	#[test]
	fn script_only_body_falls_back_to_text() {
		let body = "<script>var only = 'code';</script>";
		let (chunks, parser) = chunk(body, 200, 50);

		assert_eq!(parser, "html-fallback");
		assert!(!chunks.is_empty());
	}
}
