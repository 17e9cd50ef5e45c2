//! Retrieval-augmented answering: semantic retrieval over the corpus plus a
//! single completion call.

use mnemo_providers::{
	completion::ChatMessage,
	usage::{ServiceKind, UsageEvent, record_usage},
};

use crate::{Error, Result, Service, search::SemanticSearchParams};

const DEFAULT_ANSWER_PROMPT: &str = "\
You answer questions using only the provided context. If the context does not
contain the answer, say so plainly.

Context:
{{CONTEXT}}

Question: {{QUERY}}";

const MAX_CONTEXT_CHARS_PER_ITEM: usize = 2_000;

impl Service {
	/// Answers a natural-language query grounded in retrieved content.
	/// Unavailable when no completion provider is configured.
	pub async fn answer(&self, query: &str) -> Result<String> {
		let Some(completion) = &self.answer_completion else {
			return Err(Error::NotImplemented { operation: "answer generation".to_string() });
		};

		if query.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty".to_string() });
		}

		let params = SemanticSearchParams {
			query: query.to_string(),
			limit: self.cfg.search.default_limit,
			filter_tags: Vec::new(),
		};
		let results = self.semantic_search(&params).await?;
		let mut context = String::new();

		for (position, item) in results.iter().enumerate() {
			let body: String = item.content.body.chars().take(MAX_CONTEXT_CHARS_PER_ITEM).collect();

			context.push_str(&format!("[{}] {}\n{}\n\n", position + 1, item.content.title, body));
		}

		if context.is_empty() {
			context.push_str("(no matching content)\n");
		}

		let template = if self.answer_prompt.trim().is_empty() {
			DEFAULT_ANSWER_PROMPT
		} else {
			self.answer_prompt.as_str()
		};
		let prompt = template.replace("{{CONTEXT}}", &context).replace("{{QUERY}}", query);
		let output = completion.complete(&[ChatMessage::user(prompt)]).await?;

		if output.input_tokens > 0 || output.output_tokens > 0 {
			record_usage(
				Some(&self.usage_recorder),
				mnemo_config::pricing_for(&self.cfg, completion.name(), completion.model_name()),
				UsageEvent {
					provider_name: completion.name().to_string(),
					service_kind: ServiceKind::Completion,
					model_name: completion.model_name().to_string(),
					input_tokens: output.input_tokens,
					output_tokens: output.output_tokens,
					cost: 0.0,
					related_content_id: None,
					related_job_id: None,
				},
			)
			.await;
		}

		Ok(output.content)
	}
}
