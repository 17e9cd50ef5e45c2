//! LLM-mediated tag and collection suggestion.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use mnemo_config::PricingInfo;
use mnemo_providers::{
	BoxFuture, CompletionProvider,
	completion::ChatMessage,
	usage::{ServiceKind, SharedUsageRecorder, UsageEvent, record_usage},
};

use crate::{Error, Result, Service};

#[derive(Clone, Debug)]
pub struct CategorizationRequest {
	pub title: String,
	pub body: String,
	pub existing_tags: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CategorizationResult {
	pub suggested_tags: Vec<String>,
	pub suggested_category: String,
	pub confidence: f64,
}

pub trait Categorizer
where
	Self: Send + Sync,
{
	fn categorize<'a>(
		&'a self,
		request: &'a CategorizationRequest,
	) -> BoxFuture<'a, Result<CategorizationResult>>;
}

/// Categorizer backed by a chat-completion provider. The prompt template uses
/// `{{TITLE}}`, `{{BODY}}`, and `{{EXISTING_TAGS}}` placeholders and the
/// provider is expected to answer with a JSON object.
pub struct LlmCategorizer {
	completion: Arc<dyn CompletionProvider>,
	prompt_template: String,
	recorder: Option<SharedUsageRecorder>,
	pricing: Option<PricingInfo>,
}
impl LlmCategorizer {
	pub fn new(
		completion: Arc<dyn CompletionProvider>,
		prompt_template: String,
		recorder: Option<SharedUsageRecorder>,
		pricing: Option<PricingInfo>,
	) -> Self {
		Self { completion, prompt_template, recorder, pricing }
	}
}
impl Categorizer for LlmCategorizer {
	fn categorize<'a>(
		&'a self,
		request: &'a CategorizationRequest,
	) -> BoxFuture<'a, Result<CategorizationResult>> {
		Box::pin(async move {
			let prompt = self
				.prompt_template
				.replace("{{TITLE}}", &request.title)
				.replace("{{BODY}}", &request.body)
				.replace("{{EXISTING_TAGS}}", &request.existing_tags.join(", "));
			let output = self.completion.complete(&[ChatMessage::user(prompt)]).await?;

			if output.input_tokens > 0 || output.output_tokens > 0 {
				record_usage(
					self.recorder.as_ref(),
					self.pricing.as_ref(),
					UsageEvent {
						provider_name: self.completion.name().to_string(),
						service_kind: ServiceKind::Categorization,
						model_name: self.completion.model_name().to_string(),
						input_tokens: output.input_tokens,
						output_tokens: output.output_tokens,
						cost: 0.0,
						related_content_id: None,
						related_job_id: None,
					},
				)
				.await;
			}

			parse_categorization(&output.content)
		})
	}
}

#[derive(Deserialize)]
struct RawCategorization {
	#[serde(default)]
	tags: Vec<String>,
	#[serde(default)]
	category: String,
	#[serde(default)]
	confidence: f64,
}

/// The provider must answer with a parseable JSON object; malformed output is
/// surfaced with the raw content so the failure can be diagnosed. An absent
/// confidence defaults to 1.0.
fn parse_categorization(content: &str) -> Result<CategorizationResult> {
	let trimmed = content.trim();
	let parsed: RawCategorization = serde_json::from_str(trimmed).map_err(|err| Error::Provider {
		message: format!("failed to parse categorization response as JSON: {err}; content: {trimmed}"),
	})?;
	let confidence = if parsed.confidence == 0.0 { 1.0 } else { parsed.confidence };

	Ok(CategorizationResult {
		suggested_tags: parsed.tags,
		suggested_category: parsed.category,
		confidence,
	})
}

impl Service {
	pub async fn categorize_content(
		&self,
		title: &str,
		body: &str,
		existing_tags: Vec<String>,
	) -> Result<CategorizationResult> {
		let Some(categorizer) = &self.categorizer else {
			return Err(Error::NotImplemented { operation: "categorization".to_string() });
		};
		let request = CategorizationRequest {
			title: title.to_string(),
			body: body.to_string(),
			existing_tags,
		};

		categorizer.categorize(&request).await
	}

	/// Batch-fetches contents and their existing tags, then categorizes each
	/// item. Per-item failures are logged and omitted so the successful
	/// majority survives.
	pub async fn batch_categorize(
		&self,
		content_ids: &[i64],
	) -> Result<HashMap<i64, CategorizationResult>> {
		let mut results = HashMap::with_capacity(content_ids.len());

		if content_ids.is_empty() {
			return Ok(results);
		}

		let contents = self.db.get_contents_by_ids(content_ids).await?;
		let existing_tags = match self.db.get_tags_for_contents(content_ids).await {
			Ok(tags) => tags,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to fetch existing tags for batch categorization.");

				HashMap::new()
			},
		};

		for (position, content) in contents.into_iter().enumerate() {
			let Some(content) = content else {
				tracing::warn!(
					content_id = content_ids[position],
					"Skipping missing content during batch categorization."
				);

				continue;
			};
			let tag_names = existing_tags
				.get(&content.id)
				.map(|tags| tags.iter().map(|tag| tag.name.clone()).collect::<Vec<_>>())
				.unwrap_or_default();

			match self.categorize_content(&content.title, &content.body, tag_names).await {
				Ok(result) => {
					results.insert(content.id, result);
				},
				Err(err) => {
					tracing::warn!(
						content_id = content.id,
						error = %err,
						"Categorization failed for one item; continuing."
					);
				},
			}
		}

		Ok(results)
	}

	/// Applies suggested tags and the suggested category (as a collection)
	/// when auto-apply is on. Sub-failures are logged without masking the
	/// top-level success.
	pub async fn apply_categories(
		&self,
		content_id: i64,
		result: &CategorizationResult,
		auto_apply: bool,
	) -> Result<()> {
		if !auto_apply {
			return Ok(());
		}

		if !result.suggested_tags.is_empty() {
			if let Err(err) = self.tag_content(content_id, &result.suggested_tags).await {
				tracing::error!(
					content_id,
					tags = ?result.suggested_tags,
					error = %err,
					"Failed to apply suggested tags."
				);
			}
		}

		if !result.suggested_category.is_empty() {
			match self.db.get_or_create_collection(&result.suggested_category, None, false).await {
				Ok(collection) => {
					if let Err(err) =
						self.db.add_content_to_collection(collection.id, content_id).await
					{
						tracing::error!(
							content_id,
							collection = collection.name,
							error = %err,
							"Failed to add content to suggested collection."
						);
					}
				},
				Err(err) => {
					tracing::error!(
						content_id,
						category = result.suggested_category,
						error = %err,
						"Failed to get or create suggested collection."
					);
				},
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_well_formed_response() {
		let result = parse_categorization(
			r#"{ "tags": ["rust", "search"], "category": "Engineering", "confidence": 0.8 }"#,
		)
		.unwrap();

		assert_eq!(result.suggested_tags, vec!["rust".to_string(), "search".to_string()]);
		assert_eq!(result.suggested_category, "Engineering");
		assert!((result.confidence - 0.8).abs() < 1e-9);
	}

	#[test]
	fn absent_confidence_defaults_to_one() {
		let result = parse_categorization(r#"{ "tags": [], "category": "" }"#).unwrap();

		assert_eq!(result.confidence, 1.0);
	}

	#[test]
	fn malformed_response_surfaces_raw_content() {
		let err = parse_categorization("definitely not json").unwrap_err();

		assert!(err.to_string().contains("definitely not json"));
	}
}
