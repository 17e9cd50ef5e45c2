//! OpenAI embedding provider over the REST embeddings endpoint.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use mnemo_config::PricingInfo;
use mnemo_domain::ProviderStatus;

use crate::{
	BoxFuture, EmbeddingProvider, Error, Result,
	usage::{ServiceKind, SharedUsageRecorder, UsageEvent, record_usage},
};

const API_BASE: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Known model dimensions; unknown models default to 1536 with a WARN.
pub fn dimension_for_model(model: &str) -> u32 {
	match model {
		"text-embedding-ada-002" => 1_536,
		"text-embedding-3-small" => 1_536,
		"text-embedding-3-large" => 3_072,
		other => {
			tracing::warn!(
				model = other,
				"Unknown OpenAI embedding model; defaulting dimension to 1536."
			);

			1_536
		},
	}
}

pub struct OpenAiEmbedding {
	client: Client,
	api_key: String,
	model: String,
	dimension: u32,
	recorder: Option<SharedUsageRecorder>,
	pricing: Option<PricingInfo>,
}
impl OpenAiEmbedding {
	pub fn new(
		api_key: &str,
		model: &str,
		recorder: Option<SharedUsageRecorder>,
		pricing: Option<PricingInfo>,
	) -> Result<Self> {
		let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

		Ok(Self {
			client,
			api_key: api_key.to_string(),
			model: model.to_string(),
			dimension: dimension_for_model(model),
			recorder,
			pricing,
		})
	}

	fn disabled(&self) -> bool {
		self.api_key.trim().is_empty()
	}

	async fn request_embeddings(&self, inputs: &[&str]) -> Result<(Vec<Vec<f32>>, i64)> {
		let body = serde_json::json!({ "model": self.model, "input": inputs });
		let response = self
			.client
			.post(format!("{API_BASE}/embeddings"))
			.bearer_auth(self.api_key.as_str())
			.json(&body)
			.send()
			.await?;
		let status = response.status();

		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();

			return Err(Error::Api {
				provider: "openai".to_string(),
				status: status.as_u16(),
				message,
			});
		}

		let json: Value = response.json().await?;
		let vectors = parse_embedding_response(&json)?;
		let total_tokens = json
			.pointer("/usage/total_tokens")
			.and_then(Value::as_i64)
			.unwrap_or(0);

		for vector in &vectors {
			if vector.len() != self.dimension as usize {
				return Err(Error::DimensionMismatch {
					got: vector.len(),
					want: self.dimension as usize,
				});
			}
		}

		if total_tokens > 0 {
			record_usage(
				self.recorder.as_ref(),
				self.pricing.as_ref(),
				UsageEvent {
					provider_name: "openai".to_string(),
					service_kind: ServiceKind::Embedding,
					model_name: self.model.clone(),
					input_tokens: total_tokens,
					output_tokens: 0,
					cost: 0.0,
					related_content_id: None,
					related_job_id: None,
				},
			)
			.await;
		}

		Ok((vectors, total_tokens))
	}
}

impl EmbeddingProvider for OpenAiEmbedding {
	fn name(&self) -> &str {
		"openai"
	}

	fn model_name(&self) -> &str {
		&self.model
	}

	fn dimension(&self) -> u32 {
		self.dimension
	}

	fn status(&self) -> ProviderStatus {
		if self.disabled() { ProviderStatus::Disabled } else { ProviderStatus::Active }
	}

	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			if self.disabled() {
				return Err(Error::Disabled("openai".to_string()));
			}
			if text.is_empty() {
				return Ok(vec![0.0; self.dimension as usize]);
			}

			let (mut vectors, _) = self.request_embeddings(&[text]).await?;

			vectors.pop().ok_or_else(|| Error::Malformed("response carried no vectors".to_string()))
		})
	}

	fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			if self.disabled() {
				return Err(Error::Disabled("openai".to_string()));
			}
			if texts.is_empty() {
				return Ok(Vec::new());
			}

			// Empty inputs are rejected by the API; embed the non-empty ones
			// and backfill zero vectors at their original positions.
			let mut non_empty = Vec::with_capacity(texts.len());
			let mut original_positions = Vec::with_capacity(texts.len());

			for (position, text) in texts.iter().enumerate() {
				if !text.is_empty() {
					non_empty.push(text.as_str());
					original_positions.push(position);
				}
			}

			let mut results = vec![vec![0.0; self.dimension as usize]; texts.len()];

			if non_empty.is_empty() {
				return Ok(results);
			}

			let (vectors, _) = self.request_embeddings(&non_empty).await?;

			if vectors.len() != non_empty.len() {
				return Err(Error::CountMismatch { got: vectors.len(), want: non_empty.len() });
			}

			for (vector, position) in vectors.into_iter().zip(original_positions) {
				results[position] = vector;
			}

			Ok(results)
		})
	}
}

/// Embedding items arrive with an `index` field and may be out of order;
/// vectors are returned sorted by that index.
pub(crate) fn parse_embedding_response(json: &Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::Malformed("embedding response is missing the data array".to_string()))?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(Value::as_u64)
			.map(|value| value as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(Value::as_array).ok_or_else(|| {
			Error::Malformed("embedding item is missing the embedding array".to_string())
		})?;
		let mut vector = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value
				.as_f64()
				.ok_or_else(|| Error::Malformed("embedding value must be numeric".to_string()))?;

			vector.push(number as f32);
		}

		indexed.push((index, vector));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_embeddings_in_index_order() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let parsed = parse_embedding_response(&json).expect("parse failed");

		assert_eq!(parsed.len(), 2);
		assert_eq!(parsed[0], vec![0.5, 1.5]);
		assert_eq!(parsed[1], vec![2.0, 3.0]);
	}

	#[test]
	fn rejects_response_without_data() {
		let json = serde_json::json!({ "object": "list" });

		assert!(parse_embedding_response(&json).is_err());
	}

	#[test]
	fn known_model_dimensions() {
		assert_eq!(dimension_for_model("text-embedding-3-small"), 1_536);
		assert_eq!(dimension_for_model("text-embedding-3-large"), 3_072);
		assert_eq!(dimension_for_model("something-new"), 1_536);
	}
}
