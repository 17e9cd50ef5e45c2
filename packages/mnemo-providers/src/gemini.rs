//! Gemini embedding and generation over the Generative Language REST API.
//! The embedding endpoint does not report token usage, so no cost rows are
//! written for this provider.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use mnemo_domain::ProviderStatus;

use crate::{
	BoxFuture, CompletionProvider, EmbeddingProvider, Error, Result,
	completion::{ChatMessage, ChatRole, CompletionOutput},
};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Known model dimensions; unknown models default to 768 with a WARN.
pub fn dimension_for_model(model: &str) -> u32 {
	match model {
		"models/embedding-001" | "models/text-embedding-004" => 768,
		other => {
			tracing::warn!(
				model = other,
				"Unknown Gemini embedding model; defaulting dimension to 768."
			);

			768
		},
	}
}

pub struct GeminiEmbedding {
	client: Client,
	api_key: String,
	model: String,
	dimension: u32,
}
impl GeminiEmbedding {
	pub fn new(api_key: &str, model: &str) -> Result<Self> {
		let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
		let model = if model.trim().is_empty() { "models/embedding-001" } else { model };

		Ok(Self {
			client,
			api_key: api_key.to_string(),
			model: model.to_string(),
			dimension: dimension_for_model(model),
		})
	}

	fn disabled(&self) -> bool {
		self.api_key.trim().is_empty()
	}

	async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		let url = format!("{API_BASE}/{}:embedContent?key={}", self.model, self.api_key);
		let body = serde_json::json!({ "content": { "parts": [{ "text": text }] } });
		let response = self.client.post(url).json(&body).send().await?;
		let status = response.status();

		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();

			return Err(Error::Api {
				provider: "gemini".to_string(),
				status: status.as_u16(),
				message,
			});
		}

		let json: Value = response.json().await?;
		let values = json
			.pointer("/embedding/values")
			.and_then(Value::as_array)
			.ok_or_else(|| Error::Malformed("embedding response carried no values".to_string()))?;
		let mut vector = Vec::with_capacity(values.len());

		for value in values {
			let number = value
				.as_f64()
				.ok_or_else(|| Error::Malformed("embedding value must be numeric".to_string()))?;

			vector.push(number as f32);
		}

		if vector.len() != self.dimension as usize {
			return Err(Error::DimensionMismatch {
				got: vector.len(),
				want: self.dimension as usize,
			});
		}

		Ok(vector)
	}
}

impl EmbeddingProvider for GeminiEmbedding {
	fn name(&self) -> &str {
		"gemini"
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
				return Err(Error::Disabled("gemini".to_string()));
			}
			if text.is_empty() {
				return Ok(vec![0.0; self.dimension as usize]);
			}

			self.embed_one(text).await
		})
	}

	fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			if self.disabled() {
				return Err(Error::Disabled("gemini".to_string()));
			}

			let mut vectors = Vec::with_capacity(texts.len());

			for text in texts {
				if text.is_empty() {
					vectors.push(vec![0.0; self.dimension as usize]);
				} else {
					vectors.push(self.embed_one(text).await?);
				}
			}

			Ok(vectors)
		})
	}
}

pub struct GeminiCompletion {
	client: Client,
	api_key: String,
	model: String,
}
impl GeminiCompletion {
	pub fn new(api_key: &str, model: &str) -> Result<Self> {
		let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

		Ok(Self { client, api_key: api_key.to_string(), model: model.to_string() })
	}

	fn disabled(&self) -> bool {
		self.api_key.trim().is_empty() || self.model.trim().is_empty()
	}
}

impl CompletionProvider for GeminiCompletion {
	fn name(&self) -> &str {
		"gemini"
	}

	fn model_name(&self) -> &str {
		&self.model
	}

	fn status(&self) -> ProviderStatus {
		if self.disabled() { ProviderStatus::Disabled } else { ProviderStatus::Active }
	}

	fn complete<'a>(
		&'a self,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<CompletionOutput>> {
		Box::pin(async move {
			if self.disabled() {
				return Err(Error::Disabled("gemini".to_string()));
			}

			// Gemini has no system role; system text is folded into the first
			// user turn.
			let mut parts = Vec::new();

			for message in messages {
				let prefix = match message.role {
					ChatRole::System => "Instructions: ",
					ChatRole::User | ChatRole::Assistant => "",
				};

				parts.push(serde_json::json!({ "text": format!("{prefix}{}", message.content) }));
			}

			let url = format!("{API_BASE}/models/{}:generateContent?key={}", self.model, self.api_key);
			let body = serde_json::json!({ "contents": [{ "parts": parts }] });
			let response = self.client.post(url).json(&body).send().await?;
			let status = response.status();

			if !status.is_success() {
				let message = response.text().await.unwrap_or_default();

				return Err(Error::Api {
					provider: "gemini".to_string(),
					status: status.as_u16(),
					message,
				});
			}

			let json: Value = response.json().await?;
			let content = json
				.pointer("/candidates/0/content/parts/0/text")
				.and_then(Value::as_str)
				.ok_or_else(|| Error::Malformed("completion carried no candidates".to_string()))?
				.to_string();
			let input_tokens =
				json.pointer("/usageMetadata/promptTokenCount").and_then(Value::as_i64).unwrap_or(0);
			let output_tokens = json
				.pointer("/usageMetadata/candidatesTokenCount")
				.and_then(Value::as_i64)
				.unwrap_or(0);

			Ok(CompletionOutput { content, input_tokens, output_tokens })
		})
	}
}
