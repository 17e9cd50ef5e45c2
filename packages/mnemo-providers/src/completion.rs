//! OpenAI-compatible chat completions.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use mnemo_domain::ProviderStatus;

use crate::{BoxFuture, CompletionProvider, Error, Result};

const API_BASE: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatRole {
	System,
	User,
	Assistant,
}
impl ChatRole {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::System => "system",
			Self::User => "user",
			Self::Assistant => "assistant",
		}
	}
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
	pub role: ChatRole,
	pub content: String,
}
impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: ChatRole::System, content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: ChatRole::User, content: content.into() }
	}
}

/// Generated text plus the token counts needed for cost recording.
#[derive(Clone, Debug)]
pub struct CompletionOutput {
	pub content: String,
	pub input_tokens: i64,
	pub output_tokens: i64,
}

pub struct OpenAiCompletion {
	client: Client,
	api_key: String,
	model: String,
	api_base: String,
}
impl OpenAiCompletion {
	pub fn new(api_key: &str, model: &str) -> Result<Self> {
		let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

		Ok(Self {
			client,
			api_key: api_key.to_string(),
			model: model.to_string(),
			api_base: API_BASE.to_string(),
		})
	}

	/// Points the client at an OpenAI-compatible server.
	pub fn with_api_base(mut self, api_base: &str) -> Self {
		self.api_base = api_base.trim_end_matches('/').to_string();

		self
	}

	fn disabled(&self) -> bool {
		self.api_key.trim().is_empty()
	}
}

impl CompletionProvider for OpenAiCompletion {
	fn name(&self) -> &str {
		"openai"
	}

	fn model_name(&self) -> &str {
		&self.model
	}

	fn status(&self) -> ProviderStatus {
		if self.disabled() { ProviderStatus::Disabled } else { ProviderStatus::Active }
	}

	fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> BoxFuture<'a, Result<CompletionOutput>> {
		Box::pin(async move {
			if self.disabled() {
				return Err(Error::Disabled("openai".to_string()));
			}

			let body = serde_json::json!({
				"model": self.model,
				"messages": messages
					.iter()
					.map(|message| {
						serde_json::json!({
							"role": message.role.as_str(),
							"content": message.content,
						})
					})
					.collect::<Vec<_>>(),
			});
			let response = self
				.client
				.post(format!("{}/chat/completions", self.api_base))
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
			let content = json
				.pointer("/choices/0/message/content")
				.and_then(Value::as_str)
				.ok_or_else(|| Error::Malformed("completion carried no choices".to_string()))?
				.to_string();
			let input_tokens =
				json.pointer("/usage/prompt_tokens").and_then(Value::as_i64).unwrap_or(0);
			let output_tokens =
				json.pointer("/usage/completion_tokens").and_then(Value::as_i64).unwrap_or(0);

			Ok(CompletionOutput { content, input_tokens, output_tokens })
		})
	}
}
