//! OpenAI file-based batch API client: upload an input file, create a batch
//! job, poll it, and pull the output file once the provider reports
//! completion.

use std::time::Duration;

use reqwest::{Client, multipart};
use serde::Deserialize;

use mnemo_domain::ProviderStatus;

use crate::{BoxFuture, Error, Result};

const API_BASE: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub const EMBEDDINGS_ENDPOINT: &str = "/v1/embeddings";
pub const COMPLETION_WINDOW_24H: &str = "24h";

/// Provider-side view of a batch job.
#[derive(Clone, Debug, Deserialize)]
pub struct BatchJob {
	pub id: String,
	pub status: String,
	#[serde(default)]
	pub output_file_id: Option<String>,
	#[serde(default)]
	pub error_file_id: Option<String>,
}
impl BatchJob {
	pub fn is_completed(&self) -> bool {
		self.status == "completed"
	}

	pub fn is_terminal_failure(&self) -> bool {
		matches!(self.status.as_str(), "failed" | "expired" | "cancelled")
	}
}

pub trait BatchProvider
where
	Self: Send + Sync,
{
	fn name(&self) -> &str;

	fn status(&self) -> ProviderStatus;

	/// Uploads bytes as a provider file and returns the file identifier.
	fn create_file<'a>(
		&'a self,
		file_name: &'a str,
		content: Vec<u8>,
	) -> BoxFuture<'a, Result<String>>;

	fn create_batch<'a>(
		&'a self,
		input_file_id: &'a str,
		endpoint: &'a str,
		completion_window: &'a str,
	) -> BoxFuture<'a, Result<BatchJob>>;

	fn retrieve_batch<'a>(&'a self, batch_id: &'a str) -> BoxFuture<'a, Result<BatchJob>>;

	fn file_content<'a>(&'a self, file_id: &'a str) -> BoxFuture<'a, Result<String>>;
}

pub struct OpenAiBatch {
	client: Client,
	api_key: String,
}
impl OpenAiBatch {
	pub fn new(api_key: &str) -> Result<Self> {
		let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

		Ok(Self { client, api_key: api_key.to_string() })
	}

	fn disabled(&self) -> bool {
		self.api_key.trim().is_empty()
	}

	async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
		let status = response.status();

		if status.is_success() {
			return Ok(response);
		}

		let message = response.text().await.unwrap_or_default();

		Err(Error::Api { provider: "openai".to_string(), status: status.as_u16(), message })
	}
}

impl BatchProvider for OpenAiBatch {
	fn name(&self) -> &str {
		"openai"
	}

	fn status(&self) -> ProviderStatus {
		if self.disabled() { ProviderStatus::Disabled } else { ProviderStatus::Active }
	}

	fn create_file<'a>(
		&'a self,
		file_name: &'a str,
		content: Vec<u8>,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			if self.disabled() {
				return Err(Error::Disabled("openai".to_string()));
			}

			let part = multipart::Part::bytes(content)
				.file_name(file_name.to_string())
				.mime_str("application/jsonl")?;
			let form = multipart::Form::new().text("purpose", "batch").part("file", part);
			let response = self
				.client
				.post(format!("{API_BASE}/files"))
				.bearer_auth(self.api_key.as_str())
				.multipart(form)
				.send()
				.await?;
			let response = self.check(response).await?;

			#[derive(Deserialize)]
			struct FileResponse {
				id: String,
			}

			let file: FileResponse = response.json().await?;

			Ok(file.id)
		})
	}

	fn create_batch<'a>(
		&'a self,
		input_file_id: &'a str,
		endpoint: &'a str,
		completion_window: &'a str,
	) -> BoxFuture<'a, Result<BatchJob>> {
		Box::pin(async move {
			if self.disabled() {
				return Err(Error::Disabled("openai".to_string()));
			}

			let body = serde_json::json!({
				"input_file_id": input_file_id,
				"endpoint": endpoint,
				"completion_window": completion_window,
			});
			let response = self
				.client
				.post(format!("{API_BASE}/batches"))
				.bearer_auth(self.api_key.as_str())
				.json(&body)
				.send()
				.await?;
			let response = self.check(response).await?;
			let job: BatchJob = response.json().await?;

			Ok(job)
		})
	}

	fn retrieve_batch<'a>(&'a self, batch_id: &'a str) -> BoxFuture<'a, Result<BatchJob>> {
		Box::pin(async move {
			if self.disabled() {
				return Err(Error::Disabled("openai".to_string()));
			}

			let response = self
				.client
				.get(format!("{API_BASE}/batches/{batch_id}"))
				.bearer_auth(self.api_key.as_str())
				.send()
				.await?;
			let response = self.check(response).await?;
			let job: BatchJob = response.json().await?;

			Ok(job)
		})
	}

	fn file_content<'a>(&'a self, file_id: &'a str) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			if self.disabled() {
				return Err(Error::Disabled("openai".to_string()));
			}

			let response = self
				.client
				.get(format!("{API_BASE}/files/{file_id}/content"))
				.bearer_auth(self.api_key.as_str())
				.send()
				.await?;
			let response = self.check(response).await?;

			Ok(response.text().await?)
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn terminal_states_are_classified() {
		let completed = BatchJob {
			id: "batch_1".to_string(),
			status: "completed".to_string(),
			output_file_id: Some("file_out".to_string()),
			error_file_id: None,
		};
		let expired = BatchJob {
			id: "batch_2".to_string(),
			status: "expired".to_string(),
			output_file_id: None,
			error_file_id: None,
		};
		let in_progress = BatchJob {
			id: "batch_3".to_string(),
			status: "in_progress".to_string(),
			output_file_id: None,
			error_file_id: None,
		};

		assert!(completed.is_completed());
		assert!(expired.is_terminal_failure());
		assert!(!in_progress.is_completed());
		assert!(!in_progress.is_terminal_failure());
	}
}
