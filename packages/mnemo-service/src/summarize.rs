//! Single-paragraph summarization, invoked from the worker handler.

use std::sync::Arc;

use uuid::Uuid;

use mnemo_config::PricingInfo;
use mnemo_providers::{
	BoxFuture, CompletionProvider, Error as ProviderError,
	completion::ChatMessage,
	usage::{ServiceKind, SharedUsageRecorder, UsageEvent, record_usage},
};

pub type SummaryResult = Result<String, ProviderError>;

pub trait Summarizer
where
	Self: Send + Sync,
{
	fn enabled(&self) -> bool;

	fn summarize<'a>(
		&'a self,
		text: &'a str,
		content_id: i64,
		job_id: Option<Uuid>,
	) -> BoxFuture<'a, SummaryResult>;
}

pub struct LlmSummarizer {
	completion: Arc<dyn CompletionProvider>,
	system_prompt: String,
	recorder: Option<SharedUsageRecorder>,
	pricing: Option<PricingInfo>,
}
impl LlmSummarizer {
	pub fn new(
		completion: Arc<dyn CompletionProvider>,
		system_prompt: String,
		recorder: Option<SharedUsageRecorder>,
		pricing: Option<PricingInfo>,
	) -> Self {
		Self { completion, system_prompt, recorder, pricing }
	}
}
impl Summarizer for LlmSummarizer {
	fn enabled(&self) -> bool {
		true
	}

	fn summarize<'a>(
		&'a self,
		text: &'a str,
		content_id: i64,
		job_id: Option<Uuid>,
	) -> BoxFuture<'a, SummaryResult> {
		Box::pin(async move {
			let mut messages = Vec::with_capacity(2);

			if !self.system_prompt.trim().is_empty() {
				messages.push(ChatMessage::system(self.system_prompt.clone()));
			}

			messages.push(ChatMessage::user(format!("Summarize this in one paragraph:\n\n{text}")));

			let output = self.completion.complete(&messages).await?;

			if output.input_tokens > 0 || output.output_tokens > 0 {
				record_usage(
					self.recorder.as_ref(),
					self.pricing.as_ref(),
					UsageEvent {
						provider_name: self.completion.name().to_string(),
						service_kind: ServiceKind::Summarization,
						model_name: self.completion.model_name().to_string(),
						input_tokens: output.input_tokens,
						output_tokens: output.output_tokens,
						cost: 0.0,
						related_content_id: Some(content_id),
						related_job_id: job_id,
					},
				)
				.await;
			}

			Ok(output.content)
		})
	}
}

/// Stand-in when summarization is disabled; worker registration checks
/// `enabled` and skips the handler entirely.
pub struct NoopSummarizer;
impl Summarizer for NoopSummarizer {
	fn enabled(&self) -> bool {
		false
	}

	fn summarize<'a>(
		&'a self,
		_text: &'a str,
		_content_id: i64,
		_job_id: Option<Uuid>,
	) -> BoxFuture<'a, SummaryResult> {
		Box::pin(async move { Err(ProviderError::Disabled("summarization".to_string())) })
	}
}
