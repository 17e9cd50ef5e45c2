//! Cost-accounting seam. Providers and services report token usage through
//! [`UsageRecorder`]; the storage layer supplies the implementation so this
//! crate stays free of database dependencies.

use std::sync::Arc;

use uuid::Uuid;

use mnemo_config::PricingInfo;

use crate::BoxFuture;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceKind {
	Embedding,
	Categorization,
	Summarization,
	Completion,
}
impl ServiceKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Embedding => "embedding",
			Self::Categorization => "categorization",
			Self::Summarization => "summarization",
			Self::Completion => "completion",
		}
	}
}

#[derive(Clone, Debug)]
pub struct UsageEvent {
	pub provider_name: String,
	pub service_kind: ServiceKind,
	pub model_name: String,
	pub input_tokens: i64,
	pub output_tokens: i64,
	pub cost: f64,
	pub related_content_id: Option<i64>,
	pub related_job_id: Option<Uuid>,
}

pub trait UsageRecorder
where
	Self: Send + Sync,
{
	fn record<'a>(&'a self, event: UsageEvent) -> BoxFuture<'a, ()>;
}

pub type SharedUsageRecorder = Arc<dyn UsageRecorder>;

/// `input_tokens * input_price + output_tokens * output_price`; embeddings
/// pass zero output tokens.
pub fn compute_cost(pricing: &PricingInfo, input_tokens: i64, output_tokens: i64) -> f64 {
	input_tokens as f64 * pricing.input_per_token + output_tokens as f64 * pricing.output_per_token
}

/// Records a usage row when pricing is configured; a missing pricing entry is
/// a WARN, never a failure.
pub async fn record_usage(
	recorder: Option<&SharedUsageRecorder>,
	pricing: Option<&PricingInfo>,
	mut event: UsageEvent,
) {
	let Some(recorder) = recorder else {
		return;
	};
	let Some(pricing) = pricing else {
		tracing::warn!(
			provider = event.provider_name,
			model = event.model_name,
			service = event.service_kind.as_str(),
			"Pricing is not configured for this model; skipping cost recording."
		);

		return;
	};

	event.cost = compute_cost(pricing, event.input_tokens, event.output_tokens);

	recorder.record(event).await;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cost_combines_input_and_output_prices() {
		let pricing = PricingInfo { input_per_token: 0.001, output_per_token: 0.002 };

		assert!((compute_cost(&pricing, 100, 50) - 0.2).abs() < 1e-12);
		assert_eq!(compute_cost(&pricing, 0, 0), 0.0);
	}

	#[test]
	fn embedding_cost_uses_input_tokens_only() {
		let pricing = PricingInfo { input_per_token: 0.001, output_per_token: 0.5 };

		assert!((compute_cost(&pricing, 10, 0) - 0.01).abs() < 1e-12);
	}
}
