//! Cost accounting: the storage-backed [`UsageRecorder`] handed to providers
//! and LLM services, plus the reporting operations behind `cost list` and
//! `cost summary`.

use mnemo_providers::{
	BoxFuture,
	usage::{UsageEvent, UsageRecorder},
};
use mnemo_storage::{
	db::Db,
	models::{AiUsageLog, NewUsage, UsageSummary},
};

use crate::{Result, Service};

pub struct DbUsageRecorder {
	db: Db,
}
impl DbUsageRecorder {
	pub fn new(db: Db) -> Self {
		Self { db }
	}
}
impl UsageRecorder for DbUsageRecorder {
	fn record<'a>(&'a self, event: UsageEvent) -> BoxFuture<'a, ()> {
		Box::pin(async move {
			let usage = NewUsage {
				provider_name: event.provider_name,
				service_type: event.service_kind.as_str().to_string(),
				model_name: event.model_name,
				input_tokens: event.input_tokens,
				output_tokens: event.output_tokens,
				cost: event.cost,
				related_content_id: event.related_content_id,
				related_job_id: event.related_job_id,
			};

			// Cost-log writes are best-effort: a failed row is a logged loss,
			// never a failed provider call.
			if let Err(err) = self.db.record_usage(&usage).await {
				tracing::error!(
					provider = usage.provider_name,
					service = usage.service_type,
					error = %err,
					"Failed to record AI usage."
				);
			}
		})
	}
}

impl Service {
	pub async fn list_usage(&self, limit: i64, offset: i64) -> Result<Vec<AiUsageLog>> {
		Ok(self.db.list_usage(limit, offset).await?)
	}

	pub async fn usage_summary(&self) -> Result<UsageSummary> {
		Ok(self.db.usage_summary().await?)
	}
}
