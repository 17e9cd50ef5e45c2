use crate::{
	Result,
	db::Db,
	models::{AiUsageLog, NewUsage, UsageSummary},
};

impl Db {
	/// Append-only usage log write.
	pub async fn record_usage(&self, usage: &NewUsage) -> Result<AiUsageLog> {
		let row = sqlx::query_as::<_, AiUsageLog>(
			"\
INSERT INTO ai_usage_logs (provider_name, service_type, model_name, input_tokens, output_tokens, cost, related_content_id, related_job_id)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
RETURNING id, timestamp, provider_name, service_type, model_name, input_tokens, output_tokens, cost, related_content_id, related_job_id",
		)
		.bind(usage.provider_name.as_str())
		.bind(usage.service_type.as_str())
		.bind(usage.model_name.as_str())
		.bind(usage.input_tokens)
		.bind(usage.output_tokens)
		.bind(usage.cost)
		.bind(usage.related_content_id)
		.bind(usage.related_job_id)
		.fetch_one(&self.pool)
		.await?;

		Ok(row)
	}

	pub async fn list_usage(&self, limit: i64, offset: i64) -> Result<Vec<AiUsageLog>> {
		let limit = if limit <= 0 { 20 } else { limit };
		let rows = sqlx::query_as::<_, AiUsageLog>(
			"\
SELECT id, timestamp, provider_name, service_type, model_name, input_tokens, output_tokens, cost, related_content_id, related_job_id
FROM ai_usage_logs
ORDER BY timestamp DESC
LIMIT $1 OFFSET $2",
		)
		.bind(limit)
		.bind(offset.max(0))
		.fetch_all(&self.pool)
		.await?;

		Ok(rows)
	}

	/// Aggregate cost and token sums; NULL coalesces to zero so an empty log
	/// summarizes to (0.0, 0, 0).
	pub async fn usage_summary(&self) -> Result<UsageSummary> {
		let (total_cost, total_input_tokens, total_output_tokens): (f64, i64, i64) =
			sqlx::query_as(
				"\
SELECT COALESCE(SUM(cost), 0)::float8,
	COALESCE(SUM(input_tokens), 0)::int8,
	COALESCE(SUM(output_tokens), 0)::int8
FROM ai_usage_logs",
			)
			.fetch_one(&self.pool)
			.await?;

		Ok(UsageSummary { total_cost, total_input_tokens, total_output_tokens })
	}
}
