use serde_json::Value;
use uuid::Uuid;

use mnemo_domain::JobStatus;

use crate::{Error, Result, db::Db, models::BackgroundJob};

const JOB_COLUMNS: &str = "\
id, job_id, task_type, payload, queue, status, related_entity_type, related_entity_id, \
batch_api_job_id, batch_input_file_id, batch_output_file_id, job_data, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct JobRecordParams {
	pub job_id: Uuid,
	pub task_type: String,
	pub payload: Value,
	pub queue: String,
	pub status: JobStatus,
	pub related_entity_type: Option<String>,
	pub related_entity_id: Option<i64>,
}

impl Db {
	/// Records a job at enqueue time. Idempotent on the task UUID: a second
	/// record of the same UUID is a no-op.
	pub async fn record_job_enqueue(&self, params: &JobRecordParams) -> Result<()> {
		sqlx::query(
			"\
INSERT INTO background_jobs (job_id, task_type, payload, queue, status, related_entity_type, related_entity_id)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (job_id) DO NOTHING",
		)
		.bind(params.job_id)
		.bind(params.task_type.as_str())
		.bind(&params.payload)
		.bind(params.queue.as_str())
		.bind(params.status.as_str())
		.bind(params.related_entity_type.as_deref())
		.bind(params.related_entity_id)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	pub async fn update_job_status(&self, job_id: Uuid, status: JobStatus) -> Result<()> {
		let result =
			sqlx::query("UPDATE background_jobs SET status = $1, updated_at = now() WHERE job_id = $2")
				.bind(status.as_str())
				.bind(job_id)
				.execute(&self.pool)
				.await?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(format!("job {job_id}")));
		}

		Ok(())
	}

	/// Attaches the provider's batch identifiers to an existing job record.
	pub async fn record_batch_api_info(
		&self,
		job_id: Uuid,
		batch_job_id: &str,
		input_file_id: &str,
	) -> Result<()> {
		let result = sqlx::query(
			"\
UPDATE background_jobs
SET batch_api_job_id = $1, batch_input_file_id = $2, updated_at = now()
WHERE job_id = $3",
		)
		.bind(batch_job_id)
		.bind(input_file_id)
		.bind(job_id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(format!("job {job_id}")));
		}

		Ok(())
	}

	pub async fn update_job_status_and_output(
		&self,
		batch_job_id: &str,
		status: JobStatus,
		output_file_id: Option<&str>,
	) -> Result<()> {
		let result = sqlx::query(
			"\
UPDATE background_jobs
SET status = $1, batch_output_file_id = $2, updated_at = now()
WHERE batch_api_job_id = $3",
		)
		.bind(status.as_str())
		.bind(output_file_id)
		.bind(batch_job_id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			tracing::warn!(batch_job_id, "No job found for batch identifier during status update.");

			return Err(Error::NotFound(format!("batch job {batch_job_id}")));
		}

		Ok(())
	}

	pub async fn get_job_by_batch_id(&self, batch_job_id: &str) -> Result<BackgroundJob> {
		sqlx::query_as::<_, BackgroundJob>(&format!(
			"SELECT {JOB_COLUMNS} FROM background_jobs WHERE batch_api_job_id = $1"
		))
		.bind(batch_job_id)
		.fetch_optional(&self.pool)
		.await?
		.ok_or_else(|| Error::NotFound(format!("batch job {batch_job_id}")))
	}

	/// Stores intermediate state (e.g. the in-flight chunk set) on the job.
	pub async fn update_job_data(&self, job_id: Uuid, job_data: &Value) -> Result<()> {
		let result =
			sqlx::query("UPDATE background_jobs SET job_data = $1, updated_at = now() WHERE job_id = $2")
				.bind(job_data)
				.bind(job_id)
				.execute(&self.pool)
				.await?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(format!("job {job_id}")));
		}

		Ok(())
	}

	/// Jobs that went through the batch API path.
	pub async fn list_batch_jobs(&self, limit: i64, offset: i64) -> Result<Vec<BackgroundJob>> {
		let limit = if limit <= 0 { 20 } else { limit };
		let jobs = sqlx::query_as::<_, BackgroundJob>(&format!(
			"\
SELECT {JOB_COLUMNS}
FROM background_jobs
WHERE batch_api_job_id IS NOT NULL AND batch_api_job_id != ''
ORDER BY created_at DESC
LIMIT $1 OFFSET $2"
		))
		.bind(limit)
		.bind(offset.max(0))
		.fetch_all(&self.pool)
		.await?;

		Ok(jobs)
	}
}
