//! Broker client plus job-record bookkeeping: every enqueue hands the task to
//! the broker first and then records a `background_jobs` row. Recording
//! failures are logged, never fatal, because the task is already scheduled.

use std::time::Duration;

use serde_json::Value;

use mnemo_domain::{EmbeddingPayload, JobStatus, tasks};
use mnemo_queue::{EnqueueOptions, EnqueuedTask, QueueClient};
use mnemo_storage::{db::Db, jobs::JobRecordParams};

use crate::Result;

#[derive(Clone)]
pub struct JobClient {
	queue: QueueClient,
	db: Db,
}
impl JobClient {
	pub fn new(queue: QueueClient, db: Db) -> Self {
		Self { queue, db }
	}

	pub async fn enqueue(
		&self,
		task_type: &str,
		payload: &Value,
		related_entity_type: Option<&str>,
		related_entity_id: Option<i64>,
		opts: &EnqueueOptions,
	) -> Result<EnqueuedTask> {
		let task = self.queue.enqueue(task_type, payload, opts).await?;
		let record = JobRecordParams {
			job_id: task.task_id,
			task_type: task_type.to_string(),
			payload: payload.clone(),
			queue: task.queue.clone(),
			status: JobStatus::Enqueued,
			related_entity_type: related_entity_type.map(str::to_string),
			related_entity_id,
		};

		if let Err(err) = self.db.record_job_enqueue(&record).await {
			tracing::error!(
				task_id = %task.task_id,
				task_type,
				error = %err,
				"Failed to record job enqueue event; the task itself is scheduled."
			);
		}

		Ok(task)
	}

	pub async fn enqueue_embedding_job(&self, content_id: i64) -> Result<EnqueuedTask> {
		let payload = serde_json::to_value(EmbeddingPayload::new(content_id))
			.expect("embedding payload serializes");
		let opts = EnqueueOptions {
			queue: tasks::QUEUE_EMBEDDINGS.to_string(),
			max_retry: 3,
			timeout: Duration::from_secs(300),
			delay: None,
		};

		self.enqueue(
			tasks::TYPE_EMBEDDING_GENERATE,
			&payload,
			Some("content"),
			Some(content_id),
			&opts,
		)
		.await
	}
}
