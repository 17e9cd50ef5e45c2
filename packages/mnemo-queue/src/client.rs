use std::time::Duration;

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::Result;

const QUEUE_SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS queue_tasks (
	task_id UUID PRIMARY KEY,
	queue TEXT NOT NULL DEFAULT 'default',
	task_type TEXT NOT NULL,
	payload JSONB NOT NULL DEFAULT '{}'::jsonb,
	state TEXT NOT NULL DEFAULT 'scheduled',
	attempts INT NOT NULL DEFAULT 0,
	max_retry INT NOT NULL DEFAULT 3,
	timeout_ms BIGINT NOT NULL DEFAULT 300000,
	last_error TEXT,
	available_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS queue_tasks_poll_idx ON queue_tasks (queue, state, available_at)";

/// Enqueue-side knobs, mirrored onto the task row. Retry and timeout are
/// enforced by the broker, not re-implemented by handlers.
#[derive(Clone, Debug)]
pub struct EnqueueOptions {
	pub queue: String,
	pub max_retry: i32,
	pub timeout: Duration,
	/// Scheduled delay before the task becomes available.
	pub delay: Option<Duration>,
}
impl Default for EnqueueOptions {
	fn default() -> Self {
		Self {
			queue: "default".to_string(),
			max_retry: 3,
			timeout: Duration::from_secs(300),
			delay: None,
		}
	}
}

/// Broker acknowledgement: the assigned task UUID and the queue it landed on.
#[derive(Clone, Debug)]
pub struct EnqueuedTask {
	pub task_id: Uuid,
	pub queue: String,
}

/// Hands tasks to the Postgres-backed broker. Process-wide: initialized once
/// and shared.
#[derive(Clone)]
pub struct QueueClient {
	pool: PgPool,
}
impl QueueClient {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &PgPool {
		&self.pool
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(7_223_003_i64).execute(&mut *tx).await?;

		for statement in QUEUE_SCHEMA.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	pub async fn enqueue(
		&self,
		task_type: &str,
		payload: &Value,
		opts: &EnqueueOptions,
	) -> Result<EnqueuedTask> {
		let task_id = Uuid::new_v4();
		let delay_ms = opts.delay.map(|delay| delay.as_millis() as i64).unwrap_or(0);

		sqlx::query(
			"\
INSERT INTO queue_tasks (task_id, queue, task_type, payload, max_retry, timeout_ms, available_at)
VALUES ($1, $2, $3, $4, $5, $6, now() + make_interval(secs => $7::float8 / 1000.0))",
		)
		.bind(task_id)
		.bind(opts.queue.as_str())
		.bind(task_type)
		.bind(payload)
		.bind(opts.max_retry)
		.bind(opts.timeout.as_millis() as i64)
		.bind(delay_ms)
		.execute(&self.pool)
		.await?;

		tracing::debug!(
			task_id = %task_id,
			task_type,
			queue = opts.queue,
			delay_ms,
			"Enqueued task."
		);

		Ok(EnqueuedTask { task_id, queue: opts.queue.clone() })
	}
}
