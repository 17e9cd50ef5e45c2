//! Worker runtime: a bounded pool of task executions fed by a weighted
//! rotation over the configured queues. Claims use `FOR UPDATE SKIP LOCKED`
//! so parallel workers never run the same task.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde_json::Value;
use sqlx::{PgPool, Row};
use tokio::sync::{Semaphore, watch};
use uuid::Uuid;

use crate::{BoxFuture, Error, HandlerResult, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const BASE_BACKOFF_MS: i64 = 500;
const MAX_BACKOFF_MS: i64 = 30_000;

/// Everything a handler gets to see about the task it is running.
#[derive(Clone, Debug)]
pub struct TaskContext {
	pub task_id: Uuid,
	pub task_type: String,
	pub queue: String,
	pub payload: Value,
	/// 1-based attempt number.
	pub attempt: i32,
}

pub trait TaskHandler
where
	Self: Send + Sync,
{
	fn handle<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, HandlerResult>;
}

/// Terminal outcome of one execution attempt, surfaced to an optional sink
/// (the job-record store) for bookkeeping.
#[derive(Clone, Debug)]
pub enum TaskOutcome {
	Completed,
	Retrying { error: String },
	Failed { error: String },
	TimedOut,
}

pub trait TaskEventSink
where
	Self: Send + Sync,
{
	fn on_outcome<'a>(&'a self, task_id: Uuid, outcome: TaskOutcome) -> BoxFuture<'a, ()>;
}

/// Expands the queue priority map into a pick rotation: each queue appears
/// `priority` times, higher-priority queues first. A full rotation gives
/// every queue at least one pick.
pub fn build_rotation(queues: &HashMap<String, u32>) -> Vec<String> {
	let mut ordered = queues.iter().collect::<Vec<_>>();

	ordered.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

	let mut rotation = Vec::new();

	for (queue, priority) in ordered {
		for _ in 0..(*priority).max(1) {
			rotation.push(queue.clone());
		}
	}

	rotation
}

struct ClaimedTask {
	ctx: TaskContext,
	timeout: Duration,
	max_retry: i32,
}

pub struct WorkerRuntime {
	pool: PgPool,
	registry: HashMap<String, Arc<dyn TaskHandler>>,
	rotation: Vec<String>,
	concurrency: usize,
	event_sink: Option<Arc<dyn TaskEventSink>>,
}
impl WorkerRuntime {
	pub fn new(pool: PgPool, concurrency: u32, queues: &HashMap<String, u32>) -> Result<Self> {
		if concurrency == 0 {
			return Err(Error::Misconfigured("concurrency must be greater than zero".to_string()));
		}
		if queues.is_empty() {
			return Err(Error::Misconfigured("at least one queue must be configured".to_string()));
		}

		Ok(Self {
			pool,
			registry: HashMap::new(),
			rotation: build_rotation(queues),
			concurrency: concurrency as usize,
			event_sink: None,
		})
	}

	/// Registers the handler for a task type. Last registration wins.
	pub fn register(&mut self, task_type: &str, handler: Arc<dyn TaskHandler>) {
		self.registry.insert(task_type.to_string(), handler);
	}

	pub fn with_event_sink(mut self, sink: Arc<dyn TaskEventSink>) -> Self {
		self.event_sink = Some(sink);

		self
	}

	/// Runs until the shutdown signal flips. In-flight tasks are drained
	/// before returning; tasks honoring cancellation are cut off by their
	/// per-task timeout at the latest.
	pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
		self.recover_stale_tasks().await?;

		let runtime = Arc::new(self);
		let semaphore = Arc::new(Semaphore::new(runtime.concurrency));
		let mut cursor = 0_usize;

		tracing::info!(
			concurrency = runtime.concurrency,
			queues = ?runtime.rotation,
			"Worker runtime started."
		);

		loop {
			if *shutdown.borrow() {
				break;
			}

			let permit = tokio::select! {
				permit = semaphore.clone().acquire_owned() => permit.expect("semaphore never closes"),
				_ = shutdown.changed() => continue,
			};
			let queue = runtime.rotation[cursor % runtime.rotation.len()].clone();

			cursor += 1;

			match runtime.claim(&queue).await {
				Ok(Some(task)) => {
					let runtime = runtime.clone();

					tokio::spawn(async move {
						runtime.execute(task).await;

						drop(permit);
					});
				},
				Ok(None) => {
					drop(permit);

					// Only sleep once the whole rotation came up empty.
					if cursor % runtime.rotation.len() == 0 {
						tokio::select! {
							_ = tokio::time::sleep(POLL_INTERVAL) => {},
							_ = shutdown.changed() => {},
						}
					}
				},
				Err(err) => {
					drop(permit);
					tracing::error!(error = %err, queue, "Task claim failed.");
					tokio::time::sleep(POLL_INTERVAL).await;
				},
			}
		}

		// Draining: wait for every permit to come home.
		let _ = semaphore.acquire_many(runtime.concurrency as u32).await;

		tracing::info!("Worker runtime stopped.");

		Ok(())
	}

	/// Requeues tasks a crashed worker left behind in the active state.
	async fn recover_stale_tasks(&self) -> Result<()> {
		let recovered = sqlx::query(
			"\
UPDATE queue_tasks
SET state = 'scheduled', updated_at = now()
WHERE state = 'active'
	AND updated_at < now() - make_interval(secs => timeout_ms::float8 / 1000.0 + 60.0)",
		)
		.execute(&self.pool)
		.await?
		.rows_affected();

		if recovered > 0 {
			tracing::warn!(count = recovered, "Requeued stale active tasks.");
		}

		Ok(())
	}

	async fn claim(&self, queue: &str) -> Result<Option<ClaimedTask>> {
		let row = sqlx::query(
			"\
WITH next AS (
	SELECT task_id
	FROM queue_tasks
	WHERE queue = $1 AND state = 'scheduled' AND available_at <= now()
	ORDER BY available_at
	LIMIT 1
	FOR UPDATE SKIP LOCKED
)
UPDATE queue_tasks
SET state = 'active', attempts = attempts + 1, updated_at = now()
FROM next
WHERE queue_tasks.task_id = next.task_id
RETURNING queue_tasks.task_id, queue_tasks.task_type, queue_tasks.queue, queue_tasks.payload,
	queue_tasks.attempts, queue_tasks.timeout_ms, queue_tasks.max_retry",
		)
		.bind(queue)
		.fetch_optional(&self.pool)
		.await?;
		let Some(row) = row else {
			return Ok(None);
		};
		let timeout_ms: i64 = row.try_get("timeout_ms")?;

		Ok(Some(ClaimedTask {
			ctx: TaskContext {
				task_id: row.try_get("task_id")?,
				task_type: row.try_get("task_type")?,
				queue: row.try_get("queue")?,
				payload: row.try_get("payload")?,
				attempt: row.try_get("attempts")?,
			},
			timeout: Duration::from_millis(timeout_ms.max(1) as u64),
			max_retry: row.try_get("max_retry")?,
		}))
	}

	async fn execute(&self, task: ClaimedTask) {
		let ClaimedTask { ctx, timeout, max_retry } = task;
		let Some(handler) = self.registry.get(&ctx.task_type) else {
			let err = Error::UnknownTaskType(ctx.task_type.clone());

			tracing::error!(task_id = %ctx.task_id, error = %err, "Dropping unroutable task.");
			self.settle_failure(&ctx, max_retry, true, err.to_string()).await;

			return;
		};
		let handler = handler.clone();
		let outcome = tokio::time::timeout(timeout, handler.handle(&ctx)).await;

		match outcome {
			Ok(Ok(())) => {
				if let Err(err) = self.mark_done(ctx.task_id).await {
					tracing::error!(task_id = %ctx.task_id, error = %err, "Failed to mark task done.");
				}

				self.emit(ctx.task_id, TaskOutcome::Completed).await;
			},
			Ok(Err(err)) => {
				tracing::warn!(
					task_id = %ctx.task_id,
					task_type = ctx.task_type,
					attempt = ctx.attempt,
					error = %err,
					"Task attempt failed."
				);
				self.settle_failure(&ctx, max_retry, false, err.to_string()).await;
			},
			Err(_elapsed) => {
				tracing::warn!(
					task_id = %ctx.task_id,
					task_type = ctx.task_type,
					attempt = ctx.attempt,
					"Task attempt timed out."
				);
				self.emit(ctx.task_id, TaskOutcome::TimedOut).await;
				self.settle_failure(&ctx, max_retry, false, "task timed out".to_string()).await;
			},
		}
	}

	/// Applies the broker retry policy: attempts beyond max_retry fail the
	/// task, anything earlier goes back on the queue with backoff.
	async fn settle_failure(&self, ctx: &TaskContext, max_retry: i32, force: bool, error: String) {
		let exhausted = force || ctx.attempt > max_retry;
		let result = if exhausted {
			sqlx::query(
				"UPDATE queue_tasks SET state = 'failed', last_error = $1, updated_at = now() WHERE task_id = $2",
			)
			.bind(error.as_str())
			.bind(ctx.task_id)
			.execute(&self.pool)
			.await
		} else {
			let backoff_ms = backoff_for_attempt(ctx.attempt);

			sqlx::query(
				"\
UPDATE queue_tasks
SET state = 'scheduled',
	last_error = $1,
	available_at = now() + make_interval(secs => $2::float8 / 1000.0),
	updated_at = now()
WHERE task_id = $3",
			)
			.bind(error.as_str())
			.bind(backoff_ms)
			.bind(ctx.task_id)
			.execute(&self.pool)
			.await
		};

		if let Err(err) = result {
			tracing::error!(task_id = %ctx.task_id, error = %err, "Failed to settle task failure.");
		}

		if exhausted {
			self.emit(ctx.task_id, TaskOutcome::Failed { error }).await;
		} else {
			self.emit(ctx.task_id, TaskOutcome::Retrying { error }).await;
		}
	}

	async fn mark_done(&self, task_id: Uuid) -> Result<()> {
		sqlx::query("UPDATE queue_tasks SET state = 'done', updated_at = now() WHERE task_id = $1")
			.bind(task_id)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	async fn emit(&self, task_id: Uuid, outcome: TaskOutcome) {
		if let Some(sink) = &self.event_sink {
			sink.on_outcome(task_id, outcome).await;
		}
	}
}

fn backoff_for_attempt(attempt: i32) -> i64 {
	let exp = (attempt.max(1) as u32).saturating_sub(1).min(6);
	let base = BASE_BACKOFF_MS.saturating_mul(1 << exp);

	base.min(MAX_BACKOFF_MS)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rotation_respects_priorities() {
		let mut queues = HashMap::new();

		queues.insert("embeddings".to_string(), 3);
		queues.insert("summarization".to_string(), 2);
		queues.insert("default".to_string(), 1);

		let rotation = build_rotation(&queues);

		assert_eq!(rotation.len(), 6);
		assert_eq!(rotation[0], "embeddings");
		assert_eq!(rotation.iter().filter(|queue| *queue == "embeddings").count(), 3);
		assert_eq!(rotation.iter().filter(|queue| *queue == "summarization").count(), 2);
		assert_eq!(rotation.iter().filter(|queue| *queue == "default").count(), 1);
	}

	#[test]
	fn rotation_orders_ties_by_name() {
		let mut queues = HashMap::new();

		queues.insert("b".to_string(), 1);
		queues.insert("a".to_string(), 1);

		assert_eq!(build_rotation(&queues), vec!["a".to_string(), "b".to_string()]);
	}

	#[test]
	fn backoff_doubles_and_caps() {
		assert_eq!(backoff_for_attempt(1), 500);
		assert_eq!(backoff_for_attempt(2), 1_000);
		assert_eq!(backoff_for_attempt(3), 2_000);
		assert_eq!(backoff_for_attempt(12), 30_000);
	}
}
