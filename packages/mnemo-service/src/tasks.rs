//! Worker task handlers: embedding generation (direct and batch API paths),
//! batch polling, and summarization. Handlers are independent and idempotent;
//! the broker owns retries, the handlers own job-record status transitions.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use mnemo_chunking::ChunkInput;
use mnemo_domain::{
	EmbeddingCheckPayload, EmbeddingPayload, JobStatus, SummarizationPayload, tasks,
};
use mnemo_providers::batch::{COMPLETION_WINDOW_24H, EMBEDDINGS_ENDPOINT};
use mnemo_queue::{
	BoxFuture, EnqueueOptions, HandlerResult, TaskContext, TaskEventSink, TaskHandler, TaskOutcome,
	WorkerRuntime,
};
use mnemo_storage::{db::Db, models::NewEmbedding};

use crate::{Error, Service};

const BATCH_POLL_DELAY: Duration = Duration::from_secs(60);

/// One pre-chunked piece riding in `background_jobs.job_data` while a
/// provider batch is in flight; `id` doubles as the batch line's custom_id.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct PendingChunk {
	id: Uuid,
	text: String,
	metadata: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct PendingBatch {
	content_id: i64,
	chunks: Vec<PendingChunk>,
}

/// Registers every available handler on the runtime. Summarization is only
/// registered when the configured summarizer is live.
pub fn register_handlers(runtime: &mut WorkerRuntime, service: Arc<Service>) {
	runtime.register(
		tasks::TYPE_EMBEDDING_GENERATE,
		Arc::new(EmbeddingGenerateHandler { service: service.clone() }),
	);
	runtime.register(
		tasks::TYPE_EMBEDDING_CHECK_BATCH,
		Arc::new(EmbeddingCheckHandler { service: service.clone() }),
	);

	if service.summarizer.enabled() {
		runtime
			.register(tasks::TYPE_SUMMARIZATION_GENERATE, Arc::new(SummarizationHandler { service }));
	} else {
		tracing::info!("Summarization is disabled; skipping handler registration.");
	}
}

/// Mirrors broker outcomes onto the job record, except success: handlers set
/// their own terminal status so the batch path can stay in processing_batch.
pub struct JobStatusSink {
	db: Db,
}
impl JobStatusSink {
	pub fn new(db: Db) -> Self {
		Self { db }
	}
}
impl TaskEventSink for JobStatusSink {
	fn on_outcome<'a>(&'a self, task_id: Uuid, outcome: TaskOutcome) -> BoxFuture<'a, ()> {
		Box::pin(async move {
			let status = match outcome {
				TaskOutcome::Completed => return,
				TaskOutcome::Retrying { .. } => JobStatus::Retrying,
				TaskOutcome::Failed { .. } => JobStatus::Failed,
				TaskOutcome::TimedOut => JobStatus::TimedOut,
			};

			if let Err(err) = self.db.update_job_status(task_id, status).await {
				tracing::warn!(task_id = %task_id, status = %status, error = %err, "Failed to mirror job status.");
			}
		})
	}
}

fn to_handler_error(err: Error) -> Box<dyn std::error::Error + Send + Sync> {
	Box::new(err)
}

struct EmbeddingGenerateHandler {
	service: Arc<Service>,
}
impl TaskHandler for EmbeddingGenerateHandler {
	fn handle<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, HandlerResult> {
		Box::pin(async move {
			let payload: EmbeddingPayload = serde_json::from_value(ctx.payload.clone())?;
			let service = &self.service;

			service.mark_job(ctx.task_id, JobStatus::Running).await;

			let content = service.db.get_content(payload.content_id).await.map_err(|err| {
				to_handler_error(Error::from(err))
			})?;
			let chunks = mnemo_chunking::chunk_content(
				&ChunkInput {
					body: &content.body,
					content_type: &content.content_type,
					metadata: Some(&content.metadata),
				},
				service.cfg.chunking.max_tokens,
				service.cfg.chunking.overlap,
			);

			if chunks.is_empty() {
				tracing::info!(
					content_id = content.id,
					"Content produced no chunks; embedding skipped."
				);
				service.mark_job(ctx.task_id, JobStatus::Completed).await;

				return Ok(());
			}

			tracing::info!(
				content_id = content.id,
				chunks = chunks.len(),
				batch_api = service.cfg.embedding.use_batch_api,
				"Generating embeddings."
			);

			if service.cfg.embedding.use_batch_api && service.batch_provider.is_some() {
				submit_batch(service, ctx, content.id, &chunks).await
			} else {
				embed_directly(service, ctx, content.id, &chunks).await
			}
		})
	}
}

/// Direct path: one batched provider call through the fallback service, then
/// chunk rows, then the representative flip as the last step.
async fn embed_directly(
	service: &Service,
	ctx: &TaskContext,
	content_id: i64,
	chunks: &[mnemo_chunking::Chunk],
) -> HandlerResult {
	let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
	let vectors =
		service.embedding.embed_batch(&texts).await.map_err(|err| to_handler_error(err.into()))?;

	// Re-embedding replaces whatever a previous partial attempt left behind.
	service
		.vectors
		.delete_embeddings_by_content_id(content_id)
		.await
		.map_err(|err| to_handler_error(err.into()))?;

	let mut representative = None;

	for (chunk, vector) in chunks.iter().zip(vectors) {
		let id = service
			.vectors
			.add_embedding(&NewEmbedding {
				id: None,
				content_id,
				chunk_text: chunk.text.clone(),
				vector: pgvector::Vector::from(vector),
				metadata: Value::Object(chunk.metadata.clone()),
			})
			.await
			.map_err(|err| to_handler_error(err.into()))?;

		if representative.is_none() {
			representative = Some(id);
		}
	}

	service
		.db
		.update_content_embedding_status(content_id, representative, true)
		.await
		.map_err(|err| to_handler_error(Error::from(err)))?;
	service.mark_job(ctx.task_id, JobStatus::Completed).await;

	tracing::info!(content_id, "Content embedded.");

	Ok(())
}

/// Batch path: upload the input file, create the provider batch, persist the
/// in-flight chunk set, and schedule the first poll.
async fn submit_batch(
	service: &Service,
	ctx: &TaskContext,
	content_id: i64,
	chunks: &[mnemo_chunking::Chunk],
) -> HandlerResult {
	let provider = service.batch_provider.as_ref().expect("checked by caller");
	let pending = PendingBatch {
		content_id,
		chunks: chunks
			.iter()
			.map(|chunk| PendingChunk {
				id: Uuid::new_v4(),
				text: chunk.text.clone(),
				metadata: Value::Object(chunk.metadata.clone()),
			})
			.collect(),
	};
	let mut lines = String::new();

	for chunk in &pending.chunks {
		let line = serde_json::json!({
			"custom_id": chunk.id,
			"method": "POST",
			"url": EMBEDDINGS_ENDPOINT,
			"body": { "model": service.cfg.embedding.model, "input": chunk.text },
		});

		lines.push_str(&line.to_string());
		lines.push('\n');
	}

	let job_data = serde_json::to_value(&pending)?;

	service
		.db
		.update_job_data(ctx.task_id, &job_data)
		.await
		.map_err(|err| to_handler_error(Error::from(err)))?;

	let file_name = format!("mnemo_embed_{}.jsonl", ctx.task_id);
	let input_file_id = provider
		.create_file(&file_name, lines.into_bytes())
		.await
		.map_err(|err| to_handler_error(err.into()))?;
	let batch = provider
		.create_batch(&input_file_id, EMBEDDINGS_ENDPOINT, COMPLETION_WINDOW_24H)
		.await
		.map_err(|err| to_handler_error(err.into()))?;

	service
		.db
		.record_batch_api_info(ctx.task_id, &batch.id, &input_file_id)
		.await
		.map_err(|err| to_handler_error(Error::from(err)))?;
	service.mark_job(ctx.task_id, JobStatus::ProcessingBatch).await;
	schedule_batch_check(service, ctx.task_id, &batch.id, content_id).await?;

	tracing::info!(
		content_id,
		batch_job_id = batch.id,
		input_file_id,
		"Submitted embedding batch."
	);

	Ok(())
}

async fn schedule_batch_check(
	service: &Service,
	job_uuid: Uuid,
	batch_job_id: &str,
	content_id: i64,
) -> HandlerResult {
	let Some(jobs) = &service.jobs else {
		return Err(to_handler_error(Error::Queue {
			message: "no job client available to schedule a batch check".to_string(),
		}));
	};
	let payload = serde_json::to_value(EmbeddingCheckPayload {
		job_uuid,
		batch_job_id: batch_job_id.to_string(),
		extra: Default::default(),
	})?;

	jobs.enqueue(
		tasks::TYPE_EMBEDDING_CHECK_BATCH,
		&payload,
		Some("content"),
		Some(content_id),
		&EnqueueOptions {
			queue: tasks::QUEUE_EMBEDDINGS.to_string(),
			delay: Some(BATCH_POLL_DELAY),
			..Default::default()
		},
	)
	.await
	.map_err(to_handler_error)?;

	Ok(())
}

/// Poller: each run either re-schedules itself, finalizes a completed batch,
/// or marks the originating job failed.
struct EmbeddingCheckHandler {
	service: Arc<Service>,
}
impl TaskHandler for EmbeddingCheckHandler {
	fn handle<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, HandlerResult> {
		Box::pin(async move {
			let payload: EmbeddingCheckPayload = serde_json::from_value(ctx.payload.clone())?;
			let service = &self.service;
			let provider = service.batch_provider.as_ref().ok_or_else(|| {
				to_handler_error(Error::NotImplemented {
					operation: "batch embedding".to_string(),
				})
			})?;
			let batch = provider
				.retrieve_batch(&payload.batch_job_id)
				.await
				.map_err(|err| to_handler_error(err.into()))?;

			if batch.is_completed() {
				finalize_batch(service, &payload, batch.output_file_id.as_deref()).await?;
			} else if batch.is_terminal_failure() {
				tracing::warn!(
					batch_job_id = payload.batch_job_id,
					status = batch.status,
					"Provider batch failed; content stays un-embedded."
				);
				service
					.db
					.update_job_status_and_output(&payload.batch_job_id, JobStatus::Failed, None)
					.await
					.map_err(|err| to_handler_error(Error::from(err)))?;
			} else {
				tracing::debug!(
					batch_job_id = payload.batch_job_id,
					status = batch.status,
					"Provider batch still running; scheduling another check."
				);

				let job = service
					.db
					.get_job_by_batch_id(&payload.batch_job_id)
					.await
					.map_err(|err| to_handler_error(Error::from(err)))?;

				schedule_batch_check(
					service,
					payload.job_uuid,
					&payload.batch_job_id,
					job.related_entity_id.unwrap_or_default(),
				)
				.await?;
			}

			service.mark_job(ctx.task_id, JobStatus::Completed).await;

			Ok(())
		})
	}
}

/// Completion step: pull the output file, correlate each response line back
/// to its pre-generated chunk UUID, write the chunk rows, and flip the
/// content's embedded flag with chunk 0 as the representative.
async fn finalize_batch(
	service: &Service,
	payload: &EmbeddingCheckPayload,
	output_file_id: Option<&str>,
) -> HandlerResult {
	let provider = service.batch_provider.as_ref().expect("checked by caller");
	let output_file_id = output_file_id.ok_or_else(|| {
		to_handler_error(Error::Provider {
			message: format!("batch {} completed without an output file", payload.batch_job_id),
		})
	})?;
	let job = service
		.db
		.get_job_by_batch_id(&payload.batch_job_id)
		.await
		.map_err(|err| to_handler_error(Error::from(err)))?;
	let job_data = job.job_data.ok_or_else(|| {
		to_handler_error(Error::Storage {
			message: format!("job {} carries no in-flight chunk data", job.job_id),
		})
	})?;
	let pending: PendingBatch = serde_json::from_value(job_data)?;
	let raw = provider
		.file_content(output_file_id)
		.await
		.map_err(|err| to_handler_error(err.into()))?;
	let vectors = parse_batch_output(&raw)?;
	let mut written = 0_usize;

	// Parse everything before writing anything: a malformed output file
	// fails the attempt without touching the vector store.
	let mut rows = Vec::with_capacity(pending.chunks.len());

	for chunk in &pending.chunks {
		let Some(vector) = vectors.iter().find(|(id, _)| id == &chunk.id).map(|(_, v)| v) else {
			return Err(to_handler_error(Error::Provider {
				message: format!("batch output is missing custom_id {}", chunk.id),
			}));
		};

		rows.push(NewEmbedding {
			id: Some(chunk.id),
			content_id: pending.content_id,
			chunk_text: chunk.text.clone(),
			vector: pgvector::Vector::from(vector.clone()),
			metadata: chunk.metadata.clone(),
		});
	}

	service
		.vectors
		.delete_embeddings_by_content_id(pending.content_id)
		.await
		.map_err(|err| to_handler_error(err.into()))?;

	for row in &rows {
		service.vectors.add_embedding(row).await.map_err(|err| to_handler_error(err.into()))?;

		written += 1;
	}

	let representative = pending.chunks.first().map(|chunk| chunk.id);

	service
		.db
		.update_content_embedding_status(pending.content_id, representative, true)
		.await
		.map_err(|err| to_handler_error(Error::from(err)))?;
	service
		.db
		.update_job_status_and_output(
			&payload.batch_job_id,
			JobStatus::Completed,
			Some(output_file_id),
		)
		.await
		.map_err(|err| to_handler_error(Error::from(err)))?;

	// The batch endpoint does not report per-job token usage, so no cost row
	// is written for this path.
	tracing::warn!(
		batch_job_id = payload.batch_job_id,
		"Batch embedding completed; provider reports no token usage, skipping cost recording."
	);
	tracing::info!(
		content_id = pending.content_id,
		chunks = written,
		batch_job_id = payload.batch_job_id,
		"Batch embedding finalized."
	);

	Ok(())
}

/// One JSON object per output line, each carrying the client-assigned
/// custom_id and the embedding vector.
fn parse_batch_output(raw: &str) -> Result<Vec<(Uuid, Vec<f32>)>, Box<dyn std::error::Error + Send + Sync>> {
	let mut vectors = Vec::new();

	for line in raw.lines() {
		let line = line.trim();

		if line.is_empty() {
			continue;
		}

		let value: Value = serde_json::from_str(line)?;
		let custom_id = value
			.get("custom_id")
			.and_then(Value::as_str)
			.and_then(|id| Uuid::parse_str(id).ok())
			.ok_or_else(|| {
				to_handler_error(Error::Provider {
					message: "batch output line carries no custom_id".to_string(),
				})
			})?;
		let embedding = value
			.pointer("/response/body/data/0/embedding")
			.and_then(Value::as_array)
			.ok_or_else(|| {
				to_handler_error(Error::Provider {
					message: format!("batch output line {custom_id} carries no embedding"),
				})
			})?;
		let mut vector = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| {
				to_handler_error(Error::Provider {
					message: format!("batch output line {custom_id} has a non-numeric value"),
				})
			})?;

			vector.push(number as f32);
		}

		vectors.push((custom_id, vector));
	}

	Ok(vectors)
}

struct SummarizationHandler {
	service: Arc<Service>,
}
impl TaskHandler for SummarizationHandler {
	fn handle<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, HandlerResult> {
		Box::pin(async move {
			let payload: SummarizationPayload = serde_json::from_value(ctx.payload.clone())?;
			let service = &self.service;

			service.mark_job(ctx.task_id, JobStatus::Running).await;

			let content = service
				.db
				.get_content(payload.content_id)
				.await
				.map_err(|err| to_handler_error(Error::from(err)))?;

			if content.body.trim().is_empty() {
				service.mark_job(ctx.task_id, JobStatus::Completed).await;

				return Ok(());
			}

			let summary = service
				.summarizer
				.summarize(&content.body, content.id, Some(ctx.task_id))
				.await
				.map_err(|err| to_handler_error(err.into()))?;

			service
				.db
				.update_content_summary(content.id, &summary)
				.await
				.map_err(|err| to_handler_error(Error::from(err)))?;
			service.mark_job(ctx.task_id, JobStatus::Completed).await;

			tracing::info!(content_id = content.id, "Summary written.");

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_batch_output_lines() {
		let first = Uuid::new_v4();
		let second = Uuid::new_v4();
		let raw = format!(
			"{}\n{}\n",
			serde_json::json!({
				"custom_id": first,
				"response": { "body": { "data": [{ "embedding": [0.1, 0.2] }] } },
			}),
			serde_json::json!({
				"custom_id": second,
				"response": { "body": { "data": [{ "embedding": [0.3, 0.4] }] } },
			}),
		);
		let vectors = parse_batch_output(&raw).unwrap();

		assert_eq!(vectors.len(), 2);
		assert_eq!(vectors[0].0, first);
		assert_eq!(vectors[1].1, vec![0.3_f32, 0.4_f32]);
	}

	#[test]
	fn batch_output_without_embedding_fails() {
		let raw = serde_json::json!({
			"custom_id": Uuid::new_v4(),
			"response": { "body": { "data": [] } },
		})
		.to_string();

		assert!(parse_batch_output(&raw).is_err());
	}

	#[test]
	fn pending_batch_round_trips_through_job_data() {
		let pending = PendingBatch {
			content_id: 42,
			chunks: vec![PendingChunk {
				id: Uuid::new_v4(),
				text: "chunk text".to_string(),
				metadata: serde_json::json!({ "chunk_index": 0 }),
			}],
		};
		let encoded = serde_json::to_value(&pending).unwrap();
		let decoded: PendingBatch = serde_json::from_value(encoded).unwrap();

		assert_eq!(decoded.content_id, 42);
		assert_eq!(decoded.chunks.len(), 1);
		assert_eq!(decoded.chunks[0].text, "chunk text");
	}
}
