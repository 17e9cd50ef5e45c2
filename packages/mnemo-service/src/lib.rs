pub mod answer;
pub mod batch;
pub mod categorize;
pub mod cost;
pub mod ingest;
pub mod input;
pub mod jobclient;
pub mod search;
pub mod summarize;
pub mod tasks;
pub mod walk;

mod error;

pub use error::{Error, Result};

pub use categorize::{CategorizationRequest, CategorizationResult, Categorizer, LlmCategorizer};
pub use ingest::{AddContentParams, ContentResultItem};
pub use jobclient::JobClient;
pub use search::{KeywordSearchParams, SearchResultItem, SemanticSearchParams};
pub use summarize::{LlmSummarizer, NoopSummarizer, Summarizer};
pub use tasks::{JobStatusSink, register_handlers};
pub use walk::IngestStats;

use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use mnemo_config::Config;
use mnemo_domain::JobStatus;
use mnemo_providers::{
	CompletionProvider, EmbeddingProvider,
	batch::{BatchProvider, OpenAiBatch},
	completion::OpenAiCompletion,
	fallback::FallbackEmbedding,
	gemini::{GeminiCompletion, GeminiEmbedding},
	openai::OpenAiEmbedding,
	usage::SharedUsageRecorder,
};
use mnemo_queue::QueueClient;
use mnemo_storage::{db::Db, vector::VectorStore};

use crate::cost::DbUsageRecorder;

const HTTP_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The assembled core: stores, providers, queue client, and the enrichment
/// services, wired from one validated config.
pub struct Service {
	pub cfg: Arc<Config>,
	pub db: Db,
	pub vectors: VectorStore,
	pub jobs: Option<JobClient>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub batch_provider: Option<Arc<dyn BatchProvider>>,
	pub categorizer: Option<Arc<dyn Categorizer>>,
	pub summarizer: Arc<dyn Summarizer>,
	pub answer_completion: Option<Arc<dyn CompletionProvider>>,
	pub answer_prompt: String,
	pub usage_recorder: SharedUsageRecorder,
	pub http: reqwest::Client,
}
impl Service {
	/// Connects both stores, bootstraps their schemas, and composes the
	/// provider set. Misconfiguration fails here, at startup.
	pub async fn build(cfg: Config) -> Result<Self> {
		let db = Db::connect(&cfg.database.primary).await?;

		db.ensure_schema().await?;

		let vectors = VectorStore::connect(&cfg.database.vector, cfg.embedding.dimension).await?;

		vectors.ensure_schema().await?;

		let usage_recorder: SharedUsageRecorder = Arc::new(DbUsageRecorder::new(db.clone()));
		let embedding = build_embedding(&cfg, &usage_recorder)?;

		if embedding.dimension() != cfg.embedding.dimension {
			return Err(Error::InvalidRequest {
				message: format!(
					"embedding.dimension {} does not match the provider dimension {}",
					cfg.embedding.dimension,
					embedding.dimension()
				),
			});
		}

		let queue = QueueClient::new(db.pool.clone());

		queue.ensure_schema().await?;

		let jobs = Some(JobClient::new(queue, db.clone()));
		let batch_provider: Option<Arc<dyn BatchProvider>> = if cfg.embedding.use_batch_api {
			Some(Arc::new(OpenAiBatch::new(&cfg.embedding.openai_api_key)?))
		} else {
			None
		};
		let categorizer = build_categorizer(&cfg, &usage_recorder)?;
		let summarizer = build_summarizer(&cfg, &usage_recorder)?;
		let (answer_completion, answer_prompt) = build_answer(&cfg)?;
		let http = reqwest::Client::builder().timeout(HTTP_FETCH_TIMEOUT).build().map_err(|err| {
			Error::Provider { message: format!("failed to build HTTP client: {err}") }
		})?;

		Ok(Self {
			cfg: Arc::new(cfg),
			db,
			vectors,
			jobs,
			embedding,
			batch_provider,
			categorizer,
			summarizer,
			answer_completion,
			answer_prompt,
			usage_recorder,
			http,
		})
	}

	/// Job-record transitions are bookkeeping: a missing row (enqueue-time
	/// recording failed) must not fail the task itself.
	pub(crate) async fn mark_job(&self, job_id: Uuid, status: JobStatus) {
		if let Err(err) = self.db.update_job_status(job_id, status).await {
			tracing::debug!(job_id = %job_id, status = %status, error = %err, "Job status update skipped.");
		}
	}

	/// Health probe used by `mnemo doctor`.
	pub async fn doctor(&self) -> DoctorReport {
		DoctorReport {
			primary_ok: self.db.ping().await.is_ok(),
			vector_ok: self.vectors.ping().await.is_ok(),
			embedding_provider: self.embedding.name().to_string(),
			embedding_model: self.embedding.model_name().to_string(),
			embedding_status: format!("{:?}", self.embedding.status()),
			batch_api: self.batch_provider.is_some(),
			summarization: self.summarizer.enabled(),
			categorization: self.categorizer.is_some(),
			answer: self.answer_completion.is_some(),
		}
	}
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct DoctorReport {
	pub primary_ok: bool,
	pub vector_ok: bool,
	pub embedding_provider: String,
	pub embedding_model: String,
	pub embedding_status: String,
	pub batch_api: bool,
	pub summarization: bool,
	pub categorization: bool,
	pub answer: bool,
}

fn build_embedding(
	cfg: &Config,
	recorder: &SharedUsageRecorder,
) -> Result<Arc<dyn EmbeddingProvider>> {
	let mut providers: Vec<Arc<dyn EmbeddingProvider>> = Vec::new();

	if !cfg.embedding.openai_api_key.trim().is_empty() {
		let pricing =
			mnemo_config::pricing_for(cfg, "openai", &cfg.embedding.model).copied();

		providers.push(Arc::new(OpenAiEmbedding::new(
			&cfg.embedding.openai_api_key,
			&cfg.embedding.model,
			Some(recorder.clone()),
			pricing,
		)?));
	}
	if !cfg.embedding.google_api_key.trim().is_empty() {
		providers.push(Arc::new(GeminiEmbedding::new(
			&cfg.embedding.google_api_key,
			&cfg.embedding.gemini_model_name,
		)?));
	}

	Ok(Arc::new(FallbackEmbedding::new(providers, None)?))
}

fn completion_for(cfg: &Config, provider: &str, model: &str) -> Result<Arc<dyn CompletionProvider>> {
	match provider {
		"gemini" => Ok(Arc::new(GeminiCompletion::new(&cfg.embedding.google_api_key, model)?)),
		_ => Ok(Arc::new(OpenAiCompletion::new(&cfg.embedding.openai_api_key, model)?)),
	}
}

fn build_categorizer(
	cfg: &Config,
	recorder: &SharedUsageRecorder,
) -> Result<Option<Arc<dyn Categorizer>>> {
	if cfg.categorization.r#type != "llm" {
		return Ok(None);
	}

	let completion =
		completion_for(cfg, &cfg.categorization.provider, &cfg.categorization.model)?;
	let prompt =
		mnemo_config::load_prompt(&cfg.categorization.prompt_template).map_err(|err| {
			Error::InvalidRequest { message: format!("categorization prompt: {err}") }
		})?;
	let pricing = mnemo_config::pricing_for(
		cfg,
		&cfg.categorization.provider,
		&cfg.categorization.model,
	)
	.copied();

	Ok(Some(Arc::new(LlmCategorizer::new(
		completion,
		prompt,
		Some(recorder.clone()),
		pricing,
	))))
}

fn build_summarizer(cfg: &Config, recorder: &SharedUsageRecorder) -> Result<Arc<dyn Summarizer>> {
	if !cfg.summarization.enabled {
		return Ok(Arc::new(NoopSummarizer));
	}

	let completion = completion_for(cfg, &cfg.summarization.provider, &cfg.summarization.model)?;
	let prompt = mnemo_config::load_prompt(&cfg.summarization.prompt).map_err(|err| {
		Error::InvalidRequest { message: format!("summarization prompt: {err}") }
	})?;
	let pricing =
		mnemo_config::pricing_for(cfg, &cfg.summarization.provider, &cfg.summarization.model)
			.copied();

	Ok(Arc::new(LlmSummarizer::new(completion, prompt, Some(recorder.clone()), pricing)))
}

fn build_answer(cfg: &Config) -> Result<(Option<Arc<dyn CompletionProvider>>, String)> {
	if !cfg.rag.enabled {
		return Ok((None, String::new()));
	}

	let completion = completion_for(cfg, &cfg.rag.provider, &cfg.rag.model)?;
	let prompt = mnemo_config::load_prompt(&cfg.rag.prompt)
		.map_err(|err| Error::InvalidRequest { message: format!("rag prompt: {err}") })?;

	Ok((Some(completion), prompt))
}
