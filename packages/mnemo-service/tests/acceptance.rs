//! End-to-end service tests against a scratch Postgres database with stub
//! providers. Requires pgvector; set MNEMO_PG_DSN to run.

use std::{str::FromStr, sync::Arc};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use uuid::Uuid;

use mnemo_config::Config;
use mnemo_providers::{
	BoxFuture, EmbeddingProvider, Result as ProviderResult, fallback::FallbackEmbedding,
	retry::SimpleRetryStrategy, usage::SharedUsageRecorder,
};
use mnemo_queue::QueueClient;
use mnemo_service::{AddContentParams, JobClient, NoopSummarizer, SemanticSearchParams, Service};
use mnemo_storage::{db::Db, models::NewEmbedding, vector::VectorStore};

const DIMENSION: u32 = 8;

fn env_dsn() -> Option<String> {
	std::env::var("MNEMO_PG_DSN").ok()
}

/// Deterministic embedding: a vector derived from text bytes, so distinct
/// texts land at distinct points and equal texts coincide.
struct StubEmbedding;
impl EmbeddingProvider for StubEmbedding {
	fn name(&self) -> &str {
		"stub"
	}

	fn model_name(&self) -> &str {
		"stub-model"
	}

	fn dimension(&self) -> u32 {
		DIMENSION
	}

	fn status(&self) -> mnemo_domain::ProviderStatus {
		mnemo_domain::ProviderStatus::Active
	}

	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, ProviderResult<Vec<f32>>> {
		Box::pin(async move { Ok(stub_vector(text)) })
	}

	fn embed_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(texts.iter().map(|text| stub_vector(text)).collect()) })
	}
}

fn stub_vector(text: &str) -> Vec<f32> {
	let mut vector = vec![0.0_f32; DIMENSION as usize];

	for (position, byte) in text.bytes().enumerate() {
		vector[position % DIMENSION as usize] += byte as f32 / 255.0;
	}

	vector
}

fn test_config(dsn: &str) -> Config {
	let raw = format!(
		r#"
[database.primary]
dsn = "{dsn}"

[database.vector]
dsn = "{dsn}"

[embedding]
model = "stub-model"
openai_api_key = "sk-test"
dimension = {DIMENSION}

[worker]
concurrency = 1

[worker.queues]
embeddings = 2
default = 1

[chunking]
max_tokens = 200
overlap = 50
"#
	);

	mnemo_config::from_str(&raw).expect("test config should parse")
}

async fn create_test_database(base_dsn: &str) -> (String, String, PgConnectOptions) {
	let base_options = PgConnectOptions::from_str(base_dsn).expect("Failed to parse MNEMO_PG_DSN.");
	let admin_options = base_options.clone().database("postgres");
	let mut admin = PgConnection::connect_with(&admin_options)
		.await
		.expect("Failed to connect to admin database.");
	let name = format!("mnemo_svc_{}", Uuid::new_v4().simple());

	admin
		.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
		.await
		.expect("Failed to create test database.");

	let dsn = base_options.database(&name).to_url_lossy().to_string();

	(name, dsn, admin_options)
}

async fn drop_test_database(name: &str, admin_options: &PgConnectOptions) {
	let mut admin = PgConnection::connect_with(admin_options)
		.await
		.expect("Failed to connect to admin database for cleanup.");

	let _ = admin
		.execute(format!(r#"DROP DATABASE IF EXISTS "{name}" WITH (FORCE)"#).as_str())
		.await;
}

async fn build_stub_service(dsn: &str) -> Service {
	let cfg = test_config(dsn);
	let db = Db::connect(&cfg.database.primary).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure primary schema.");

	let vectors = VectorStore::connect(&cfg.database.vector, DIMENSION)
		.await
		.expect("Failed to connect to vector store.");

	vectors.ensure_schema().await.expect("Failed to ensure vector schema.");

	let queue = QueueClient::new(db.pool.clone());

	queue.ensure_schema().await.expect("Failed to ensure queue schema.");

	let embedding = FallbackEmbedding::new(
		vec![Arc::new(StubEmbedding) as Arc<dyn EmbeddingProvider>],
		Some(Box::new(SimpleRetryStrategy { max_attempts: 1, base_delay_ms: 1 })),
	)
	.expect("Failed to build fallback service.");
	let usage_recorder: SharedUsageRecorder =
		Arc::new(mnemo_service::cost::DbUsageRecorder::new(db.clone()));

	Service {
		cfg: Arc::new(cfg),
		jobs: Some(JobClient::new(queue, db.clone())),
		db,
		vectors,
		embedding: Arc::new(embedding),
		batch_provider: None,
		categorizer: None,
		summarizer: Arc::new(NoopSummarizer),
		answer_completion: None,
		answer_prompt: String::new(),
		usage_recorder,
		http: reqwest::Client::new(),
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set MNEMO_PG_DSN to run."]
async fn ingestion_deduplicates_and_enqueues_once() {
	let Some(base_dsn) = env_dsn() else {
		eprintln!("Skipping ingestion_deduplicates_and_enqueues_once; set MNEMO_PG_DSN to run.");

		return;
	};
	let (name, dsn, admin_options) = create_test_database(&base_dsn).await;
	let service = build_stub_service(&dsn).await;
	let params = AddContentParams {
		source_name: "test".to_string(),
		title: Some("hello".to_string()),
		raw_input: "hello world".to_string(),
		source_type: "cli".to_string(),
	};
	let (first, existed_first) = service.add_content(&params).await.expect("First add failed.");
	let (second, existed_second) = service.add_content(&params).await.expect("Second add failed.");

	assert!(!existed_first);
	assert!(existed_second);
	assert_eq!(first.id, second.id);
	assert_eq!(
		first.content_hash,
		"b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
	);

	// Exactly one embedding task on the embeddings queue, despite two adds.
	let queued: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM queue_tasks WHERE queue = 'embeddings' AND task_type = 'embedding:generate'",
	)
	.fetch_one(&service.db.pool)
	.await
	.expect("Failed to count queue tasks.");
	let recorded: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM background_jobs WHERE task_type = 'embedding:generate' AND status = 'enqueued'",
	)
	.fetch_one(&service.db.pool)
	.await
	.expect("Failed to count job records.");

	assert_eq!(queued, 1);
	assert_eq!(recorded, 1);

	drop(service);
	drop_test_database(&name, &admin_options).await;
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set MNEMO_PG_DSN to run."]
async fn semantic_search_orders_by_distance_and_records_history() {
	let Some(base_dsn) = env_dsn() else {
		eprintln!(
			"Skipping semantic_search_orders_by_distance_and_records_history; set MNEMO_PG_DSN to run."
		);

		return;
	};
	let (name, dsn, admin_options) = create_test_database(&base_dsn).await;
	let service = build_stub_service(&dsn).await;

	// Two contents with hand-planted chunk embeddings, one matching the
	// query exactly.
	let mut ids = Vec::new();

	for body in ["quantum entanglement notes", "gardening calendar"] {
		let (content, _) = service
			.add_content(&AddContentParams {
				source_name: "test".to_string(),
				title: Some(body.to_string()),
				raw_input: body.to_string(),
				source_type: "cli".to_string(),
			})
			.await
			.expect("add failed");

		service
			.vectors
			.add_embedding(&NewEmbedding {
				id: None,
				content_id: content.id,
				chunk_text: body.to_string(),
				vector: pgvector::Vector::from(stub_vector(body)),
				metadata: serde_json::json!({ "chunk_index": 0, "total_chunks": 1, "parser": "fallback" }),
			})
			.await
			.expect("add embedding failed");

		ids.push(content.id);
	}

	let results = service
		.semantic_search(&SemanticSearchParams {
			query: "quantum entanglement notes".to_string(),
			limit: 2,
			filter_tags: Vec::new(),
		})
		.await
		.expect("semantic search failed");

	assert_eq!(results.len(), 2);
	assert_eq!(results[0].content.id, ids[0]);
	assert!(results[0].score <= results[1].score);

	let recorded: i64 = sqlx::query_scalar(
		"SELECT results_count FROM search_queries ORDER BY id DESC LIMIT 1",
	)
	.fetch_one(&service.db.pool)
	.await
	.map(|count: i32| count as i64)
	.expect("Failed to read recorded query.");

	assert_eq!(recorded, 2);

	drop(service);
	drop_test_database(&name, &admin_options).await;
}
