use pgvector::Vector;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Source {
	pub id: i64,
	pub name: String,
	pub description: Option<String>,
	pub url: Option<String>,
	pub source_type: String,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Content {
	pub id: i64,
	pub source_id: i64,
	pub title: String,
	pub body: String,
	pub content_hash: String,
	pub file_path: Option<String>,
	pub file_size: Option<i64>,
	pub content_type: String,
	pub metadata: Value,
	pub embedding_id: Option<Uuid>,
	pub is_embedded: bool,
	#[serde(with = "time::serde::rfc3339::option")]
	pub last_accessed_at: Option<OffsetDateTime>,
	#[serde(with = "time::serde::rfc3339::option")]
	pub modified_at: Option<OffsetDateTime>,
	pub summary: Option<String>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}

/// Insert shape for a content row. The hash is derived from the body inside
/// the store, never supplied by callers.
#[derive(Clone, Debug, Default)]
pub struct NewContent {
	pub source_id: i64,
	pub title: String,
	pub body: String,
	pub content_type: String,
	pub file_path: Option<String>,
	pub file_size: Option<i64>,
	pub modified_at: Option<OffsetDateTime>,
	pub metadata: Option<Value>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Tag {
	pub id: i64,
	pub name: String,
	pub slug: String,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Collection {
	pub id: i64,
	pub name: String,
	pub description: Option<String>,
	pub is_pinned: bool,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct SearchQuery {
	pub id: i64,
	pub query: String,
	pub results_count: i32,
	#[serde(with = "time::serde::rfc3339")]
	pub executed_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}

/// Ranked result attached to a recorded search query. `rank` is 1-based.
#[derive(Clone, Debug)]
pub struct NewSearchResult {
	pub content_id: i64,
	pub relevance_score: f64,
	pub rank: i32,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct BackgroundJob {
	pub id: i64,
	pub job_id: Uuid,
	pub task_type: String,
	pub payload: Value,
	pub queue: String,
	pub status: String,
	pub related_entity_type: Option<String>,
	pub related_entity_id: Option<i64>,
	pub batch_api_job_id: Option<String>,
	pub batch_input_file_id: Option<String>,
	pub batch_output_file_id: Option<String>,
	pub job_data: Option<Value>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct AiUsageLog {
	pub id: i64,
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	pub provider_name: String,
	pub service_type: String,
	pub model_name: String,
	pub input_tokens: i64,
	pub output_tokens: i64,
	pub cost: f64,
	pub related_content_id: Option<i64>,
	pub related_job_id: Option<Uuid>,
}

#[derive(Clone, Debug)]
pub struct NewUsage {
	pub provider_name: String,
	pub service_type: String,
	pub model_name: String,
	pub input_tokens: i64,
	pub output_tokens: i64,
	pub cost: f64,
	pub related_content_id: Option<i64>,
	pub related_job_id: Option<Uuid>,
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct UsageSummary {
	pub total_cost: f64,
	pub total_input_tokens: i64,
	pub total_output_tokens: i64,
}

/// One chunk row in the vector store.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct EmbeddingRow {
	pub id: Uuid,
	pub content_id: i64,
	pub chunk_text: String,
	pub vector: Vector,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct NewEmbedding {
	/// Auto-assigned when absent.
	pub id: Option<Uuid>,
	pub content_id: i64,
	pub chunk_text: String,
	pub vector: Vector,
	pub metadata: Value,
}

/// Similarity hit. `distance` is the raw L2 distance, smaller is closer.
#[derive(Clone, Debug)]
pub struct VectorHit {
	pub content_id: i64,
	pub distance: f64,
	pub chunk_text: String,
	pub metadata: Value,
}
