use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	pub database: Database,
	pub embedding: Embedding,
	#[serde(default)]
	pub search: Search,
	/// Recognized for compatibility with Redis-backed broker deployments.
	/// The task queue is Postgres-backed; a WARN is logged when this is set.
	pub redis: Option<Redis>,
	pub worker: Worker,
	pub chunking: Chunking,
	#[serde(default)]
	pub categorization: Categorization,
	#[serde(default)]
	pub summarization: Summarization,
	#[serde(default)]
	pub rag: Rag,
	/// pricing.<provider>.<model> = { input_per_token, output_per_token }.
	#[serde(default)]
	pub pricing: HashMap<String, HashMap<String, PricingInfo>>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { http_bind: "127.0.0.1:7878".to_string(), log_level: "info".to_string() }
	}
}

#[derive(Debug, Deserialize)]
pub struct Database {
	pub primary: Postgres,
	pub vector: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Embedding {
	pub model: String,
	#[serde(default)]
	pub openai_api_key: String,
	#[serde(default)]
	pub google_api_key: String,
	#[serde(default)]
	pub gemini_model_name: String,
	pub dimension: u32,
	#[serde(default)]
	pub use_batch_api: bool,
	#[serde(default = "default_strategy")]
	pub strategy: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_limit: i64,
}
impl Default for Search {
	fn default() -> Self {
		Self { default_limit: 10 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Redis {
	pub address: String,
	#[serde(default)]
	pub password: String,
	#[serde(default)]
	pub db: i64,
}

#[derive(Debug, Deserialize)]
pub struct Worker {
	pub concurrency: u32,
	/// Queue name to priority weight, higher weight means more picks.
	pub queues: HashMap<String, u32>,
}

#[derive(Debug, Deserialize)]
pub struct Chunking {
	pub max_tokens: i64,
	pub overlap: i64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Categorization {
	/// "llm" or "none".
	pub r#type: String,
	pub provider: String,
	pub model: String,
	/// Path to a prompt template file, or the template text itself.
	pub prompt_template: String,
	pub auto_apply_tags: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Summarization {
	pub enabled: bool,
	pub provider: String,
	pub model: String,
	pub prompt: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Rag {
	pub enabled: bool,
	pub provider: String,
	pub model: String,
	pub prompt: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Default)]
pub struct PricingInfo {
	#[serde(default)]
	pub input_per_token: f64,
	#[serde(default)]
	pub output_per_token: f64,
}

fn default_pool_max_conns() -> u32 {
	8
}

fn default_strategy() -> String {
	"fallback".to_string()
}
