mod types;

use std::{env, fs, path::Path, sync::OnceLock};

use color_eyre::eyre;
use regex::Regex;

pub use types::{
	Categorization, Chunking, Config, Database, Embedding, Postgres, PricingInfo, Rag, Redis,
	Search, Service, Summarization, Worker,
};

pub fn load(path: &Path) -> color_eyre::Result<Config> {
	let raw = fs::read_to_string(path)?;

	from_str(&raw)
}

pub fn from_str(raw: &str) -> color_eyre::Result<Config> {
	let expanded = expand_env(raw);
	let cfg: Config = toml::from_str(&expanded)?;

	validate(&cfg)?;

	if cfg.redis.is_some() {
		tracing::warn!(
			"The redis section is recognized for compatibility only; the task queue runs on Postgres."
		);
	}

	Ok(cfg)
}

/// Substitutes `${VAR}` and `${VAR:-default}` occurrences with environment
/// values. An unset variable without a default expands to an empty string.
fn expand_env(raw: &str) -> String {
	static PATTERN: OnceLock<Regex> = OnceLock::new();
	let re = PATTERN
		.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid regex"));

	re.replace_all(raw, |caps: &regex::Captures| {
		let name = &caps[1];
		let fallback = caps.get(2).map(|m| m.as_str()).unwrap_or("");

		env::var(name).unwrap_or_else(|_| fallback.to_string())
	})
	.into_owned()
}

pub fn validate(cfg: &Config) -> color_eyre::Result<()> {
	if cfg.database.primary.dsn.trim().is_empty() {
		return Err(eyre::eyre!("database.primary.dsn must be non-empty."));
	}
	if cfg.database.vector.dsn.trim().is_empty() {
		return Err(eyre::eyre!("database.vector.dsn must be non-empty."));
	}
	if cfg.embedding.model.trim().is_empty() {
		return Err(eyre::eyre!("embedding.model must be non-empty."));
	}
	if cfg.embedding.dimension == 0 {
		return Err(eyre::eyre!("embedding.dimension must be greater than zero."));
	}

	match cfg.embedding.strategy.as_str() {
		"fallback" => {},
		"parallel" | "lowest_cost" => {
			return Err(eyre::eyre!(
				"embedding.strategy {:?} is not implemented; only fallback is available.",
				cfg.embedding.strategy
			));
		},
		other => {
			return Err(eyre::eyre!(
				"embedding.strategy must be one of fallback, parallel, or lowest_cost, got {other:?}."
			));
		},
	}

	if cfg.embedding.openai_api_key.trim().is_empty()
		&& cfg.embedding.google_api_key.trim().is_empty()
	{
		return Err(eyre::eyre!("At least one embedding provider API key must be configured."));
	}
	if cfg.embedding.use_batch_api && cfg.embedding.openai_api_key.trim().is_empty() {
		return Err(eyre::eyre!(
			"embedding.use_batch_api requires embedding.openai_api_key to be set."
		));
	}

	if cfg.search.default_limit <= 0 {
		return Err(eyre::eyre!("search.default_limit must be greater than zero."));
	}

	if cfg.worker.concurrency == 0 {
		return Err(eyre::eyre!("worker.concurrency must be greater than zero."));
	}
	if cfg.worker.queues.is_empty() {
		return Err(eyre::eyre!("worker.queues must contain at least one queue."));
	}

	for (queue, priority) in &cfg.worker.queues {
		if *priority == 0 {
			return Err(eyre::eyre!("worker.queues.{queue} priority must be greater than zero."));
		}
	}

	if cfg.chunking.max_tokens <= 0 {
		return Err(eyre::eyre!("chunking.max_tokens must be greater than zero."));
	}
	if cfg.chunking.overlap < 0 {
		return Err(eyre::eyre!("chunking.overlap must be zero or greater."));
	}
	if cfg.chunking.overlap >= cfg.chunking.max_tokens {
		return Err(eyre::eyre!("chunking.overlap must be less than chunking.max_tokens."));
	}

	if !matches!(cfg.categorization.r#type.as_str(), "" | "llm" | "none") {
		return Err(eyre::eyre!("categorization.type must be either llm or none."));
	}
	if cfg.categorization.r#type == "llm" && cfg.categorization.model.trim().is_empty() {
		return Err(eyre::eyre!("categorization.model must be set when categorization.type is llm."));
	}
	if cfg.summarization.enabled && cfg.summarization.model.trim().is_empty() {
		return Err(eyre::eyre!("summarization.model must be set when summarization is enabled."));
	}
	if cfg.rag.enabled && cfg.rag.model.trim().is_empty() {
		return Err(eyre::eyre!("rag.model must be set when rag is enabled."));
	}

	Ok(())
}

/// Resolves a prompt setting: a path to an existing file is read from disk,
/// anything else is used verbatim as the template text.
pub fn load_prompt(value: &str) -> color_eyre::Result<String> {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return Ok(String::new());
	}

	let path = Path::new(trimmed);

	if path.is_file() {
		return Ok(fs::read_to_string(path)?);
	}

	Ok(value.to_string())
}

/// Per-model pricing for a provider, or `None` with the caller expected to
/// log a WARN and skip cost recording.
pub fn pricing_for<'a>(
	cfg: &'a Config,
	provider: &str,
	model: &str,
) -> Option<&'a PricingInfo> {
	cfg.pricing.get(provider).and_then(|models| models.get(model))
}
