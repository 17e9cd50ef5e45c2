//! Inline DDL for both stores. Statements are idempotent so schema bootstrap
//! can run on every startup under an advisory lock.

pub const PRIMARY_SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS sources (
	id BIGSERIAL PRIMARY KEY,
	name TEXT NOT NULL UNIQUE,
	description TEXT,
	url TEXT,
	source_type TEXT NOT NULL DEFAULT '',
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS contents (
	id BIGSERIAL PRIMARY KEY,
	source_id BIGINT NOT NULL REFERENCES sources(id),
	title TEXT NOT NULL,
	body TEXT NOT NULL,
	content_hash TEXT NOT NULL UNIQUE,
	file_path TEXT,
	file_size BIGINT,
	content_type TEXT NOT NULL DEFAULT 'text/plain; charset=utf-8',
	metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
	embedding_id UUID,
	is_embedded BOOLEAN NOT NULL DEFAULT FALSE,
	last_accessed_at TIMESTAMPTZ,
	modified_at TIMESTAMPTZ,
	summary TEXT,
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS contents_title_fts_idx
	ON contents USING GIN (to_tsvector('english', title));
CREATE INDEX IF NOT EXISTS contents_body_fts_idx
	ON contents USING GIN (to_tsvector('english', body));
CREATE TABLE IF NOT EXISTS tags (
	id BIGSERIAL PRIMARY KEY,
	name TEXT NOT NULL UNIQUE,
	slug TEXT NOT NULL UNIQUE,
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS content_tags (
	content_id BIGINT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
	tag_id BIGINT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
	PRIMARY KEY (content_id, tag_id)
);
CREATE TABLE IF NOT EXISTS collections (
	id BIGSERIAL PRIMARY KEY,
	name TEXT NOT NULL UNIQUE,
	description TEXT,
	is_pinned BOOLEAN NOT NULL DEFAULT FALSE,
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS collection_contents (
	collection_id BIGINT NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
	content_id BIGINT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
	PRIMARY KEY (collection_id, content_id)
);
CREATE TABLE IF NOT EXISTS search_queries (
	id BIGSERIAL PRIMARY KEY,
	query TEXT NOT NULL,
	results_count INT NOT NULL DEFAULT 0,
	executed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS search_results (
	id BIGSERIAL PRIMARY KEY,
	search_query_id BIGINT NOT NULL REFERENCES search_queries(id) ON DELETE CASCADE,
	content_id BIGINT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
	relevance_score DOUBLE PRECISION NOT NULL DEFAULT 0,
	rank INT NOT NULL,
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS background_jobs (
	id BIGSERIAL PRIMARY KEY,
	job_id UUID NOT NULL UNIQUE,
	task_type TEXT NOT NULL,
	payload JSONB NOT NULL DEFAULT '{}'::jsonb,
	queue TEXT NOT NULL DEFAULT 'default',
	status TEXT NOT NULL DEFAULT 'enqueued',
	related_entity_type TEXT,
	related_entity_id BIGINT,
	batch_api_job_id TEXT,
	batch_input_file_id TEXT,
	batch_output_file_id TEXT,
	job_data JSONB,
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS background_jobs_batch_api_job_id_idx
	ON background_jobs (batch_api_job_id) WHERE batch_api_job_id IS NOT NULL;
CREATE TABLE IF NOT EXISTS ai_usage_logs (
	id BIGSERIAL PRIMARY KEY,
	timestamp TIMESTAMPTZ NOT NULL DEFAULT now(),
	provider_name TEXT NOT NULL,
	service_type TEXT NOT NULL,
	model_name TEXT NOT NULL,
	input_tokens BIGINT NOT NULL DEFAULT 0,
	output_tokens BIGINT NOT NULL DEFAULT 0,
	cost DOUBLE PRECISION NOT NULL DEFAULT 0,
	related_content_id BIGINT,
	related_job_id UUID
);
CREATE INDEX IF NOT EXISTS ai_usage_logs_timestamp_idx ON ai_usage_logs (timestamp)";

const VECTOR_SCHEMA: &str = "\
CREATE EXTENSION IF NOT EXISTS vector;
CREATE TABLE IF NOT EXISTS embeddings (
	id UUID PRIMARY KEY,
	content_id BIGINT NOT NULL,
	chunk_text TEXT NOT NULL,
	vector vector(<VECTOR_DIM>) NOT NULL,
	metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
	created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS embeddings_content_id_idx ON embeddings (content_id);
CREATE INDEX IF NOT EXISTS embeddings_vector_l2_idx
	ON embeddings USING ivfflat (vector vector_l2_ops) WITH (lists = 100)";

pub fn render_vector_schema(vector_dim: u32) -> String {
	VECTOR_SCHEMA.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn vector_schema_renders_dimension() {
		let sql = render_vector_schema(1536);

		assert!(sql.contains("vector(1536)"));
		assert!(!sql.contains("<VECTOR_DIM>"));
	}
}
