use pgvector::Vector;
use serde_json::{Map, Value};
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use uuid::Uuid;

use crate::{
	Error, Result,
	db::apply_schema,
	models::{EmbeddingRow, NewEmbedding, VectorHit},
	schema,
};

/// Chunk-embedding store backed by the pgvector extension. Ordering uses raw
/// L2 distance, smaller is closer.
#[derive(Clone)]
pub struct VectorStore {
	pub pool: PgPool,
	pub dimension: u32,
}
impl VectorStore {
	pub async fn connect(cfg: &mnemo_config::Postgres, dimension: u32) -> Result<Self> {
		if dimension == 0 {
			return Err(Error::InvalidArgument(
				"vector store dimension must be greater than zero".to_string(),
			));
		}

		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool, dimension })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		apply_schema(&self.pool, &schema::render_vector_schema(self.dimension), 7_223_002).await
	}

	pub async fn ping(&self) -> Result<()> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;

		Ok(())
	}

	/// Inserts one chunk row, assigning a UUID when the caller did not.
	pub async fn add_embedding(&self, entry: &NewEmbedding) -> Result<Uuid> {
		if entry.vector.as_slice().len() != self.dimension as usize {
			return Err(Error::InvalidArgument(format!(
				"embedding dimension {} does not match configured dimension {}",
				entry.vector.as_slice().len(),
				self.dimension
			)));
		}

		let id = entry.id.unwrap_or_else(Uuid::new_v4);

		sqlx::query(
			"\
INSERT INTO embeddings (id, content_id, chunk_text, vector, metadata)
VALUES ($1, $2, $3, $4, $5)",
		)
		.bind(id)
		.bind(entry.content_id)
		.bind(entry.chunk_text.as_str())
		.bind(&entry.vector)
		.bind(&entry.metadata)
		.execute(&self.pool)
		.await
		.map_err(|err| Error::classify(err, &format!("embedding {id}")))?;

		Ok(id)
	}

	pub async fn get_embedding(&self, id: Uuid) -> Result<EmbeddingRow> {
		sqlx::query_as::<_, EmbeddingRow>(
			"SELECT id, content_id, chunk_text, vector, metadata, created_at FROM embeddings WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?
		.ok_or_else(|| Error::NotFound(format!("embedding {id}")))
	}

	/// Removes every chunk belonging to a content row; called before the
	/// primary row itself is deleted.
	pub async fn delete_embeddings_by_content_id(&self, content_id: i64) -> Result<u64> {
		let result = sqlx::query("DELETE FROM embeddings WHERE content_id = $1")
			.bind(content_id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}

	/// Nearest-neighbour query. The metadata filter knob is reserved; a
	/// non-empty filter is ignored with a WARN until filtering lands in the
	/// vector query itself.
	pub async fn similarity_search(
		&self,
		query_vector: &Vector,
		k: i64,
		filter_metadata: &Map<String, Value>,
	) -> Result<Vec<VectorHit>> {
		if !filter_metadata.is_empty() {
			tracing::warn!(
				filter_keys = ?filter_metadata.keys().collect::<Vec<_>>(),
				"Metadata filtering is not implemented for the vector query; returning unfiltered results."
			);
		}
		if query_vector.as_slice().len() != self.dimension as usize {
			return Err(Error::InvalidArgument(format!(
				"query dimension {} does not match configured dimension {}",
				query_vector.as_slice().len(),
				self.dimension
			)));
		}

		let k = if k <= 0 { 10 } else { k };
		let rows = sqlx::query(
			"\
SELECT content_id, chunk_text, metadata, (vector <-> $1) AS distance
FROM embeddings
ORDER BY vector <-> $1
LIMIT $2",
		)
		.bind(query_vector)
		.bind(k)
		.fetch_all(&self.pool)
		.await?;
		let mut hits = Vec::with_capacity(rows.len());

		for row in rows {
			hits.push(VectorHit {
				content_id: row.try_get("content_id")?,
				distance: row.try_get("distance")?,
				chunk_text: row.try_get("chunk_text")?,
				metadata: row.try_get("metadata")?,
			});
		}

		Ok(hits)
	}
}
