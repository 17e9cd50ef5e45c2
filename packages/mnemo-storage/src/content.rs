use serde_json::Value;
use uuid::Uuid;

use crate::{
	Error, Result,
	db::Db,
	models::{Content, NewContent},
};

const CONTENT_COLUMNS: &str = "\
id, source_id, title, body, content_hash, file_path, file_size, content_type, metadata, \
embedding_id, is_embedded, last_accessed_at, modified_at, summary, created_at, updated_at";

/// Whitelisted sort keys for [`Db::list_content`]. Anything else falls back
/// to `created_at`; this is policy, not an error.
const SORT_COLUMNS: [&str; 5] = ["id", "title", "created_at", "updated_at", "modified_at"];

#[derive(Clone, Debug)]
pub struct ListContentParams {
	pub limit: i64,
	pub offset: i64,
	pub sort_by: String,
	pub sort_order: String,
	pub filter_tags: Vec<String>,
}
impl Default for ListContentParams {
	fn default() -> Self {
		Self {
			limit: 20,
			offset: 0,
			sort_by: "created_at".to_string(),
			sort_order: "DESC".to_string(),
			filter_tags: Vec::new(),
		}
	}
}

impl Db {
	/// Inserts a content row without consulting the hash index. Most callers
	/// want [`Db::create_content_if_not_exists`].
	pub async fn create_content(&self, new: &NewContent) -> Result<Content> {
		let hash = mnemo_domain::hash::content_hash(&new.body);
		let metadata = new.metadata.clone().unwrap_or_else(|| Value::Object(Default::default()));
		let content = sqlx::query_as::<_, Content>(&format!(
			"\
INSERT INTO contents (source_id, title, body, content_hash, file_path, file_size, content_type, metadata, modified_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
RETURNING {CONTENT_COLUMNS}"
		))
		.bind(new.source_id)
		.bind(new.title.as_str())
		.bind(new.body.as_str())
		.bind(hash.as_str())
		.bind(new.file_path.as_deref())
		.bind(new.file_size)
		.bind(new.content_type.as_str())
		.bind(&metadata)
		.bind(new.modified_at)
		.fetch_one(&self.pool)
		.await
		.map_err(|err| Error::classify(err, "content"))?;

		Ok(content)
	}

	/// The deduplication gate. Computes the body hash, returns the existing
	/// row when one carries the same hash, inserts otherwise. Losing a
	/// concurrent-insert race re-fetches and returns the winning row, so for
	/// a given body the returned identity is stable across callers.
	pub async fn create_content_if_not_exists(&self, new: &NewContent) -> Result<(Content, bool)> {
		let hash = mnemo_domain::hash::content_hash(&new.body);

		if let Some(existing) = self.find_content_by_hash(&hash).await? {
			return Ok((existing, true));
		}

		match self.create_content(new).await {
			Ok(content) => Ok((content, false)),
			Err(err) if err.is_duplicate() => {
				let Some(winner) = self.find_content_by_hash(&hash).await? else {
					return Err(Error::NotFound(format!(
						"content with hash {hash} lost an insert race but was not re-fetched"
					)));
				};

				Ok((winner, true))
			},
			Err(err) => Err(err),
		}
	}

	pub async fn get_content(&self, id: i64) -> Result<Content> {
		sqlx::query_as::<_, Content>(&format!(
			"SELECT {CONTENT_COLUMNS} FROM contents WHERE id = $1"
		))
		.bind(id)
		.fetch_optional(&self.pool)
		.await?
		.ok_or_else(|| Error::NotFound(format!("content {id}")))
	}

	/// Batch fetch preserving the order of the requested ids. Missing ids
	/// yield `None` so callers can log and skip them.
	pub async fn get_contents_by_ids(&self, ids: &[i64]) -> Result<Vec<Option<Content>>> {
		if ids.is_empty() {
			return Ok(Vec::new());
		}

		let rows = sqlx::query_as::<_, Content>(&format!(
			"SELECT {CONTENT_COLUMNS} FROM contents WHERE id = ANY($1)"
		))
		.bind(ids)
		.fetch_all(&self.pool)
		.await?;
		let mut by_id = std::collections::HashMap::with_capacity(rows.len());

		for row in rows {
			by_id.insert(row.id, row);
		}

		Ok(ids.iter().map(|id| by_id.remove(id)).collect())
	}

	pub async fn find_content_by_hash(&self, hash: &str) -> Result<Option<Content>> {
		let content = sqlx::query_as::<_, Content>(&format!(
			"SELECT {CONTENT_COLUMNS} FROM contents WHERE content_hash = $1"
		))
		.bind(hash)
		.fetch_optional(&self.pool)
		.await?;

		Ok(content)
	}

	/// Rewrites the mutable columns of a content row, re-deriving the hash
	/// from the new body.
	pub async fn update_content(&self, content: &Content) -> Result<Content> {
		let hash = mnemo_domain::hash::content_hash(&content.body);

		sqlx::query_as::<_, Content>(&format!(
			"\
UPDATE contents
SET title = $1,
	body = $2,
	content_hash = $3,
	file_path = $4,
	file_size = $5,
	content_type = $6,
	metadata = $7,
	summary = $8,
	modified_at = $9,
	updated_at = now()
WHERE id = $10
RETURNING {CONTENT_COLUMNS}"
		))
		.bind(content.title.as_str())
		.bind(content.body.as_str())
		.bind(hash.as_str())
		.bind(content.file_path.as_deref())
		.bind(content.file_size)
		.bind(content.content_type.as_str())
		.bind(&content.metadata)
		.bind(content.summary.as_deref())
		.bind(content.modified_at)
		.bind(content.id)
		.fetch_optional(&self.pool)
		.await
		.map_err(|err| Error::classify(err, "content"))?
		.ok_or_else(|| Error::NotFound(format!("content {}", content.id)))
	}

	/// Writes the summary column only; commutes with embedding status updates.
	pub async fn update_content_summary(&self, content_id: i64, summary: &str) -> Result<()> {
		let result =
			sqlx::query("UPDATE contents SET summary = $1, updated_at = now() WHERE id = $2")
				.bind(summary)
				.bind(content_id)
				.execute(&self.pool)
				.await?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(format!("content {content_id}")));
		}

		Ok(())
	}

	/// Flips the embedded flag and the representative chunk UUID in one
	/// statement; this is the last step of a successful embedding run.
	pub async fn update_content_embedding_status(
		&self,
		content_id: i64,
		embedding_id: Option<Uuid>,
		is_embedded: bool,
	) -> Result<()> {
		let result = sqlx::query(
			"UPDATE contents SET is_embedded = $1, embedding_id = $2, updated_at = now() WHERE id = $3",
		)
		.bind(is_embedded)
		.bind(embedding_id)
		.bind(content_id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(format!("content {content_id}")));
		}

		Ok(())
	}

	/// Association rows cascade from the schema; the caller is responsible
	/// for deleting vector-store chunks first.
	pub async fn delete_content(&self, id: i64) -> Result<()> {
		let result = sqlx::query("DELETE FROM contents WHERE id = $1").bind(id).execute(&self.pool).await?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(format!("content {id}")));
		}

		Ok(())
	}

	pub async fn list_content(&self, params: &ListContentParams) -> Result<Vec<Content>> {
		let sort_by = if SORT_COLUMNS.contains(&params.sort_by.as_str()) {
			params.sort_by.as_str()
		} else {
			"created_at"
		};
		let sort_order = match params.sort_order.to_uppercase().as_str() {
			"ASC" => "ASC",
			_ => "DESC",
		};
		let limit = if params.limit <= 0 { 20 } else { params.limit };
		let offset = params.offset.max(0);
		let columns = prefixed_columns();

		let contents = if params.filter_tags.is_empty() {
			sqlx::query_as::<_, Content>(&format!(
				"\
SELECT {columns}
FROM contents c
ORDER BY c.{sort_by} {sort_order}
LIMIT $1 OFFSET $2"
			))
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.pool)
			.await?
		} else {
			sqlx::query_as::<_, Content>(&format!(
				"\
SELECT DISTINCT {columns}
FROM contents c
JOIN content_tags ct ON c.id = ct.content_id
JOIN tags t ON ct.tag_id = t.id
WHERE t.name = ANY($1)
ORDER BY c.{sort_by} {sort_order}
LIMIT $2 OFFSET $3"
			))
			.bind(&params.filter_tags)
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.pool)
			.await?
		};

		Ok(contents)
	}
}

fn prefixed_columns() -> String {
	CONTENT_COLUMNS
		.split(", ")
		.map(|column| format!("c.{column}"))
		.collect::<Vec<_>>()
		.join(", ")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prefixed_columns_cover_every_column() {
		let prefixed = prefixed_columns();

		assert!(prefixed.starts_with("c.id, c.source_id"));
		assert_eq!(prefixed.matches("c.").count(), 16);
	}
}
