use crate::{Result, db::Db, models::Content};

impl Db {
	/// Tokenized full-text match over title and body under the `english`
	/// text-search configuration, optionally restricted to contents carrying
	/// any of the given tag slugs. Results come back by recency; FTS rank is
	/// deliberately not surfaced.
	pub async fn keyword_search_content(
		&self,
		query: &str,
		filter_tag_slugs: &[String],
	) -> Result<Vec<Content>> {
		let columns = "\
c.id, c.source_id, c.title, c.body, c.content_hash, c.file_path, c.file_size, c.content_type, \
c.metadata, c.embedding_id, c.is_embedded, c.last_accessed_at, c.modified_at, c.summary, \
c.created_at, c.updated_at";
		let contents = if filter_tag_slugs.is_empty() {
			sqlx::query_as::<_, Content>(&format!(
				"\
SELECT {columns}
FROM contents c
WHERE to_tsvector('english', c.title) @@ plainto_tsquery('english', $1)
	OR to_tsvector('english', c.body) @@ plainto_tsquery('english', $1)
ORDER BY c.created_at DESC"
			))
			.bind(query)
			.fetch_all(&self.pool)
			.await?
		} else {
			sqlx::query_as::<_, Content>(&format!(
				"\
SELECT DISTINCT {columns}
FROM contents c
JOIN content_tags ct ON c.id = ct.content_id
JOIN tags t ON ct.tag_id = t.id
WHERE t.slug = ANY($2)
	AND (to_tsvector('english', c.title) @@ plainto_tsquery('english', $1)
		OR to_tsvector('english', c.body) @@ plainto_tsquery('english', $1))
ORDER BY c.created_at DESC"
			))
			.bind(query)
			.bind(filter_tag_slugs)
			.fetch_all(&self.pool)
			.await?
		};

		Ok(contents)
	}
}
