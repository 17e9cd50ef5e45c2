use std::collections::HashMap;

use crate::{Error, Result, db::Db, models::Tag};

const TAG_COLUMNS: &str = "id, name, slug, created_at, updated_at";

impl Db {
	pub async fn create_tag(&self, name: &str) -> Result<Tag> {
		let trimmed = name.trim();

		if trimmed.is_empty() {
			return Err(Error::InvalidArgument("tag name must be non-empty".to_string()));
		}

		let slug = mnemo_domain::slug::slugify(trimmed);

		sqlx::query_as::<_, Tag>(&format!(
			"INSERT INTO tags (name, slug) VALUES ($1, $2) RETURNING {TAG_COLUMNS}"
		))
		.bind(trimmed)
		.bind(slug.as_str())
		.fetch_one(&self.pool)
		.await
		.map_err(|err| Error::classify(err, &format!("tag {trimmed:?}")))
	}

	pub async fn get_tag(&self, id: i64) -> Result<Tag> {
		sqlx::query_as::<_, Tag>(&format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = $1"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| Error::NotFound(format!("tag {id}")))
	}

	pub async fn get_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
		let tag = sqlx::query_as::<_, Tag>(&format!("SELECT {TAG_COLUMNS} FROM tags WHERE slug = $1"))
			.bind(slug)
			.fetch_optional(&self.pool)
			.await?;

		Ok(tag)
	}

	/// Get-or-create by display name, preserving input order. Races on the
	/// uniqueness index resolve to the winning row.
	pub async fn get_or_create_tags_by_name(&self, names: &[String]) -> Result<Vec<Tag>> {
		let mut tags = Vec::with_capacity(names.len());

		for name in names {
			let slug = mnemo_domain::slug::slugify(name);

			if slug.is_empty() {
				continue;
			}
			if let Some(tag) = self.get_tag_by_slug(&slug).await? {
				tags.push(tag);

				continue;
			}

			match self.create_tag(name).await {
				Ok(tag) => tags.push(tag),
				Err(err) if err.is_duplicate() => {
					let Some(tag) = self.get_tag_by_slug(&slug).await? else {
						return Err(Error::NotFound(format!("tag {name:?}")));
					};

					tags.push(tag);
				},
				Err(err) => return Err(err),
			}
		}

		Ok(tags)
	}

	pub async fn list_tags(&self, limit: i64, offset: i64) -> Result<Vec<Tag>> {
		let limit = if limit <= 0 { 50 } else { limit };
		let tags = sqlx::query_as::<_, Tag>(&format!(
			"SELECT {TAG_COLUMNS} FROM tags ORDER BY name LIMIT $1 OFFSET $2"
		))
		.bind(limit)
		.bind(offset.max(0))
		.fetch_all(&self.pool)
		.await?;

		Ok(tags)
	}

	/// Idempotent: re-associating an already-attached tag is a no-op.
	pub async fn add_tags_to_content(&self, content_id: i64, tag_ids: &[i64]) -> Result<()> {
		if tag_ids.is_empty() {
			return Ok(());
		}

		let mut tx = self.pool.begin().await?;

		for tag_id in tag_ids {
			sqlx::query(
				"\
INSERT INTO content_tags (content_id, tag_id)
VALUES ($1, $2)
ON CONFLICT (content_id, tag_id) DO NOTHING",
			)
			.bind(content_id)
			.bind(tag_id)
			.execute(&mut *tx)
			.await
			.map_err(|err| Error::classify(err, &format!("content {content_id} tag {tag_id}")))?;
		}

		tx.commit().await?;

		Ok(())
	}

	pub async fn remove_tag_from_content(&self, content_id: i64, tag_id: i64) -> Result<()> {
		sqlx::query("DELETE FROM content_tags WHERE content_id = $1 AND tag_id = $2")
			.bind(content_id)
			.bind(tag_id)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	pub async fn get_content_tags(&self, content_id: i64) -> Result<Vec<Tag>> {
		let tags = sqlx::query_as::<_, Tag>(
			"\
SELECT t.id, t.name, t.slug, t.created_at, t.updated_at
FROM tags t
JOIN content_tags ct ON t.id = ct.tag_id
WHERE ct.content_id = $1
ORDER BY t.name",
		)
		.bind(content_id)
		.fetch_all(&self.pool)
		.await?;

		Ok(tags)
	}

	pub async fn get_tags_for_contents(
		&self,
		content_ids: &[i64],
	) -> Result<HashMap<i64, Vec<Tag>>> {
		let mut by_content: HashMap<i64, Vec<Tag>> = HashMap::new();

		if content_ids.is_empty() {
			return Ok(by_content);
		}

		#[derive(sqlx::FromRow)]
		struct TaggedRow {
			content_id: i64,
			#[sqlx(flatten)]
			tag: Tag,
		}

		let rows = sqlx::query_as::<_, TaggedRow>(
			"\
SELECT ct.content_id, t.id, t.name, t.slug, t.created_at, t.updated_at
FROM tags t
JOIN content_tags ct ON t.id = ct.tag_id
WHERE ct.content_id = ANY($1)
ORDER BY t.name",
		)
		.bind(content_ids)
		.fetch_all(&self.pool)
		.await?;

		for row in rows {
			by_content.entry(row.content_id).or_default().push(row.tag);
		}

		Ok(by_content)
	}
}
