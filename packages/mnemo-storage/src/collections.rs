use crate::{
	Error, Result,
	db::Db,
	models::{Collection, Content},
};

const COLLECTION_COLUMNS: &str = "id, name, description, is_pinned, created_at, updated_at";

impl Db {
	pub async fn create_collection(
		&self,
		name: &str,
		description: Option<&str>,
		is_pinned: bool,
	) -> Result<Collection> {
		if name.trim().is_empty() {
			return Err(Error::InvalidArgument("collection name must be non-empty".to_string()));
		}

		sqlx::query_as::<_, Collection>(&format!(
			"\
INSERT INTO collections (name, description, is_pinned)
VALUES ($1, $2, $3)
RETURNING {COLLECTION_COLUMNS}"
		))
		.bind(name.trim())
		.bind(description)
		.bind(is_pinned)
		.fetch_one(&self.pool)
		.await
		.map_err(|err| Error::classify(err, &format!("collection {name:?}")))
	}

	pub async fn get_collection(&self, id: i64) -> Result<Collection> {
		sqlx::query_as::<_, Collection>(&format!(
			"SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = $1"
		))
		.bind(id)
		.fetch_optional(&self.pool)
		.await?
		.ok_or_else(|| Error::NotFound(format!("collection {id}")))
	}

	pub async fn get_collection_by_name(&self, name: &str) -> Result<Option<Collection>> {
		let collection = sqlx::query_as::<_, Collection>(&format!(
			"SELECT {COLLECTION_COLUMNS} FROM collections WHERE name = $1"
		))
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		Ok(collection)
	}

	pub async fn get_or_create_collection(
		&self,
		name: &str,
		description: Option<&str>,
		is_pinned: bool,
	) -> Result<Collection> {
		if let Some(collection) = self.get_collection_by_name(name).await? {
			return Ok(collection);
		}

		match self.create_collection(name, description, is_pinned).await {
			Ok(collection) => Ok(collection),
			Err(err) if err.is_duplicate() => self
				.get_collection_by_name(name)
				.await?
				.ok_or_else(|| Error::NotFound(format!("collection {name:?}"))),
			Err(err) => Err(err),
		}
	}

	pub async fn list_collections(
		&self,
		limit: i64,
		offset: i64,
		pinned: Option<bool>,
	) -> Result<Vec<Collection>> {
		let limit = if limit <= 0 { 20 } else { limit };
		let collections = match pinned {
			Some(pinned) => {
				sqlx::query_as::<_, Collection>(&format!(
					"\
SELECT {COLLECTION_COLUMNS}
FROM collections
WHERE is_pinned = $1
ORDER BY name
LIMIT $2 OFFSET $3"
				))
				.bind(pinned)
				.bind(limit)
				.bind(offset.max(0))
				.fetch_all(&self.pool)
				.await?
			},
			None => {
				sqlx::query_as::<_, Collection>(&format!(
					"SELECT {COLLECTION_COLUMNS} FROM collections ORDER BY name LIMIT $1 OFFSET $2"
				))
				.bind(limit)
				.bind(offset.max(0))
				.fetch_all(&self.pool)
				.await?
			},
		};

		Ok(collections)
	}

	pub async fn update_collection(&self, collection: &Collection) -> Result<Collection> {
		sqlx::query_as::<_, Collection>(&format!(
			"\
UPDATE collections
SET name = $1, description = $2, is_pinned = $3, updated_at = now()
WHERE id = $4
RETURNING {COLLECTION_COLUMNS}"
		))
		.bind(collection.name.as_str())
		.bind(collection.description.as_deref())
		.bind(collection.is_pinned)
		.bind(collection.id)
		.fetch_optional(&self.pool)
		.await
		.map_err(|err| Error::classify(err, &format!("collection {:?}", collection.name)))?
		.ok_or_else(|| Error::NotFound(format!("collection {}", collection.id)))
	}

	pub async fn delete_collection(&self, id: i64) -> Result<()> {
		let result =
			sqlx::query("DELETE FROM collections WHERE id = $1").bind(id).execute(&self.pool).await?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(format!("collection {id}")));
		}

		Ok(())
	}

	/// Idempotent membership insert.
	pub async fn add_content_to_collection(&self, collection_id: i64, content_id: i64) -> Result<()> {
		sqlx::query(
			"\
INSERT INTO collection_contents (collection_id, content_id)
VALUES ($1, $2)
ON CONFLICT (collection_id, content_id) DO NOTHING",
		)
		.bind(collection_id)
		.bind(content_id)
		.execute(&self.pool)
		.await
		.map_err(|err| {
			Error::classify(err, &format!("collection {collection_id} content {content_id}"))
		})?;

		Ok(())
	}

	pub async fn remove_content_from_collection(
		&self,
		collection_id: i64,
		content_id: i64,
	) -> Result<()> {
		sqlx::query("DELETE FROM collection_contents WHERE collection_id = $1 AND content_id = $2")
			.bind(collection_id)
			.bind(content_id)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	pub async fn list_content_by_collection(
		&self,
		collection_id: i64,
		limit: i64,
		offset: i64,
	) -> Result<Vec<Content>> {
		let limit = if limit <= 0 { 20 } else { limit };
		let contents = sqlx::query_as::<_, Content>(
			"\
SELECT c.id, c.source_id, c.title, c.body, c.content_hash, c.file_path, c.file_size,
	c.content_type, c.metadata, c.embedding_id, c.is_embedded, c.last_accessed_at,
	c.modified_at, c.summary, c.created_at, c.updated_at
FROM contents c
JOIN collection_contents cc ON c.id = cc.content_id
WHERE cc.collection_id = $1
ORDER BY c.created_at DESC
LIMIT $2 OFFSET $3",
		)
		.bind(collection_id)
		.bind(limit)
		.bind(offset.max(0))
		.fetch_all(&self.pool)
		.await?;

		Ok(contents)
	}
}
