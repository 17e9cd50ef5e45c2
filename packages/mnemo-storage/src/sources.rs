use crate::{Error, Result, db::Db, models::Source};

const SOURCE_COLUMNS: &str = "id, name, description, url, source_type, created_at, updated_at";

impl Db {
	pub async fn create_source(
		&self,
		name: &str,
		description: Option<&str>,
		url: Option<&str>,
		source_type: &str,
	) -> Result<Source> {
		if name.trim().is_empty() {
			return Err(Error::InvalidArgument("source name must be non-empty".to_string()));
		}

		sqlx::query_as::<_, Source>(&format!(
			"\
INSERT INTO sources (name, description, url, source_type)
VALUES ($1, $2, $3, $4)
RETURNING {SOURCE_COLUMNS}"
		))
		.bind(name)
		.bind(description)
		.bind(url)
		.bind(source_type)
		.fetch_one(&self.pool)
		.await
		.map_err(|err| Error::classify(err, &format!("source {name:?}")))
	}

	pub async fn get_source(&self, id: i64) -> Result<Source> {
		sqlx::query_as::<_, Source>(&format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = $1"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| Error::NotFound(format!("source {id}")))
	}

	pub async fn get_source_by_name(&self, name: &str) -> Result<Option<Source>> {
		let source = sqlx::query_as::<_, Source>(&format!(
			"SELECT {SOURCE_COLUMNS} FROM sources WHERE name = $1"
		))
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		Ok(source)
	}

	/// Resolves the named source, creating it on first ingestion. Losing the
	/// uniqueness race falls back to the winner's row.
	pub async fn get_or_create_source(
		&self,
		name: &str,
		source_type: &str,
		url: Option<&str>,
	) -> Result<Source> {
		if let Some(source) = self.get_source_by_name(name).await? {
			return Ok(source);
		}

		match self.create_source(name, None, url, source_type).await {
			Ok(source) => Ok(source),
			Err(err) if err.is_duplicate() => self
				.get_source_by_name(name)
				.await?
				.ok_or_else(|| Error::NotFound(format!("source {name:?}"))),
			Err(err) => Err(err),
		}
	}

	pub async fn list_sources(&self, limit: i64, offset: i64) -> Result<Vec<Source>> {
		let limit = if limit <= 0 { 20 } else { limit };
		let sources = sqlx::query_as::<_, Source>(&format!(
			"SELECT {SOURCE_COLUMNS} FROM sources ORDER BY name LIMIT $1 OFFSET $2"
		))
		.bind(limit)
		.bind(offset.max(0))
		.fetch_all(&self.pool)
		.await?;

		Ok(sources)
	}
}
