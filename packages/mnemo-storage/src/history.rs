use crate::{
	Result,
	db::Db,
	models::{NewSearchResult, SearchQuery},
};

const QUERY_COLUMNS: &str = "id, query, results_count, executed_at, created_at, updated_at";

impl Db {
	/// Records a query row; the results count starts at zero and is updated
	/// once retrieval finishes.
	pub async fn record_search_query(&self, query: &str, results_count: i32) -> Result<SearchQuery> {
		let record = sqlx::query_as::<_, SearchQuery>(&format!(
			"\
INSERT INTO search_queries (query, results_count)
VALUES ($1, $2)
RETURNING {QUERY_COLUMNS}"
		))
		.bind(query)
		.bind(results_count)
		.fetch_one(&self.pool)
		.await?;

		Ok(record)
	}

	pub async fn list_search_queries(&self, limit: i64) -> Result<Vec<SearchQuery>> {
		let limit = if limit <= 0 { 20 } else { limit };
		let queries = sqlx::query_as::<_, SearchQuery>(&format!(
			"SELECT {QUERY_COLUMNS} FROM search_queries ORDER BY executed_at DESC LIMIT $1"
		))
		.bind(limit)
		.fetch_all(&self.pool)
		.await?;

		Ok(queries)
	}

	/// Updates the query row's count and appends the ranked results in one
	/// transaction so a recorded query never carries half its results.
	pub async fn record_search_results(
		&self,
		query_id: i64,
		results: &[NewSearchResult],
	) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("UPDATE search_queries SET results_count = $1, updated_at = now() WHERE id = $2")
			.bind(results.len() as i32)
			.bind(query_id)
			.execute(&mut *tx)
			.await?;

		for result in results {
			sqlx::query(
				"\
INSERT INTO search_results (search_query_id, content_id, relevance_score, rank)
VALUES ($1, $2, $3, $4)",
			)
			.bind(query_id)
			.bind(result.content_id)
			.bind(result.relevance_score)
			.bind(result.rank)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
