//! Hybrid retrieval: keyword search over the primary store's full-text
//! index, semantic search over the vector store, and related-content lookup
//! via the representative embedding. Query/result recording is best-effort
//! and never fails the caller.

use serde::Serialize;
use serde_json::Map;

use mnemo_storage::models::{Content, NewSearchResult, SearchQuery};

use crate::{Error, Result, Service};

#[derive(Clone, Debug, Default)]
pub struct KeywordSearchParams {
	pub query: String,
	pub filter_tags: Vec<String>,
	pub limit: i64,
	pub offset: i64,
}

#[derive(Clone, Debug, Default)]
pub struct SemanticSearchParams {
	pub query: String,
	pub limit: i64,
	pub filter_tags: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResultItem {
	pub content: Content,
	/// Keyword results carry 0.0 (FTS rank is not surfaced); semantic and
	/// related results carry raw L2 distance, smaller is closer.
	pub score: f64,
}

impl Service {
	pub async fn keyword_search(
		&self,
		params: &KeywordSearchParams,
	) -> Result<Vec<SearchResultItem>> {
		let query_record = self.record_query(&params.query).await;

		if params.limit > 0 || params.offset > 0 {
			tracing::warn!("Keyword search limit/offset parameters are currently ignored.");
		}

		let slugs = params
			.filter_tags
			.iter()
			.map(|tag| mnemo_domain::slug::slugify(tag))
			.filter(|slug| !slug.is_empty())
			.collect::<Vec<_>>();
		let contents = self.db.keyword_search_content(&params.query, &slugs).await?;
		let items = contents
			.into_iter()
			.map(|content| SearchResultItem { content, score: 0.0 })
			.collect::<Vec<_>>();

		self.record_results(query_record, &items).await;

		Ok(items)
	}

	pub async fn semantic_search(
		&self,
		params: &SemanticSearchParams,
	) -> Result<Vec<SearchResultItem>> {
		if !params.filter_tags.is_empty() {
			tracing::warn!(
				"Semantic search tag filtering is not yet implemented in the vector query; returning unfiltered results."
			);
		}

		let limit = if params.limit <= 0 { self.cfg.search.default_limit } else { params.limit };
		let query_record = self.record_query(&params.query).await;
		let query_vector = self.embedding.embed(&params.query).await?;
		let hits = self
			.vectors
			.similarity_search(&pgvector::Vector::from(query_vector), limit, &Map::new())
			.await?;
		let items = self.assemble_hits(&hits, None, usize::MAX).await?;

		self.record_results(query_record, &items).await;

		Ok(items)
	}

	/// Finds content similar to an already-embedded item via its
	/// representative chunk, excluding the item itself.
	pub async fn related_content(&self, content_id: i64, limit: i64) -> Result<Vec<SearchResultItem>> {
		let limit = if limit <= 0 { self.cfg.search.default_limit } else { limit };
		let source = self.db.get_content(content_id).await?;

		if !source.is_embedded {
			return Err(Error::InvalidRequest {
				message: format!("content {content_id} has not been embedded yet"),
			});
		}

		let Some(embedding_id) = source.embedding_id else {
			return Err(Error::InvalidRequest {
				message: format!("content {content_id} carries no representative embedding"),
			});
		};
		let representative = self.vectors.get_embedding(embedding_id).await?;
		let hits = self
			.vectors
			.similarity_search(&representative.vector, limit + 1, &Map::new())
			.await?;

		self.assemble_hits(&hits, Some(content_id), limit as usize).await
	}

	pub async fn list_search_history(&self, limit: i64) -> Result<Vec<SearchQuery>> {
		Ok(self.db.list_search_queries(limit).await?)
	}

	/// Maps vector hits onto full content rows, preserving hit order (closest
	/// first), dropping an excluded id, and logging ids missing from the
	/// primary store.
	async fn assemble_hits(
		&self,
		hits: &[mnemo_storage::models::VectorHit],
		exclude_content_id: Option<i64>,
		max_items: usize,
	) -> Result<Vec<SearchResultItem>> {
		let mut ids = Vec::with_capacity(hits.len());
		let mut scores = Vec::with_capacity(hits.len());

		for hit in hits {
			if exclude_content_id == Some(hit.content_id) {
				continue;
			}
			if ids.contains(&hit.content_id) {
				continue;
			}

			ids.push(hit.content_id);
			scores.push(hit.distance);
		}

		let contents = self.db.get_contents_by_ids(&ids).await?;
		let mut items = Vec::with_capacity(ids.len());

		for ((content, id), score) in contents.into_iter().zip(&ids).zip(&scores) {
			let Some(content) = content else {
				tracing::warn!(
					content_id = id,
					"Content found in the vector store but missing from the primary store."
				);

				continue;
			};

			items.push(SearchResultItem { content, score: *score });

			if items.len() >= max_items {
				break;
			}
		}

		Ok(items)
	}

	async fn record_query(&self, query: &str) -> Option<SearchQuery> {
		match self.db.record_search_query(query, 0).await {
			Ok(record) => Some(record),
			Err(err) => {
				tracing::warn!(query, error = %err, "Failed to record search query.");

				None
			},
		}
	}

	async fn record_results(&self, query_record: Option<SearchQuery>, items: &[SearchResultItem]) {
		let Some(record) = query_record else {
			return;
		};
		let results = items
			.iter()
			.enumerate()
			.map(|(position, item)| NewSearchResult {
				content_id: item.content.id,
				relevance_score: item.score,
				rank: position as i32 + 1,
			})
			.collect::<Vec<_>>();

		if let Err(err) = self.db.record_search_results(record.id, &results).await {
			tracing::warn!(query_id = record.id, error = %err, "Failed to record search results.");
		}
	}
}
