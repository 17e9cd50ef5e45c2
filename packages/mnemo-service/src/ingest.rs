//! Ingestion orchestration: input processing, source resolution,
//! deduplicated persistence, and enrichment dispatch.

use std::path::Path;

use mnemo_domain::{SummarizationPayload, tasks};
use mnemo_queue::EnqueueOptions;
use mnemo_storage::models::{Content, NewContent, Tag};

use crate::{Result, Service, input};

#[derive(Clone, Debug)]
pub struct AddContentParams {
	pub source_name: String,
	pub title: Option<String>,
	pub raw_input: String,
	pub source_type: String,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct ContentResultItem {
	pub content: Content,
	pub tags: Vec<Tag>,
}

impl Service {
	/// Adds one item. Returns the content row and whether it already existed;
	/// duplicates never enqueue enrichment.
	pub async fn add_content(&self, params: &AddContentParams) -> Result<(Content, bool)> {
		let processed = input::process_input(&self.http, &params.raw_input).await?;
		let source = self
			.db
			.get_or_create_source(&params.source_name, &params.source_type, processed.url.as_deref())
			.await?;
		let title = resolve_title(params.title.as_deref(), processed.file_path.as_deref());
		let new = NewContent {
			source_id: source.id,
			title,
			body: processed.body,
			content_type: processed.content_type,
			file_path: processed.file_path,
			file_size: processed.file_size,
			modified_at: processed.mtime,
			metadata: Some(serde_json::Value::Object(processed.metadata)),
		};
		let (content, existed) = self.db.create_content_if_not_exists(&new).await?;

		if existed {
			tracing::info!(
				content_id = content.id,
				title = content.title,
				source = params.source_name,
				"Content already exists; skipping enrichment."
			);

			return Ok((content, true));
		}

		// Enrichment arm. A broker failure here is a hard failure; the
		// content row stays behind and remains eligible for re-ingestion.
		if let Some(jobs) = &self.jobs {
			jobs.enqueue_embedding_job(content.id).await?;
		} else {
			tracing::warn!(
				content_id = content.id,
				"No job client configured; skipping embedding enqueue."
			);
		}

		if self.cfg.categorization.auto_apply_tags && self.categorizer.is_some() {
			match self.categorize_content(&content.title, &content.body, Vec::new()).await {
				Ok(result) => {
					if let Err(err) = self.apply_categories(content.id, &result, true).await {
						tracing::warn!(
							content_id = content.id,
							error = %err,
							"Failed to apply categorization results."
						);
					}
				},
				Err(err) => {
					tracing::warn!(
						content_id = content.id,
						error = %err,
						"Auto-categorization failed; content is kept untagged."
					);
				},
			}
		}

		if self.cfg.summarization.enabled {
			if let Some(jobs) = &self.jobs {
				let queue = if self.cfg.worker.queues.contains_key(tasks::QUEUE_SUMMARIZATION) {
					tasks::QUEUE_SUMMARIZATION
				} else {
					tasks::QUEUE_DEFAULT
				};
				let payload = serde_json::to_value(SummarizationPayload::new(content.id))
					.expect("summarization payload serializes");

				jobs.enqueue(
					tasks::TYPE_SUMMARIZATION_GENERATE,
					&payload,
					Some("content"),
					Some(content.id),
					&EnqueueOptions { queue: queue.to_string(), ..Default::default() },
				)
				.await?;
			} else {
				tracing::warn!(
					content_id = content.id,
					"Summarization is enabled but no job client is configured."
				);
			}
		}

		tracing::info!(
			content_id = content.id,
			title = content.title,
			source = params.source_name,
			"Content added."
		);

		Ok((content, false))
	}

	pub async fn get_content(&self, id: i64) -> Result<Content> {
		Ok(self.db.get_content(id).await?)
	}

	pub async fn list_content(
		&self,
		params: &mnemo_storage::content::ListContentParams,
	) -> Result<Vec<ContentResultItem>> {
		let contents = self.db.list_content(params).await?;
		let mut items = Vec::with_capacity(contents.len());

		for content in contents {
			let tags = match self.db.get_content_tags(content.id).await {
				Ok(tags) => tags,
				Err(err) => {
					tracing::warn!(content_id = content.id, error = %err, "Failed to fetch tags.");

					Vec::new()
				},
			};

			items.push(ContentResultItem { content, tags });
		}

		Ok(items)
	}

	/// Deletes chunks first, then the content row, so a crash in between
	/// leaves no orphaned vectors.
	pub async fn delete_content(&self, id: i64) -> Result<()> {
		let removed = self.vectors.delete_embeddings_by_content_id(id).await?;

		if removed > 0 {
			tracing::info!(content_id = id, chunks = removed, "Deleted chunk embeddings.");
		}

		self.db.delete_content(id).await?;

		Ok(())
	}

	/// Get-or-creates the named tags and attaches them; idempotent.
	pub async fn tag_content(&self, content_id: i64, tag_names: &[String]) -> Result<Vec<Tag>> {
		let tags = self.db.get_or_create_tags_by_name(tag_names).await?;
		let tag_ids = tags.iter().map(|tag| tag.id).collect::<Vec<_>>();

		self.db.add_tags_to_content(content_id, &tag_ids).await?;

		Ok(tags)
	}
}

/// Caller title, else the file basename without its extension.
fn resolve_title(title: Option<&str>, file_path: Option<&str>) -> String {
	if let Some(title) = title
		&& !title.trim().is_empty()
	{
		return title.trim().to_string();
	}
	if let Some(path) = file_path
		&& let Some(stem) = Path::new(path).file_stem().and_then(|stem| stem.to_str())
	{
		return stem.to_string();
	}

	"untitled".to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn explicit_title_wins() {
		assert_eq!(resolve_title(Some("My Note"), Some("/tmp/notes/other.md")), "My Note");
	}

	#[test]
	fn falls_back_to_basename_without_extension() {
		assert_eq!(resolve_title(None, Some("/tmp/notes/weekly plan.md")), "weekly plan");
		assert_eq!(resolve_title(Some("  "), Some("/tmp/a/b.txt")), "b");
	}

	#[test]
	fn untitled_when_nothing_is_known() {
		assert_eq!(resolve_title(None, None), "untitled");
	}
}
