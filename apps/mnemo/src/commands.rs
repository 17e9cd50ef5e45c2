use color_eyre::eyre;

use mnemo_config::Config;
use mnemo_service::{
	AddContentParams, KeywordSearchParams, SearchResultItem, SemanticSearchParams, Service,
};
use mnemo_storage::content::ListContentParams;

use crate::cli::{
	BatchCommand, CategorizeCommand, CollectionCommand, Command, CostCommand, HistoryCommand,
	SourceCommand,
};

pub async fn dispatch(config: Config, command: Command) -> color_eyre::Result<()> {
	let service = Service::build(config).await.map_err(|err| eyre::eyre!("{err}"))?;

	match command {
		Command::Add { input, source, title } => {
			let params = AddContentParams {
				source_name: source,
				title,
				raw_input: input,
				source_type: "cli".to_string(),
			};
			let (content, existed) =
				service.add_content(&params).await.map_err(|err| eyre::eyre!("{err}"))?;

			if existed {
				println!("Already exists: #{} {}", content.id, content.title);
			} else {
				println!("Added: #{} {}", content.id, content.title);
			}
		},
		Command::AddRecursive { dir, source } => {
			let stats = service
				.add_recursive(&dir, source.as_deref())
				.await
				.map_err(|err| eyre::eyre!("{err}"))?;

			println!(
				"Found {} markdown files: {} added, {} skipped, {} errored.",
				stats.found, stats.added, stats.skipped, stats.errored
			);
		},
		Command::List { limit, offset, sort_by, sort_order, tag } => {
			let params =
				ListContentParams { limit, offset, sort_by, sort_order, filter_tags: tag };
			let items = service.list_content(&params).await.map_err(|err| eyre::eyre!("{err}"))?;

			for item in items {
				let tags = item
					.tags
					.iter()
					.map(|tag| tag.name.as_str())
					.collect::<Vec<_>>()
					.join(", ");

				println!(
					"#{}\t{}\t[{}]\t{}",
					item.content.id,
					item.content.title,
					tags,
					if item.content.is_embedded { "embedded" } else { "pending" }
				);
			}
		},
		Command::Search { query, keyword, limit, tag } => {
			let items = if keyword {
				service
					.keyword_search(&KeywordSearchParams {
						query,
						filter_tags: tag,
						limit: 0,
						offset: 0,
					})
					.await
			} else {
				service
					.semantic_search(&SemanticSearchParams { query, limit, filter_tags: tag })
					.await
			}
			.map_err(|err| eyre::eyre!("{err}"))?;

			print_results(&items);
		},
		Command::Keyword { query, tag } => {
			let items = service
				.keyword_search(&KeywordSearchParams {
					query,
					filter_tags: tag,
					limit: 0,
					offset: 0,
				})
				.await
				.map_err(|err| eyre::eyre!("{err}"))?;

			print_results(&items);
		},
		Command::Related { id, limit } => {
			let items =
				service.related_content(id, limit).await.map_err(|err| eyre::eyre!("{err}"))?;

			print_results(&items);
		},
		Command::Delete { id } => {
			service.delete_content(id).await.map_err(|err| eyre::eyre!("{err}"))?;

			println!("Deleted content #{id}.");
		},
		Command::Tag { content_id, tags } => {
			let attached =
				service.tag_content(content_id, &tags).await.map_err(|err| eyre::eyre!("{err}"))?;

			println!(
				"Tagged #{} with {}.",
				content_id,
				attached.iter().map(|tag| tag.name.as_str()).collect::<Vec<_>>().join(", ")
			);
		},
		Command::Collection { command } => run_collection(&service, command).await?,
		Command::Source { command } => run_source(&service, command).await?,
		Command::History { command } => match command {
			HistoryCommand::List { limit } => {
				let queries = service
					.list_search_history(limit)
					.await
					.map_err(|err| eyre::eyre!("{err}"))?;

				for query in queries {
					println!(
						"#{}\t{}\t{} results\t{}",
						query.id, query.query, query.results_count, query.executed_at
					);
				}
			},
		},
		Command::Categorize { command } => run_categorize(&service, command).await?,
		Command::Batch { command } => match command {
			BatchCommand::List { limit, offset } => {
				let jobs = service
					.list_batches(limit, offset)
					.await
					.map_err(|err| eyre::eyre!("{err}"))?;

				for job in jobs {
					println!(
						"{}\t{}\t{}\t{}",
						job.job_id,
						job.status,
						job.batch_api_job_id.as_deref().unwrap_or("-"),
						job.created_at
					);
				}
			},
		},
		Command::Cost { command } => match command {
			CostCommand::List { limit, offset } => {
				let rows =
					service.list_usage(limit, offset).await.map_err(|err| eyre::eyre!("{err}"))?;

				for row in rows {
					println!(
						"{}\t{}\t{}\t{}\tin:{} out:{}\t${:.6}",
						row.timestamp,
						row.provider_name,
						row.service_type,
						row.model_name,
						row.input_tokens,
						row.output_tokens,
						row.cost
					);
				}
			},
			CostCommand::Summary => {
				let summary = service.usage_summary().await.map_err(|err| eyre::eyre!("{err}"))?;

				println!("Total cost: ${:.6}", summary.total_cost);
				println!("Input tokens: {}", summary.total_input_tokens);
				println!("Output tokens: {}", summary.total_output_tokens);
			},
		},
		Command::Answer { query } => {
			let answer = service.answer(&query).await.map_err(|err| eyre::eyre!("{err}"))?;

			println!("{answer}");
		},
		Command::Doctor => {
			let report = service.doctor().await;

			println!("primary store: {}", if report.primary_ok { "ok" } else { "unreachable" });
			println!("vector store:  {}", if report.vector_ok { "ok" } else { "unreachable" });
			println!(
				"embedding:     {} ({}) [{}]",
				report.embedding_provider, report.embedding_model, report.embedding_status
			);
			println!("batch api:     {}", if report.batch_api { "enabled" } else { "disabled" });
			println!(
				"summarization: {}",
				if report.summarization { "enabled" } else { "disabled" }
			);
			println!(
				"categorization: {}",
				if report.categorization { "enabled" } else { "disabled" }
			);
			println!("answer (rag):  {}", if report.answer { "enabled" } else { "disabled" });
		},
		Command::Serve | Command::Worker => unreachable!("handled in main"),
	}

	Ok(())
}

fn print_results(items: &[SearchResultItem]) {
	for item in items {
		println!("#{}\t{:.4}\t{}", item.content.id, item.score, item.content.title);
	}

	if items.is_empty() {
		println!("No results.");
	}
}

async fn run_collection(
	service: &Service,
	command: CollectionCommand,
) -> color_eyre::Result<()> {
	match command {
		CollectionCommand::Create { name, description, pinned } => {
			let collection = service
				.db
				.create_collection(&name, description.as_deref(), pinned)
				.await
				.map_err(|err| eyre::eyre!("{err}"))?;

			println!("Created collection #{} {}.", collection.id, collection.name);
		},
		CollectionCommand::List { pinned } => {
			let filter = if pinned { Some(true) } else { None };
			let collections = service
				.db
				.list_collections(100, 0, filter)
				.await
				.map_err(|err| eyre::eyre!("{err}"))?;

			for collection in collections {
				println!(
					"#{}\t{}\t{}",
					collection.id,
					collection.name,
					if collection.is_pinned { "pinned" } else { "" }
				);
			}
		},
		CollectionCommand::Add { collection_id, content_id } => {
			service
				.db
				.add_content_to_collection(collection_id, content_id)
				.await
				.map_err(|err| eyre::eyre!("{err}"))?;

			println!("Added content #{content_id} to collection #{collection_id}.");
		},
		CollectionCommand::Remove { collection_id, content_id } => {
			service
				.db
				.remove_content_from_collection(collection_id, content_id)
				.await
				.map_err(|err| eyre::eyre!("{err}"))?;

			println!("Removed content #{content_id} from collection #{collection_id}.");
		},
		CollectionCommand::ListContent { collection_id, limit } => {
			let contents = service
				.db
				.list_content_by_collection(collection_id, limit, 0)
				.await
				.map_err(|err| eyre::eyre!("{err}"))?;

			for content in contents {
				println!("#{}\t{}", content.id, content.title);
			}
		},
	}

	Ok(())
}

async fn run_source(service: &Service, command: SourceCommand) -> color_eyre::Result<()> {
	match command {
		SourceCommand::Create { name, description, url, source_type } => {
			let source = service
				.db
				.create_source(&name, description.as_deref(), url.as_deref(), &source_type)
				.await
				.map_err(|err| eyre::eyre!("{err}"))?;

			println!("Created source #{} {}.", source.id, source.name);
		},
		SourceCommand::List { limit } => {
			let sources =
				service.db.list_sources(limit, 0).await.map_err(|err| eyre::eyre!("{err}"))?;

			for source in sources {
				println!(
					"#{}\t{}\t{}\t{}",
					source.id,
					source.name,
					source.source_type,
					source.url.as_deref().unwrap_or("-")
				);
			}
		},
	}

	Ok(())
}

async fn run_categorize(service: &Service, command: CategorizeCommand) -> color_eyre::Result<()> {
	match command {
		CategorizeCommand::Apply { content_id } => {
			let content =
				service.get_content(content_id).await.map_err(|err| eyre::eyre!("{err}"))?;
			let result = service
				.categorize_content(&content.title, &content.body, Vec::new())
				.await
				.map_err(|err| eyre::eyre!("{err}"))?;

			service
				.apply_categories(content_id, &result, true)
				.await
				.map_err(|err| eyre::eyre!("{err}"))?;

			println!(
				"Applied tags [{}] and collection {:?} (confidence {:.2}).",
				result.suggested_tags.join(", "),
				result.suggested_category,
				result.confidence
			);
		},
		CategorizeCommand::Batch { content_ids, apply } => {
			let results = service
				.batch_categorize(&content_ids)
				.await
				.map_err(|err| eyre::eyre!("{err}"))?;

			for (content_id, result) in &results {
				println!(
					"#{}\ttags [{}]\tcollection {:?}\tconfidence {:.2}",
					content_id,
					result.suggested_tags.join(", "),
					result.suggested_category,
					result.confidence
				);

				if apply {
					service
						.apply_categories(*content_id, result, true)
						.await
						.map_err(|err| eyre::eyre!("{err}"))?;
				}
			}

			let missing = content_ids.len() - results.len();

			if missing > 0 {
				println!("{missing} item(s) could not be categorized; see logs.");
			}
		},
	}

	Ok(())
}
