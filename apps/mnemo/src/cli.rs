use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
	name = "mnemo",
	about = "A personal knowledge base with hybrid search and AI enrichment.",
	version = mnemo_cli::VERSION,
	rename_all = "kebab",
	styles = mnemo_cli::styles(),
)]
pub struct Cli {
	#[arg(long, short = 'c', value_name = "FILE", default_value = "config.toml", global = true)]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Add content from a file path, URL, or raw text.
	Add {
		input: String,
		#[arg(long, default_value = "default")]
		source: String,
		#[arg(long)]
		title: Option<String>,
	},
	/// Recursively add every markdown file under a directory.
	AddRecursive {
		dir: PathBuf,
		#[arg(long)]
		source: Option<String>,
	},
	/// List stored content.
	List {
		#[arg(long, default_value_t = 20)]
		limit: i64,
		#[arg(long, default_value_t = 0)]
		offset: i64,
		#[arg(long, default_value = "created_at")]
		sort_by: String,
		#[arg(long, default_value = "DESC")]
		sort_order: String,
		/// Filter by tag name, match-any; repeatable.
		#[arg(long)]
		tag: Vec<String>,
	},
	/// Semantic search (or keyword search with --keyword).
	Search {
		query: String,
		#[arg(long)]
		keyword: bool,
		#[arg(long, short = 'k', default_value_t = 0)]
		limit: i64,
		#[arg(long)]
		tag: Vec<String>,
	},
	/// Keyword (full-text) search.
	Keyword {
		query: String,
		#[arg(long)]
		tag: Vec<String>,
	},
	/// Find content related to an already-embedded item.
	Related {
		id: i64,
		#[arg(long, short = 'k', default_value_t = 0)]
		limit: i64,
	},
	/// Delete a content item and its chunk embeddings.
	Delete { id: i64 },
	/// Attach tags to a content item.
	Tag {
		content_id: i64,
		#[arg(required = true)]
		tags: Vec<String>,
	},
	/// Manage collections.
	Collection {
		#[command(subcommand)]
		command: CollectionCommand,
	},
	/// Manage sources.
	Source {
		#[command(subcommand)]
		command: SourceCommand,
	},
	/// Search history.
	History {
		#[command(subcommand)]
		command: HistoryCommand,
	},
	/// LLM categorization.
	Categorize {
		#[command(subcommand)]
		command: CategorizeCommand,
	},
	/// Provider batch jobs.
	Batch {
		#[command(subcommand)]
		command: BatchCommand,
	},
	/// AI usage and cost accounting.
	Cost {
		#[command(subcommand)]
		command: CostCommand,
	},
	/// Ask a question answered from the knowledge base.
	Answer { query: String },
	/// Run the HTTP API server.
	Serve,
	/// Run the background worker.
	Worker,
	/// Check connectivity and configuration.
	Doctor,
}

#[derive(Debug, Subcommand)]
pub enum CollectionCommand {
	Create {
		name: String,
		#[arg(long)]
		description: Option<String>,
		#[arg(long)]
		pinned: bool,
	},
	List {
		#[arg(long)]
		pinned: bool,
	},
	Add { collection_id: i64, content_id: i64 },
	Remove { collection_id: i64, content_id: i64 },
	ListContent {
		collection_id: i64,
		#[arg(long, default_value_t = 20)]
		limit: i64,
	},
}

#[derive(Debug, Subcommand)]
pub enum SourceCommand {
	Create {
		name: String,
		#[arg(long)]
		description: Option<String>,
		#[arg(long)]
		url: Option<String>,
		#[arg(long = "type", default_value = "cli")]
		source_type: String,
	},
	List {
		#[arg(long, default_value_t = 20)]
		limit: i64,
	},
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
	List {
		#[arg(long, default_value_t = 20)]
		limit: i64,
	},
}

#[derive(Debug, Subcommand)]
pub enum CategorizeCommand {
	/// Categorize one item and apply the suggested tags and collection.
	Apply { content_id: i64 },
	/// Categorize several items; suggestions are printed, use --apply to
	/// attach them.
	Batch {
		#[arg(required = true)]
		content_ids: Vec<i64>,
		#[arg(long)]
		apply: bool,
	},
}

#[derive(Debug, Subcommand)]
pub enum BatchCommand {
	List {
		#[arg(long, default_value_t = 20)]
		limit: i64,
		#[arg(long, default_value_t = 0)]
		offset: i64,
	},
}

#[derive(Debug, Subcommand)]
pub enum CostCommand {
	List {
		#[arg(long, default_value_t = 20)]
		limit: i64,
		#[arg(long, default_value_t = 0)]
		offset: i64,
	},
	Summary,
}
