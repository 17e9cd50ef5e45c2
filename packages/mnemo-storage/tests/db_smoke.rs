use std::str::FromStr;

use sqlx::{ConnectOptions, Connection, Executor, postgres::{PgConnectOptions, PgConnection}};
use uuid::Uuid;

use mnemo_config::Postgres;
use mnemo_domain::JobStatus;
use mnemo_storage::{
	db::Db,
	jobs::JobRecordParams,
	models::NewContent,
};

fn env_dsn() -> Option<String> {
	std::env::var("MNEMO_PG_DSN").ok()
}

/// Creates a uniquely-named scratch database and returns its DSN. Tests drop
/// it on their way out; a leaked database from an aborted run is harmless.
async fn create_test_database(base_dsn: &str) -> (String, String, PgConnectOptions) {
	let base_options = PgConnectOptions::from_str(base_dsn).expect("Failed to parse MNEMO_PG_DSN.");
	let admin_options = base_options.clone().database("postgres");
	let mut admin = PgConnection::connect_with(&admin_options)
		.await
		.expect("Failed to connect to admin database.");
	let name = format!("mnemo_test_{}", Uuid::new_v4().simple());

	admin
		.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
		.await
		.expect("Failed to create test database.");

	let dsn = base_options.database(&name).to_url_lossy().to_string();

	(name, dsn, admin_options)
}

async fn drop_test_database(name: &str, admin_options: &PgConnectOptions) {
	let mut admin = PgConnection::connect_with(admin_options)
		.await
		.expect("Failed to connect to admin database for cleanup.");

	let _ = admin
		.execute(format!(r#"DROP DATABASE IF EXISTS "{name}" WITH (FORCE)"#).as_str())
		.await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn schema_bootstraps_and_content_deduplicates() {
	let Some(base_dsn) = env_dsn() else {
		eprintln!("Skipping schema_bootstraps_and_content_deduplicates; set MNEMO_PG_DSN to run.");

		return;
	};
	let (name, dsn, admin_options) = create_test_database(&base_dsn).await;
	let cfg = Postgres { dsn, pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let source = db
		.get_or_create_source("test", "cli", None)
		.await
		.expect("Failed to get or create source.");
	let new = NewContent {
		source_id: source.id,
		title: "hello".to_string(),
		body: "hello world".to_string(),
		content_type: "text/plain; charset=utf-8".to_string(),
		..Default::default()
	};
	let (first, existed_first) =
		db.create_content_if_not_exists(&new).await.expect("First insert failed.");
	let (second, existed_second) =
		db.create_content_if_not_exists(&new).await.expect("Second insert failed.");

	assert!(!existed_first);
	assert!(existed_second);
	assert_eq!(first.id, second.id);
	assert_eq!(
		first.content_hash,
		"b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
	);

	drop(db);
	drop_test_database(&name, &admin_options).await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn tag_association_is_idempotent() {
	let Some(base_dsn) = env_dsn() else {
		eprintln!("Skipping tag_association_is_idempotent; set MNEMO_PG_DSN to run.");

		return;
	};
	let (name, dsn, admin_options) = create_test_database(&base_dsn).await;
	let cfg = Postgres { dsn, pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let source = db.get_or_create_source("test", "cli", None).await.expect("source");
	let (content, _) = db
		.create_content_if_not_exists(&NewContent {
			source_id: source.id,
			title: "tagged".to_string(),
			body: "tagged body".to_string(),
			content_type: "text/plain; charset=utf-8".to_string(),
			..Default::default()
		})
		.await
		.expect("content");
	let tags = db
		.get_or_create_tags_by_name(&["Rust".to_string(), "Search".to_string()])
		.await
		.expect("tags");
	let tag_ids = tags.iter().map(|tag| tag.id).collect::<Vec<_>>();

	db.add_tags_to_content(content.id, &tag_ids).await.expect("first association");
	db.add_tags_to_content(content.id, &tag_ids).await.expect("second association");

	let attached = db.get_content_tags(content.id).await.expect("content tags");

	assert_eq!(attached.len(), 2);
	assert_eq!(attached[0].slug, "rust");

	drop(db);
	drop_test_database(&name, &admin_options).await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEMO_PG_DSN to run."]
async fn job_record_is_idempotent_and_cost_summary_starts_empty() {
	let Some(base_dsn) = env_dsn() else {
		eprintln!(
			"Skipping job_record_is_idempotent_and_cost_summary_starts_empty; set MNEMO_PG_DSN to run."
		);

		return;
	};
	let (name, dsn, admin_options) = create_test_database(&base_dsn).await;
	let cfg = Postgres { dsn, pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let summary = db.usage_summary().await.expect("usage summary");

	assert_eq!(summary.total_cost, 0.0);
	assert_eq!(summary.total_input_tokens, 0);
	assert_eq!(summary.total_output_tokens, 0);

	let params = JobRecordParams {
		job_id: Uuid::new_v4(),
		task_type: mnemo_domain::tasks::TYPE_EMBEDDING_GENERATE.to_string(),
		payload: serde_json::json!({ "content_id": 1 }),
		queue: "embeddings".to_string(),
		status: JobStatus::Enqueued,
		related_entity_type: Some("content".to_string()),
		related_entity_id: Some(1),
	};

	db.record_job_enqueue(&params).await.expect("first record");
	db.record_job_enqueue(&params).await.expect("duplicate record is a no-op");

	let count: i64 =
		sqlx::query_scalar("SELECT count(*) FROM background_jobs WHERE job_id = $1")
			.bind(params.job_id)
			.fetch_one(&db.pool)
			.await
			.expect("count jobs");

	assert_eq!(count, 1);

	drop(db);
	drop_test_database(&name, &admin_options).await;
}
