use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, schema};

/// Connection pool for the primary record store.
#[derive(Clone)]
pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &mnemo_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		apply_schema(&self.pool, schema::PRIMARY_SCHEMA, 7_223_001).await
	}

	pub async fn ping(&self) -> Result<()> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;

		Ok(())
	}
}

/// Applies idempotent DDL statement by statement. Advisory locks are held per
/// connection, so a single transaction scopes the lock to one connection and
/// releases it when the transaction ends.
pub(crate) async fn apply_schema(pool: &PgPool, sql: &str, lock_id: i64) -> Result<()> {
	let mut tx = pool.begin().await?;

	sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(lock_id).execute(&mut *tx).await?;

	for statement in sql.split(';') {
		let trimmed = statement.trim();

		if trimmed.is_empty() {
			continue;
		}

		sqlx::query(trimmed).execute(&mut *tx).await?;
	}

	tx.commit().await?;

	Ok(())
}
