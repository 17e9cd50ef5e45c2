//! Listing of jobs that went through the provider batch API.

use mnemo_storage::models::BackgroundJob;

use crate::{Result, Service};

impl Service {
	pub async fn list_batches(&self, limit: i64, offset: i64) -> Result<Vec<BackgroundJob>> {
		let limit = if limit <= 0 { 20 } else { limit };

		Ok(self.db.list_batch_jobs(limit, offset.max(0)).await?)
	}
}
