//! Typed payloads for the known task types. Unknown keys are preserved so
//! payloads written by newer versions still parse.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingPayload {
	pub content_id: i64,
	#[serde(flatten, default)]
	pub extra: Map<String, Value>,
}
impl EmbeddingPayload {
	pub fn new(content_id: i64) -> Self {
		Self { content_id, extra: Map::new() }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingCheckPayload {
	/// Task UUID of the originating `embedding:generate` job.
	pub job_uuid: Uuid,
	/// Provider-side batch job identifier to poll.
	pub batch_job_id: String,
	#[serde(flatten, default)]
	pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummarizationPayload {
	pub content_id: i64,
	#[serde(flatten, default)]
	pub extra: Map<String, Value>,
}
impl SummarizationPayload {
	pub fn new(content_id: i64) -> Self {
		Self { content_id, extra: Map::new() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn embedding_payload_keeps_unknown_keys() {
		let raw = serde_json::json!({ "content_id": 7, "schema": "public" });
		let payload: EmbeddingPayload = serde_json::from_value(raw).unwrap();

		assert_eq!(payload.content_id, 7);
		assert_eq!(payload.extra.get("schema").and_then(Value::as_str), Some("public"));
	}

	#[test]
	fn check_payload_round_trips() {
		let payload = EmbeddingCheckPayload {
			job_uuid: Uuid::new_v4(),
			batch_job_id: "batch_abc".to_string(),
			extra: Map::new(),
		};
		let encoded = serde_json::to_value(&payload).unwrap();
		let decoded: EmbeddingCheckPayload = serde_json::from_value(encoded).unwrap();

		assert_eq!(decoded.job_uuid, payload.job_uuid);
		assert_eq!(decoded.batch_job_id, "batch_abc");
	}
}
