use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Lifecycle of a background job record. Transitions are monotone within a
/// single worker attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Enqueued,
	ProcessingBatch,
	Pending,
	Running,
	Completed,
	Failed,
	Cancelled,
	Retrying,
	TimedOut,
}
impl JobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Enqueued => "enqueued",
			Self::ProcessingBatch => "processing_batch",
			Self::Pending => "pending",
			Self::Running => "running",
			Self::Completed => "completed",
			Self::Failed => "failed",
			Self::Cancelled => "cancelled",
			Self::Retrying => "retrying",
			Self::TimedOut => "timed_out",
		}
	}
}
impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for JobStatus {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"enqueued" => Self::Enqueued,
			"processing_batch" => Self::ProcessingBatch,
			"pending" => Self::Pending,
			"running" => Self::Running,
			"completed" => Self::Completed,
			"failed" => Self::Failed,
			"cancelled" => Self::Cancelled,
			"retrying" => Self::Retrying,
			"timed_out" => Self::TimedOut,
			other => return Err(UnknownStatus(other.to_string())),
		})
	}
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown job status: {0}.")]
pub struct UnknownStatus(pub String);

/// Operational state of an embedding or completion provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
	#[default]
	Unknown,
	Active,
	Inactive,
	Disabled,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_round_trips() {
		for status in [
			JobStatus::Enqueued,
			JobStatus::ProcessingBatch,
			JobStatus::Pending,
			JobStatus::Running,
			JobStatus::Completed,
			JobStatus::Failed,
			JobStatus::Cancelled,
			JobStatus::Retrying,
			JobStatus::TimedOut,
		] {
			assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
		}
		assert!("bogus".parse::<JobStatus>().is_err());
	}
}
