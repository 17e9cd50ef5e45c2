pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Permission denied reading {path}.")]
	PermissionDenied { path: String },
	#[error("Read error: {message}")]
	ReadError { message: String },
	#[error("Failed to fetch {url}{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
	FetchError { url: String, status: Option<u16>, message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Queue error: {message}")]
	Queue { message: String },
	#[error("{operation} is not implemented or not configured.")]
	NotImplemented { operation: String },
}
impl From<mnemo_storage::Error> for Error {
	fn from(err: mnemo_storage::Error) -> Self {
		match err {
			mnemo_storage::Error::NotFound(message) => Self::NotFound { message },
			mnemo_storage::Error::Duplicate(message) => Self::Conflict { message },
			mnemo_storage::Error::ForeignKeyViolation(message) => Self::InvalidRequest { message },
			mnemo_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			mnemo_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
		}
	}
}
impl From<mnemo_providers::Error> for Error {
	fn from(err: mnemo_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
impl From<mnemo_queue::Error> for Error {
	fn from(err: mnemo_queue::Error) -> Self {
		Self::Queue { message: err.to_string() }
	}
}
