#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Queue misconfiguration: {0}")]
	Misconfigured(String),
	#[error("No handler registered for task type {0:?}.")]
	UnknownTaskType(String),
}
