#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Duplicate: {0}")]
	Duplicate(String),
	#[error("Foreign key violation: {0}")]
	ForeignKeyViolation(String),
}
impl Error {
	/// Maps Postgres uniqueness and referential-integrity failures onto the
	/// storage taxonomy; anything else passes through as a raw sqlx error.
	pub(crate) fn classify(err: sqlx::Error, what: &str) -> Self {
		if let sqlx::Error::Database(db_err) = &err {
			match db_err.code().as_deref() {
				Some("23505") => return Self::Duplicate(what.to_string()),
				Some("23503") => return Self::ForeignKeyViolation(what.to_string()),
				_ => {},
			}
		}

		Self::Sqlx(err)
	}

	pub fn is_duplicate(&self) -> bool {
		matches!(self, Self::Duplicate(_))
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound(_))
	}
}
