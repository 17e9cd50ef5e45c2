#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Http(#[from] reqwest::Error),
	#[error("Provider {provider} responded with status {status}: {message}")]
	Api { provider: String, status: u16, message: String },
	#[error("Provider {0} is not initialized (missing API key).")]
	Disabled(String),
	#[error("Malformed provider response: {0}")]
	Malformed(String),
	#[error("Embedding dimension mismatch: got {got}, want {want}.")]
	DimensionMismatch { got: usize, want: usize },
	#[error("Provider returned {got} vectors for {want} inputs.")]
	CountMismatch { got: usize, want: usize },
	#[error("All embedding providers exhausted; last error: {0}")]
	Exhausted(Box<Error>),
	#[error("Provider misconfiguration: {0}")]
	Misconfigured(String),
}
impl Error {
	pub fn is_rate_limited(&self) -> bool {
		match self {
			Self::Api { status, .. } => *status == 429,
			Self::Http(err) => err.status().map(|status| status.as_u16() == 429).unwrap_or(false),
			_ => false,
		}
	}

	/// Worth another attempt against the same provider: transport failures,
	/// rate limits, and 5xx responses.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Api { status, .. } => *status == 429 || *status >= 500,
			Self::Http(err) =>
				err.is_timeout()
					|| err.is_connect()
					|| err.status().map(|status| status.as_u16() >= 500).unwrap_or(true),
			_ => false,
		}
	}

	/// Fails the provider outright and advances the rotation.
	pub fn is_permanent(&self) -> bool {
		!self.is_retryable()
	}
}
