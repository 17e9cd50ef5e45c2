pub mod batch;
pub mod completion;
pub mod fallback;
pub mod gemini;
pub mod openai;
pub mod retry;
pub mod usage;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::{future::Future, pin::Pin};

use mnemo_domain::ProviderStatus;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single embedding backend. All providers composed into the fallback
/// service must agree on `dimension`; that is checked at construction.
pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn name(&self) -> &str;

	fn model_name(&self) -> &str;

	fn dimension(&self) -> u32;

	fn status(&self) -> ProviderStatus;

	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;

	fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

/// A chat-completion backend. Token usage is returned to the caller, which
/// owns cost recording for its own service kind.
pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn name(&self) -> &str;

	fn model_name(&self) -> &str;

	fn status(&self) -> ProviderStatus;

	fn complete<'a>(
		&'a self,
		messages: &'a [completion::ChatMessage],
	) -> BoxFuture<'a, Result<completion::CompletionOutput>>;
}
