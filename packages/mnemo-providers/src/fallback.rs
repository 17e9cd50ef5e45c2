//! Provider rotation. Providers are tried in order; the retry strategy
//! governs per-provider attempts, and exhausting a provider's budget advances
//! the shared active index. When the rotation returns to where this call
//! started, the call fails with the last provider error.

use std::sync::{Arc, RwLock};

use mnemo_domain::ProviderStatus;

use crate::{
	BoxFuture, EmbeddingProvider, Error, Result,
	retry::{RetryStrategy, SimpleRetryStrategy},
};

pub struct FallbackEmbedding {
	providers: Vec<Arc<dyn EmbeddingProvider>>,
	/// Shared rotation cursor. Reads take the shared guard, rotation takes
	/// the exclusive guard; no provider is ever called while a guard is held.
	active: RwLock<usize>,
	strategy: Box<dyn RetryStrategy>,
}
impl FallbackEmbedding {
	pub fn new(
		providers: Vec<Arc<dyn EmbeddingProvider>>,
		strategy: Option<Box<dyn RetryStrategy>>,
	) -> Result<Self> {
		if providers.is_empty() {
			return Err(Error::Misconfigured(
				"at least one embedding provider is required".to_string(),
			));
		}

		let dimension = providers[0].dimension();

		for provider in &providers[1..] {
			if provider.dimension() != dimension {
				return Err(Error::Misconfigured(format!(
					"all embedding providers must share one dimension (provider {} has {}, expected {dimension})",
					provider.name(),
					provider.dimension(),
				)));
			}
		}

		Ok(Self {
			providers,
			active: RwLock::new(0),
			strategy: strategy.unwrap_or_else(|| Box::new(SimpleRetryStrategy::default())),
		})
	}

	fn active_index(&self) -> usize {
		*self.active.read().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Advances the rotation and reports whether it wrapped back to
	/// `initial`, i.e. every provider has been exhausted for this call.
	fn rotate(&self, initial: usize) -> (usize, bool) {
		let mut active = self.active.write().unwrap_or_else(|poisoned| poisoned.into_inner());
		let next = (*active + 1) % self.providers.len();

		if next == initial {
			return (*active, true);
		}

		*active = next;

		tracing::warn!(
			provider = self.providers[next].name(),
			index = next,
			"Switching active embedding provider."
		);

		(next, false)
	}

	async fn run<'s, T, F>(&'s self, call: F) -> Result<T>
	where
		F: Fn(&'s dyn EmbeddingProvider) -> BoxFuture<'s, Result<T>>,
	{
		let cycle_start = self.active_index();
		let mut attempt: u32 = 0;
		let mut last_error: Option<Error> = None;

		loop {
			let provider: &'s dyn EmbeddingProvider =
				self.providers[self.active_index()].as_ref();
			let result = call(provider).await;

			match result {
				Ok(value) => return Ok(value),
				Err(err) => {
					tracing::warn!(
						provider = provider.name(),
						model = provider.model_name(),
						attempt,
						error = %err,
						"Embedding provider call failed."
					);

					let permanent = err.is_permanent();

					last_error = Some(err);

					let backoff_ms =
						if permanent { -1 } else { self.strategy.next_backoff_ms(attempt) };

					if backoff_ms < 0 {
						// The cycle anchor is the index active when this call
						// began; wrapping back to it means every provider had
						// its chance.
						let (_, exhausted) = self.rotate(cycle_start);

						if exhausted {
							let last = last_error
								.take()
								.unwrap_or_else(|| Error::Misconfigured("no providers".to_string()));

							return Err(Error::Exhausted(Box::new(last)));
						}

						attempt = 0;

						continue;
					}

					tokio::time::sleep(std::time::Duration::from_millis(backoff_ms as u64)).await;

					attempt += 1;
				},
			}
		}
	}
}

impl EmbeddingProvider for FallbackEmbedding {
	fn name(&self) -> &str {
		self.providers[self.active_index()].name()
	}

	fn model_name(&self) -> &str {
		self.providers[self.active_index()].model_name()
	}

	fn dimension(&self) -> u32 {
		self.providers[0].dimension()
	}

	fn status(&self) -> ProviderStatus {
		self.providers[self.active_index()].status()
	}

	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			if text.is_empty() {
				return Ok(vec![0.0; self.dimension() as usize]);
			}

			let want = self.dimension() as usize;
			let vector = self.run(|provider| provider.embed(text)).await?;

			if vector.len() != want {
				return Err(Error::DimensionMismatch { got: vector.len(), want });
			}

			Ok(vector)
		})
	}

	fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			if texts.is_empty() {
				return Ok(Vec::new());
			}

			let want = self.dimension() as usize;
			let vectors = self
				.run(|provider| {
					let provider_future = provider.embed_batch(texts);

					Box::pin(async move {
						let vectors = provider_future.await?;

						// A count or dimension mismatch is a provider bug and
						// counts as a failure for rotation purposes.
						if vectors.len() != texts.len() {
							return Err(Error::CountMismatch {
								got: vectors.len(),
								want: texts.len(),
							});
						}

						for vector in &vectors {
							if vector.len() != want {
								return Err(Error::DimensionMismatch {
									got: vector.len(),
									want,
								});
							}
						}

						Ok(vectors)
					}) as BoxFuture<'_, Result<Vec<Vec<f32>>>>
				})
				.await?;

			Ok(vectors)
		})
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	struct StubProvider {
		name: &'static str,
		dimension: u32,
		failures_before_success: usize,
		calls: AtomicUsize,
	}
	impl StubProvider {
		fn new(name: &'static str, dimension: u32, failures_before_success: usize) -> Self {
			Self { name, dimension, failures_before_success, calls: AtomicUsize::new(0) }
		}
	}
	impl EmbeddingProvider for StubProvider {
		fn name(&self) -> &str {
			self.name
		}

		fn model_name(&self) -> &str {
			"stub-model"
		}

		fn dimension(&self) -> u32 {
			self.dimension
		}

		fn status(&self) -> ProviderStatus {
			ProviderStatus::Active
		}

		fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst);

				if call < self.failures_before_success {
					return Err(Error::Api {
						provider: self.name.to_string(),
						status: 500,
						message: "transient".to_string(),
					});
				}

				Ok(vec![1.0; self.dimension as usize])
			})
		}

		fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst);

				if call < self.failures_before_success {
					return Err(Error::Api {
						provider: self.name.to_string(),
						status: 500,
						message: "transient".to_string(),
					});
				}

				Ok(vec![vec![1.0; self.dimension as usize]; texts.len()])
			})
		}
	}

	fn fast_strategy(max_attempts: u32) -> Option<Box<dyn RetryStrategy>> {
		Some(Box::new(SimpleRetryStrategy { max_attempts, base_delay_ms: 1 }))
	}

	#[test]
	fn construction_rejects_mismatched_dimensions() {
		let providers: Vec<Arc<dyn EmbeddingProvider>> = vec![
			Arc::new(StubProvider::new("a", 8, 0)),
			Arc::new(StubProvider::new("b", 16, 0)),
		];

		assert!(matches!(
			FallbackEmbedding::new(providers, None),
			Err(Error::Misconfigured(_))
		));
	}

	#[tokio::test]
	async fn empty_text_short_circuits_to_zero_vector() {
		let providers: Vec<Arc<dyn EmbeddingProvider>> =
			vec![Arc::new(StubProvider::new("a", 4, 9_999))];
		let fallback = FallbackEmbedding::new(providers, fast_strategy(1)).unwrap();
		let vector = fallback.embed("").await.unwrap();

		assert_eq!(vector, vec![0.0; 4]);
	}

	#[tokio::test]
	async fn retries_then_succeeds_on_same_provider() {
		let providers: Vec<Arc<dyn EmbeddingProvider>> =
			vec![Arc::new(StubProvider::new("a", 4, 2))];
		let fallback = FallbackEmbedding::new(providers, fast_strategy(3)).unwrap();
		let vector = fallback.embed("hello").await.unwrap();

		assert_eq!(vector.len(), 4);
	}

	#[tokio::test]
	async fn rotates_to_second_provider_after_exhaustion() {
		let first = Arc::new(StubProvider::new("a", 4, 9_999));
		let second = Arc::new(StubProvider::new("b", 4, 0));
		let providers: Vec<Arc<dyn EmbeddingProvider>> = vec![first.clone(), second.clone()];
		let fallback = FallbackEmbedding::new(providers, fast_strategy(2)).unwrap();
		let vector = fallback.embed("hello").await.unwrap();

		assert_eq!(vector.len(), 4);
		assert_eq!(first.calls.load(Ordering::SeqCst), 3);
		assert_eq!(second.calls.load(Ordering::SeqCst), 1);
		assert_eq!(fallback.name(), "b");
	}

	#[tokio::test]
	async fn fails_with_exhausted_after_full_rotation() {
		let providers: Vec<Arc<dyn EmbeddingProvider>> = vec![
			Arc::new(StubProvider::new("a", 4, 9_999)),
			Arc::new(StubProvider::new("b", 4, 9_999)),
		];
		let fallback = FallbackEmbedding::new(providers, fast_strategy(1)).unwrap();
		let err = fallback.embed("hello").await.unwrap_err();

		assert!(matches!(err, Error::Exhausted(_)));
	}

	#[tokio::test]
	async fn batch_count_mismatch_counts_as_failure() {
		struct ShortBatch;
		impl EmbeddingProvider for ShortBatch {
			fn name(&self) -> &str {
				"short"
			}

			fn model_name(&self) -> &str {
				"stub-model"
			}

			fn dimension(&self) -> u32 {
				4
			}

			fn status(&self) -> ProviderStatus {
				ProviderStatus::Active
			}

			fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
				Box::pin(async move { Ok(vec![0.0; 4]) })
			}

			fn embed_batch<'a>(
				&'a self,
				_texts: &'a [String],
			) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
				Box::pin(async move { Ok(vec![vec![0.0; 4]]) })
			}
		}

		let providers: Vec<Arc<dyn EmbeddingProvider>> = vec![Arc::new(ShortBatch)];
		let fallback = FallbackEmbedding::new(providers, fast_strategy(1)).unwrap();
		let err = fallback
			.embed_batch(&["a".to_string(), "b".to_string()])
			.await
			.unwrap_err();

		assert!(matches!(err, Error::Exhausted(_)));
	}
}
