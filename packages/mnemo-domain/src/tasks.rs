//! Task-type tags understood by the worker runtime.

/// Generates chunk embeddings for a content row, directly or via the batch API.
pub const TYPE_EMBEDDING_GENERATE: &str = "embedding:generate";
/// Polls a provider batch job and finalizes it when the provider reports completion.
pub const TYPE_EMBEDDING_CHECK_BATCH: &str = "embedding:check_batch";
/// Writes a one-paragraph summary onto a content row.
pub const TYPE_SUMMARIZATION_GENERATE: &str = "summarization:generate";
/// Reserved.
pub const TYPE_CATEGORIZATION: &str = "categorization";
/// Reserved.
pub const TYPE_COST_TRACKING: &str = "cost_tracking";

/// Queue carrying embedding work.
pub const QUEUE_EMBEDDINGS: &str = "embeddings";
/// Queue carrying summarization work.
pub const QUEUE_SUMMARIZATION: &str = "summarization";
/// Fallback queue.
pub const QUEUE_DEFAULT: &str = "default";
