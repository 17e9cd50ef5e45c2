pub mod client;
pub mod worker;

mod error;

pub use client::{EnqueueOptions, EnqueuedTask, QueueClient};
pub use error::Error;
pub use worker::{
	TaskContext, TaskEventSink, TaskHandler, TaskOutcome, WorkerRuntime, build_rotation,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::{future::Future, pin::Pin};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a task handler reports back to the runtime.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
