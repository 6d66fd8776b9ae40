//! Shared worker pool and per-circuit serialized execution.
//!
//! * [`WorkerPool`]: handle to the shared tokio pool
//! * [`SerializedContext`]: one logical thread of execution per circuit,
//!   layered over the pool
//! * [`Ambient`]: caller-local state restored around deferred callbacks

mod context;
pub mod error;
mod pool;

pub use context::{Ambient, ContextStatus, SerializedContext, UnhandledObserver};
pub use error::{CallbackError, ContextError, Result, UnhandledError};
pub use pool::WorkerPool;
