//! Error types for serialized execution.

use std::any::Any;

use thiserror::Error;

/// Boxed error returned by fallible callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced to callers of a [`SerializedContext`](crate::SerializedContext).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
	/// The context was disposed before the callback could run.
	#[error("serialized context has been disposed")]
	Disposed,

	/// The callback panicked while running inside the context.
	#[error("callback panicked: {0}")]
	Faulted(String),
}

/// Failure of one callback that nobody awaited, delivered to the
/// context's unhandled-error observer.
#[derive(Debug, Error)]
pub enum UnhandledError {
	/// The callback panicked.
	#[error("callback panicked: {0}")]
	Panicked(String),

	/// The callback returned an error.
	#[error("callback failed: {0}")]
	Failed(#[source] CallbackError),

	/// The callback was dropped unrun because the context was disposed.
	#[error("callback dropped: serialized context disposed")]
	Disposed,
}

/// Result type for serialized context operations.
pub type Result<T> = std::result::Result<T, ContextError>;

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		(*msg).to_string()
	} else if let Some(msg) = payload.downcast_ref::<String>() {
		msg.clone()
	} else {
		"non-string panic payload".to_string()
	}
}
