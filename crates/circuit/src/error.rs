//! Circuit error types.

use thiserror::Error;
use wicket_batch::EncodeError;
use wicket_rpc::TransportError;
use wicket_worker::ContextError;

/// Errors raised while starting or driving a circuit.
#[derive(Debug, Error)]
pub enum CircuitError {
	/// A start URI is malformed or outside the base URI.
	#[error("invalid circuit URI {uri:?}: {reason}")]
	InvalidUri { uri: String, reason: String },

	/// Options failed validation.
	#[error("invalid circuit options: {0}")]
	InvalidOptions(String),

	/// Options text is not valid TOML for [`CircuitOptions`](crate::CircuitOptions).
	#[error("failed to parse circuit options: {0}")]
	Toml(#[from] toml::de::Error),

	/// The startup callback panicked or the context was gone before it ran.
	#[error("circuit startup failed: {0}")]
	Startup(#[source] ContextError),

	/// `StartCircuit` arrived for a circuit that is already running.
	#[error("circuit already started")]
	AlreadyStarted,

	#[error(transparent)]
	Context(#[from] ContextError),
}

/// Errors raised while flushing a render batch to the client.
#[derive(Debug, Error)]
pub enum RenderError {
	#[error("render batch encoding failed: {0}")]
	Encode(#[from] EncodeError),

	#[error("encoded batch of {bytes} bytes exceeds the {limit} byte limit")]
	TooLarge { bytes: usize, limit: usize },

	#[error("failed to deliver render batch: {0}")]
	Transport(#[from] TransportError),

	/// `update_display` was called off the circuit's logical thread.
	#[error("update_display called outside the circuit context")]
	OutsideContext,

	#[error("renderer disposed")]
	Disposed,
}

/// Errors an [`InteropDispatcher`](crate::InteropDispatcher) reports for a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteropError {
	#[error("no method `{method}` in assembly `{assembly}`")]
	UnknownMethod { assembly: String, method: String },

	#[error("invalid arguments: {0}")]
	InvalidArguments(String),

	/// The method ran and failed.
	#[error("{0}")]
	Failed(String),

	/// The method returned text that is not JSON.
	#[error("method result is not valid JSON: {0}")]
	InvalidResult(String),
}

pub type Result<T> = std::result::Result<T, CircuitError>;
