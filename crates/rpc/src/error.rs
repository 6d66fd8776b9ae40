//! Transport-facing errors.

use thiserror::Error;

/// Errors a [`ClientProxy`](crate::ClientProxy) can report for an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	/// The connection to the client is gone.
	#[error("client connection closed")]
	Closed,

	/// The transport refused the message.
	#[error("transport rejected {method}: {reason}")]
	Rejected {
		/// Wire method name of the refused message.
		method: &'static str,
		/// Transport-specific explanation.
		reason: String,
	},
}

/// Result type for outbound sends.
pub type Result<T> = std::result::Result<T, TransportError>;
