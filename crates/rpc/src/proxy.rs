//! Outbound seam between a circuit and its transport.

use tokio::sync::mpsc;

use crate::{ClientMessage, Result, TransportError};

/// Sends host-to-client calls over whatever transport backs a connection.
///
/// Implementations must not block for long: sends happen from inside a
/// circuit's serialized context.
pub trait ClientProxy: Send + Sync {
	/// Queues `message` for delivery to the client.
	fn send(&self, message: ClientMessage) -> Result<()>;
}

/// A [`ClientProxy`] that forwards into a tokio channel.
///
/// Transports read the other end and write to the wire; tests read it to
/// observe what the circuit sent.
#[derive(Debug, Clone)]
pub struct ChannelProxy {
	tx: mpsc::UnboundedSender<ClientMessage>,
}

impl ChannelProxy {
	/// Creates a proxy and the receiver its messages arrive on.
	pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}
}

impl ClientProxy for ChannelProxy {
	fn send(&self, message: ClientMessage) -> Result<()> {
		let method = message.method_name();
		self.tx.send(message).map_err(|_| {
			tracing::debug!(method, "wicket.rpc.proxy.closed");
			TransportError::Closed
		})
	}
}

#[cfg(test)]
mod tests {
	use bytes::Bytes;

	use super::*;

	#[tokio::test]
	async fn forwards_in_send_order() {
		let (proxy, mut rx) = ChannelProxy::new();
		for target_id in 0..3 {
			proxy
				.send(ClientMessage::RenderBatch {
					target_id,
					batch: Bytes::from_static(b"x"),
				})
				.unwrap();
		}
		for expected in 0..3 {
			match rx.recv().await {
				Some(ClientMessage::RenderBatch { target_id, .. }) => assert_eq!(target_id, expected),
				other => panic!("unexpected {other:?}"),
			}
		}
	}

	#[test]
	fn closed_receiver_is_reported() {
		let (proxy, rx) = ChannelProxy::new();
		drop(rx);
		let err = proxy
			.send(ClientMessage::BeginInvokeJs {
				async_handle: 1,
				identifier: "f".into(),
				args_json: "[]".into(),
			})
			.unwrap_err();
		assert_eq!(err, TransportError::Closed);
	}
}
