//! Wire-level calls exchanged between host and client.

use bytes::Bytes;

/// Simple counter-based ID generator.
///
/// Used for asynchronous JS call handles, which must be unique for the
/// lifetime of a circuit.
#[derive(Debug, Default, Clone, Copy)]
pub struct CounterIdGen(pub u64);

impl CounterIdGen {
	/// Creates a new counter starting at 0.
	#[must_use]
	pub const fn new() -> Self {
		Self(0)
	}

	/// Creates a counter whose first id is `first`.
	#[must_use]
	pub const fn starting_at(first: u64) -> Self {
		Self(first)
	}

	/// Generates the next unique ID and increments the counter.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub fn next(&mut self) -> u64 {
		let id = self.0;
		self.0 += 1;
		id
	}
}

/// A call from the client into the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubRequest {
	/// Opens a circuit for a newly connected client.
	StartCircuit {
		/// Absolute URI the client is displaying.
		uri_absolute: String,
		/// Absolute base URI of the application.
		base_uri_absolute: String,
	},
	/// Invokes a host method from client script.
	BeginInvokeDotNetFromJs {
		/// Correlation id for the completion; `None` for fire-and-forget calls.
		call_id: Option<String>,
		/// Assembly that declares the method.
		assembly_name: String,
		/// Identifier of the method within the assembly.
		method_identifier: String,
		/// Arguments as a JSON array, left unparsed.
		args_json: String,
	},
}

impl HubRequest {
	/// Wire method name of the request.
	pub const fn method_name(&self) -> &'static str {
		match self {
			Self::StartCircuit { .. } => "StartCircuit",
			Self::BeginInvokeDotNetFromJs { .. } => "BeginInvokeDotNetFromJS",
		}
	}
}

/// A call from the host into the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
	/// Starts an asynchronous call into client script.
	BeginInvokeJs {
		/// Handle the client echoes back when the call completes.
		async_handle: u64,
		/// Script function identifier.
		identifier: String,
		/// Arguments as a JSON array.
		args_json: String,
	},
	/// Delivers one encoded render batch.
	RenderBatch {
		/// Renderer the batch belongs to.
		target_id: i32,
		/// Encoded batch, binary or structured.
		batch: Bytes,
	},
}

impl ClientMessage {
	/// Wire method name of the message.
	pub const fn method_name(&self) -> &'static str {
		match self {
			Self::BeginInvokeJs { .. } => "JS.BeginInvokeJS",
			Self::RenderBatch { .. } => "JS.RenderBatch",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_are_sequential_from_the_start_value() {
		let mut ids = CounterIdGen::starting_at(1);
		assert_eq!((ids.next(), ids.next(), ids.next()), (1, 2, 3));
		assert_eq!(CounterIdGen::new().next(), 0);
	}

	#[test]
	fn method_names_match_the_client_contract() {
		let start = HubRequest::StartCircuit {
			uri_absolute: "http://host/app/page".into(),
			base_uri_absolute: "http://host/app/".into(),
		};
		assert_eq!(start.method_name(), "StartCircuit");

		let invoke = HubRequest::BeginInvokeDotNetFromJs {
			call_id: None,
			assembly_name: "App".into(),
			method_identifier: "Greet".into(),
			args_json: "[]".into(),
		};
		assert_eq!(invoke.method_name(), "BeginInvokeDotNetFromJS");

		let render = ClientMessage::RenderBatch {
			target_id: 0,
			batch: Bytes::new(),
		};
		assert_eq!(render.method_name(), "JS.RenderBatch");

		let js = ClientMessage::BeginInvokeJs {
			async_handle: 1,
			identifier: "f".into(),
			args_json: "[]".into(),
		};
		assert_eq!(js.method_name(), "JS.BeginInvokeJS");
	}
}
