//! Outbound JS interop for one circuit.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use wicket_rpc::{ClientMessage, ClientProxy, CounterIdGen, TransportError};

use crate::InteropError;

/// Client-side function that completes a host call started from script.
pub const END_INVOKE_DOTNET: &str = "DotNet.jsCallDispatcher.endInvokeDotNetFromJS";

/// Starts calls into client script through the circuit's [`ClientProxy`].
pub struct RemoteJsRuntime {
	client: Arc<dyn ClientProxy>,
	handles: Mutex<CounterIdGen>,
}

impl RemoteJsRuntime {
	pub fn new(client: Arc<dyn ClientProxy>) -> Self {
		Self {
			client,
			handles: Mutex::new(CounterIdGen::starting_at(1)),
		}
	}

	/// Sends `JS.BeginInvokeJS` and returns the async handle it was tagged with.
	///
	/// # Errors
	///
	/// Propagates the proxy's [`TransportError`].
	pub fn begin_invoke_js(&self, identifier: &str, args_json: String) -> Result<u64, TransportError> {
		let async_handle = self.handles.lock().next();
		tracing::trace!(async_handle, identifier, "wicket.js.begin_invoke");
		self.client.send(ClientMessage::BeginInvokeJs {
			async_handle,
			identifier: identifier.to_string(),
			args_json,
		})?;
		Ok(async_handle)
	}

	/// Reports the outcome of a host call back to the script that started it.
	///
	/// Sends `[call_id, succeeded, result_or_error]`. A successful result is
	/// the method's JSON output (or `null`); a failure carries the error text.
	///
	/// # Errors
	///
	/// Propagates the proxy's [`TransportError`].
	pub fn end_invoke_dotnet(&self, call_id: &str, outcome: Result<Option<String>, InteropError>) -> Result<u64, TransportError> {
		let (succeeded, payload) = match outcome.and_then(|result| parse_result(result.as_deref())) {
			Ok(value) => (true, value),
			Err(err) => (false, Value::String(err.to_string())),
		};
		let args = Value::Array(vec![Value::String(call_id.to_string()), Value::Bool(succeeded), payload]);
		self.begin_invoke_js(END_INVOKE_DOTNET, args.to_string())
	}
}

fn parse_result(result: Option<&str>) -> Result<Value, InteropError> {
	match result {
		None => Ok(Value::Null),
		Some(text) => serde_json::from_str(text).map_err(|err| InteropError::InvalidResult(err.to_string())),
	}
}
