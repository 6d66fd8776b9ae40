//! The per-client circuit.

use std::sync::Arc;

use wicket_rpc::{ClientProxy, HubRequest};
use wicket_worker::{SerializedContext, UnhandledError, WorkerPool};

use crate::{CircuitError, CircuitOptions, CircuitUris, InteropDispatcher, RemoteJsRuntime, RemoteRenderer, Result};

/// A live UI session for one connected client.
///
/// Owns the session's [`SerializedContext`]: renderer flushes and inbound
/// interop calls both run on it, one at a time, in arrival order. Dropping
/// the circuit disposes it.
pub struct Circuit {
	options: CircuitOptions,
	uris: CircuitUris,
	context: SerializedContext,
	js_runtime: Arc<RemoteJsRuntime>,
	renderer: RemoteRenderer,
	dispatcher: Arc<dyn InteropDispatcher>,
}

impl Circuit {
	/// Builds the circuit and runs `startup` on its logical thread.
	///
	/// # Errors
	///
	/// [`CircuitError::InvalidOptions`] before anything is created, or
	/// [`CircuitError::Startup`] if `startup` panics.
	pub async fn start<F>(
		options: CircuitOptions,
		uris: CircuitUris,
		pool: WorkerPool,
		client: Arc<dyn ClientProxy>,
		dispatcher: Arc<dyn InteropDispatcher>,
		startup: F,
	) -> Result<Self>
	where
		F: FnOnce(&RemoteRenderer) + Send + 'static,
	{
		options.validate()?;

		let context = SerializedContext::new(pool);
		let js_runtime = Arc::new(RemoteJsRuntime::new(Arc::clone(&client)));
		let renderer = RemoteRenderer::new(&options, context.clone(), client);
		tracing::info!(context = context.id(), uri = %uris.uri(), renderer = options.renderer_id, "wicket.circuit.start");

		let circuit = Self {
			options,
			uris,
			context,
			js_runtime,
			renderer,
			dispatcher,
		};

		let renderer = circuit.renderer.clone();
		circuit.context.invoke_async(move || startup(&renderer)).await.map_err(CircuitError::Startup)?;
		Ok(circuit)
	}

	pub fn options(&self) -> &CircuitOptions {
		&self.options
	}

	pub fn uris(&self) -> &CircuitUris {
		&self.uris
	}

	pub fn context(&self) -> &SerializedContext {
		&self.context
	}

	pub fn renderer(&self) -> &RemoteRenderer {
		&self.renderer
	}

	pub fn js_runtime(&self) -> &RemoteJsRuntime {
		&self.js_runtime
	}

	/// Registers an observer for failures nobody awaits: flushes, fire-and-forget
	/// interop calls, and completions the transport refused.
	pub fn on_unhandled_error(&self, observer: impl Fn(&UnhandledError) + Send + Sync + 'static) {
		self.context.on_unhandled_error(observer);
	}

	/// Queues an inbound interop call onto the circuit's logical thread.
	///
	/// Returns once the call is queued (or, with the context idle, run). With
	/// a `call_id` the outcome goes back to the client as
	/// `endInvokeDotNetFromJS`; without one a failure goes to the observers.
	///
	/// # Errors
	///
	/// [`CircuitError::Context`] once the circuit is disposed.
	pub fn begin_invoke_dotnet_from_js(
		&self,
		call_id: Option<String>,
		assembly_name: String,
		method_identifier: String,
		args_json: String,
	) -> Result<()> {
		let dispatcher = Arc::clone(&self.dispatcher);
		let js_runtime = Arc::clone(&self.js_runtime);
		let context = self.context.id();

		self.context.try_post(move || {
			tracing::debug!(context, call_id = call_id.as_deref(), assembly = %assembly_name, method = %method_identifier, "wicket.circuit.interop");
			let outcome = dispatcher.invoke(&assembly_name, &method_identifier, &args_json);
			match call_id {
				Some(call_id) => {
					js_runtime.end_invoke_dotnet(&call_id, outcome)?;
				}
				None => {
					outcome?;
				}
			}
			Ok(())
		})?;
		Ok(())
	}

	/// Routes a request delivered on this circuit's connection.
	///
	/// # Errors
	///
	/// [`CircuitError::AlreadyStarted`] for `StartCircuit`; otherwise as
	/// [`begin_invoke_dotnet_from_js`](Self::begin_invoke_dotnet_from_js).
	pub fn handle(&self, request: HubRequest) -> Result<()> {
		match request {
			HubRequest::StartCircuit { .. } => Err(CircuitError::AlreadyStarted),
			HubRequest::BeginInvokeDotNetFromJs {
				call_id,
				assembly_name,
				method_identifier,
				args_json,
			} => self.begin_invoke_dotnet_from_js(call_id, assembly_name, method_identifier, args_json),
		}
	}

	pub fn is_disposed(&self) -> bool {
		self.context.is_disposed()
	}

	/// Disposes the renderer and the context. Idempotent.
	///
	/// Work still queued on the context is dropped and reported.
	pub fn dispose(&self) {
		if self.context.is_disposed() {
			return;
		}
		tracing::info!(context = self.context.id(), "wicket.circuit.dispose");
		self.renderer.dispose();
		self.context.dispose();
	}
}

impl Drop for Circuit {
	fn drop(&mut self) {
		self.dispose();
	}
}

impl std::fmt::Debug for Circuit {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Circuit")
			.field("uri", &self.uris.uri().as_str())
			.field("context", &self.context)
			.field("renderer", &self.renderer)
			.finish_non_exhaustive()
	}
}
