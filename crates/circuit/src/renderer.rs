//! Renderer that ships each flushed batch to the remote client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use wicket_batch::{BatchEncoder, BatchFormat, RenderBatch};
use wicket_rpc::{ClientMessage, ClientProxy};
use wicket_worker::{ContextError, SerializedContext};

use crate::ids::IdAllocator;
use crate::{CircuitOptions, RenderError};

/// Cheaply cloneable handle to a circuit's renderer.
///
/// Batches are encoded and sent on the circuit's logical thread, so flushes
/// and interop calls never interleave.
#[derive(Clone)]
pub struct RemoteRenderer {
	inner: Arc<Inner>,
}

struct Inner {
	renderer_id: i32,
	format: BatchFormat,
	max_batch_bytes: usize,
	context: SerializedContext,
	client: Arc<dyn ClientProxy>,
	encoder: Mutex<BatchEncoder>,
	component_ids: IdAllocator,
	event_handler_ids: IdAllocator,
	disposed: AtomicBool,
}

impl RemoteRenderer {
	pub(crate) fn new(options: &CircuitOptions, context: SerializedContext, client: Arc<dyn ClientProxy>) -> Self {
		Self {
			inner: Arc::new(Inner {
				renderer_id: options.renderer_id,
				format: options.batch_format,
				max_batch_bytes: options.max_batch_bytes,
				context,
				client,
				encoder: Mutex::new(BatchEncoder::new()),
				component_ids: IdAllocator::starting_at(0),
				// 0 marks an attribute frame without a handler.
				event_handler_ids: IdAllocator::starting_at(1),
				disposed: AtomicBool::new(false),
			}),
		}
	}

	pub fn renderer_id(&self) -> i32 {
		self.inner.renderer_id
	}

	pub fn context(&self) -> &SerializedContext {
		&self.inner.context
	}

	/// Assigns a component id, unique for the circuit's lifetime.
	pub fn allocate_component_id(&self) -> Option<i32> {
		self.inner.component_ids.allocate()
	}

	/// Assigns an event handler id, unique for the circuit's lifetime and never 0.
	pub fn allocate_event_handler_id(&self) -> Option<i32> {
		self.inner.event_handler_ids.allocate()
	}

	/// Queues `batch` for encoding and delivery on the circuit's logical thread.
	///
	/// Flush failures go to the context's unhandled-error observers.
	///
	/// # Errors
	///
	/// Returns [`ContextError::Disposed`] once the circuit is disposed.
	pub fn render(&self, batch: RenderBatch) -> Result<(), ContextError> {
		let inner = Arc::clone(&self.inner);
		self.inner.context.try_post(move || inner.update_display(&batch).map_err(Into::into))
	}

	/// Encodes `batch` and sends it as `JS.RenderBatch`.
	///
	/// # Errors
	///
	/// [`RenderError::OutsideContext`] unless called from one of the
	/// circuit's callbacks; otherwise any encode, size, or transport failure.
	pub fn update_display(&self, batch: &RenderBatch) -> Result<(), RenderError> {
		self.inner.update_display(batch)
	}

	pub fn is_disposed(&self) -> bool {
		self.inner.disposed.load(Ordering::Acquire)
	}

	/// Stops accepting batches. Idempotent.
	pub fn dispose(&self) {
		if !self.inner.disposed.swap(true, Ordering::AcqRel) {
			tracing::debug!(renderer = self.inner.renderer_id, "wicket.renderer.dispose");
		}
	}
}

impl Inner {
	fn update_display(&self, batch: &RenderBatch) -> Result<(), RenderError> {
		if self.disposed.load(Ordering::Acquire) {
			return Err(RenderError::Disposed);
		}
		if !self.context.is_current() {
			return Err(RenderError::OutsideContext);
		}

		let payload = self.format.encode(&mut self.encoder.lock(), batch)?;
		if payload.len() > self.max_batch_bytes {
			return Err(RenderError::TooLarge {
				bytes: payload.len(),
				limit: self.max_batch_bytes,
			});
		}

		tracing::debug!(
			renderer = self.renderer_id,
			format = ?self.format,
			bytes = payload.len(),
			diffs = batch.updated_components().len(),
			"wicket.renderer.flush"
		);
		self.client.send(ClientMessage::RenderBatch {
			target_id: self.renderer_id,
			batch: payload,
		})?;
		Ok(())
	}
}

impl std::fmt::Debug for RemoteRenderer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RemoteRenderer")
			.field("renderer_id", &self.inner.renderer_id)
			.field("format", &self.inner.format)
			.field("disposed", &self.is_disposed())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parking_lot::Mutex;
	use wicket_batch::{ClientEnvironment, Frame};
	use wicket_rpc::ChannelProxy;
	use wicket_worker::WorkerPool;

	use super::*;

	fn runtime() -> tokio::runtime::Runtime {
		tokio::runtime::Builder::new_multi_thread().worker_threads(2).enable_all().build().unwrap()
	}

	fn renderer(rt: &tokio::runtime::Runtime, options: CircuitOptions) -> (RemoteRenderer, tokio::sync::mpsc::UnboundedReceiver<ClientMessage>) {
		let (proxy, rx) = ChannelProxy::new();
		let context = SerializedContext::new(WorkerPool::from_handle(rt.handle().clone()));
		(RemoteRenderer::new(&options, context, Arc::new(proxy)), rx)
	}

	fn text_batch(text: &str) -> RenderBatch {
		let mut builder = RenderBatch::builder();
		builder.push_frame(Frame::text(text));
		builder.build()
	}

	#[test]
	fn render_sends_batches_tagged_with_the_renderer_id() {
		let rt = runtime();
		let options = CircuitOptions {
			renderer_id: 4,
			..CircuitOptions::default()
		};
		let (renderer, mut rx) = renderer(&rt, options);

		renderer.render(text_batch("one")).unwrap();
		renderer.render(text_batch("two")).unwrap();
		rt.block_on(renderer.context().invoke_async(|| ())).unwrap();

		let env = ClientEnvironment::default();
		for expected in ["one", "two"] {
			let Ok(ClientMessage::RenderBatch { target_id, batch }) = rx.try_recv() else {
				panic!("expected a render batch");
			};
			assert_eq!(target_id, 4);
			let reader = env.read_batch(batch).unwrap();
			assert_eq!(reader.reference_frames().unwrap().get(0).unwrap().text_content().unwrap(), expected);
		}
	}

	#[test]
	fn update_display_requires_the_circuit_context() {
		let rt = runtime();
		let (renderer, _rx) = renderer(&rt, CircuitOptions::default());
		assert!(matches!(renderer.update_display(&text_batch("x")), Err(RenderError::OutsideContext)));

		let inside = renderer.clone();
		let result = renderer.context().send(move || inside.update_display(&text_batch("x")).is_ok());
		assert_eq!(result, Ok(true));
	}

	#[test]
	fn flush_failures_reach_the_observer() {
		let rt = runtime();
		let options = CircuitOptions {
			max_batch_bytes: 8,
			..CircuitOptions::default()
		};
		let (renderer, mut rx) = renderer(&rt, options);
		let errors = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&errors);
		renderer.context().on_unhandled_error(move |err| sink.lock().push(err.to_string()));

		renderer.render(text_batch("too big")).unwrap();
		rt.block_on(renderer.context().invoke_async(|| ())).unwrap();

		assert!(rx.try_recv().is_err());
		let errors = errors.lock();
		assert_eq!(errors.len(), 1);
		assert!(errors[0].contains("exceeds the 8 byte limit"), "{}", errors[0]);
	}

	#[test]
	fn ids_are_unique_and_handlers_skip_zero() {
		let rt = runtime();
		let (renderer, _rx) = renderer(&rt, CircuitOptions::default());
		assert_eq!(renderer.allocate_component_id(), Some(0));
		assert_eq!(renderer.allocate_component_id(), Some(1));
		assert_eq!(renderer.allocate_event_handler_id(), Some(1));
	}

	#[test]
	fn disposed_renderer_rejects_flushes() {
		let rt = runtime();
		let (renderer, mut rx) = renderer(&rt, CircuitOptions::default());
		renderer.dispose();
		let inside = renderer.clone();
		let result = renderer.context().send(move || matches!(inside.update_display(&text_batch("x")), Err(RenderError::Disposed)));
		assert_eq!(result, Ok(true));
		assert!(rx.try_recv().is_err());
	}
}
