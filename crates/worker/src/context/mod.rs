//! Per-circuit serialized execution on top of the shared worker pool.
//!
//! A [`SerializedContext`] gives every callback submitted to it a single
//! logical thread: at most one callback body runs at any instant, and
//! callbacks run in submission order. No physical thread is dedicated to a
//! context. When the context is idle a callback runs inline on the
//! submitting thread; otherwise it is queued and a single drainer job on the
//! [`WorkerPool`] runs the queue down.
//!
//! Two locks are involved:
//! * the exclusive `token`, held for the duration of callback bodies;
//! * the `queue` lock, guarding the FIFO plus the drainer-active and
//!   disposed flags.
//!
//! The drainer releases the token before re-checking the queue under the
//! queue lock. Anything enqueued in that gap either sees `drainer_active`
//! still set (and relies on the re-check) or finds it cleared and schedules
//! a fresh drainer itself.

mod ambient;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub use ambient::Ambient;
use ambient::Snapshot;
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;

use crate::error::{CallbackError, ContextError, Result, UnhandledError, panic_message};
use crate::WorkerPool;

type Job = Box<dyn FnOnce() -> std::result::Result<(), CallbackError> + Send + 'static>;

/// Observer invoked for every callback failure nobody awaits.
pub type UnhandledObserver = Arc<dyn Fn(&UnhandledError) + Send + Sync + 'static>;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
	/// Contexts whose token is held by the callback running on this thread.
	static ACTIVE: RefCell<Vec<Arc<State>>> = const { RefCell::new(Vec::new()) };
}

/// Snapshot of a context's scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextStatus {
	pub queued: usize,
	pub busy: bool,
	pub drainer_active: bool,
	pub disposed: bool,
}

/// Handle to one logical thread of execution.
///
/// Cloning yields another handle to the same queue and token.
#[derive(Clone)]
pub struct SerializedContext {
	state: Arc<State>,
}

struct State {
	id: u64,
	pool: WorkerPool,
	token: Mutex<()>,
	queue: Mutex<QueueState>,
	busy: AtomicBool,
	observers: RwLock<Vec<UnhandledObserver>>,
}

#[derive(Default)]
struct QueueState {
	items: VecDeque<WorkItem>,
	drainer_active: bool,
	disposed: bool,
}

struct WorkItem {
	job: Job,
	snapshot: Snapshot,
	/// Awaited items report their outcome to the waiter instead of the observers.
	awaited: bool,
}

impl WorkItem {
	fn new(job: Job, awaited: bool) -> Self {
		Self {
			job,
			snapshot: Snapshot::capture(),
			awaited,
		}
	}
}

impl SerializedContext {
	/// Creates an idle context that drains onto `pool`.
	pub fn new(pool: WorkerPool) -> Self {
		let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
		tracing::debug!(context = id, "wicket.context.create");
		Self {
			state: Arc::new(State {
				id,
				pool,
				token: Mutex::new(()),
				queue: Mutex::new(QueueState::default()),
				busy: AtomicBool::new(false),
				observers: RwLock::new(Vec::new()),
			}),
		}
	}

	/// Returns the context whose callback is running on this thread.
	pub fn current() -> Option<Self> {
		ACTIVE.with(|active| active.borrow().last().cloned()).map(|state| Self { state })
	}

	/// Returns this context's process-unique id.
	pub fn id(&self) -> u64 {
		self.state.id
	}

	/// Returns true when both handles refer to the same underlying state.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.state, &other.state)
	}

	/// Returns true when the calling thread is inside one of this context's callbacks.
	pub fn is_current(&self) -> bool {
		ACTIVE.with(|active| active.borrow().iter().any(|state| Arc::ptr_eq(state, &self.state)))
	}

	/// Registers an observer for failures of callbacks that nobody awaits.
	pub fn on_unhandled_error(&self, observer: impl Fn(&UnhandledError) + Send + Sync + 'static) {
		self.state.observers.write().push(Arc::new(observer));
	}

	/// Returns a scheduling snapshot.
	pub fn status(&self) -> ContextStatus {
		let queue = self.state.queue.lock();
		ContextStatus {
			queued: queue.items.len(),
			busy: self.state.busy.load(Ordering::Acquire),
			drainer_active: queue.drainer_active,
			disposed: queue.disposed,
		}
	}

	/// Returns true once [`dispose`](Self::dispose) has been called.
	pub fn is_disposed(&self) -> bool {
		self.state.queue.lock().disposed
	}

	/// Submits a callback without waiting for it.
	///
	/// Runs inline on the calling thread when the context is idle with
	/// nothing queued, otherwise queues it behind earlier work. A panic is
	/// caught and reported to the observers.
	///
	/// # Errors
	///
	/// Returns [`ContextError::Disposed`] once the context is disposed; the
	/// observers are notified as well.
	pub fn post(&self, f: impl FnOnce() + Send + 'static) -> Result<()> {
		self.try_post(move || {
			f();
			Ok(())
		})
	}

	/// Like [`post`](Self::post) for callbacks that can fail; an `Err` is
	/// reported to the observers.
	///
	/// # Errors
	///
	/// Returns [`ContextError::Disposed`] once the context is disposed.
	pub fn try_post(&self, f: impl FnOnce() -> std::result::Result<(), CallbackError> + Send + 'static) -> Result<()> {
		self.schedule(WorkItem::new(Box::new(f), false))
	}

	/// Runs a callback on the logical thread and blocks until it returns.
	///
	/// Called from inside one of this context's callbacks, `f` runs inline.
	/// Blocks the calling OS thread otherwise; do not call it from a thread
	/// that holds this context's token outside callback execution.
	///
	/// # Errors
	///
	/// [`ContextError::Faulted`] if `f` panics, [`ContextError::Disposed`]
	/// if the context is disposed before `f` runs.
	pub fn send<R, F>(&self, f: F) -> Result<R>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		if self.is_current() {
			return Ok(f());
		}

		let (tx, rx) = std::sync::mpsc::sync_channel(1);
		let job: Job = Box::new(move || {
			let outcome = panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()));
			let _ = tx.send(outcome);
			Ok(())
		});
		self.schedule(WorkItem::new(job, true))?;

		match rx.recv() {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(message)) => Err(ContextError::Faulted(message)),
			Err(_) => Err(ContextError::Disposed),
		}
	}

	/// Schedules `f` on the logical thread and returns a future for its result.
	///
	/// The future resolves exactly once. It does not hold a worker thread
	/// while it waits.
	pub fn invoke_async<R, F>(&self, f: F) -> impl Future<Output = Result<R>> + Send + use<R, F>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		let (tx, rx) = oneshot::channel();
		let job: Job = Box::new(move || {
			let outcome = panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()));
			let _ = tx.send(outcome);
			Ok(())
		});
		let scheduled = self.schedule(WorkItem::new(job, true));

		async move {
			scheduled?;
			match rx.await {
				Ok(Ok(value)) => Ok(value),
				Ok(Err(message)) => Err(ContextError::Faulted(message)),
				Err(_) => Err(ContextError::Disposed),
			}
		}
	}

	/// Disposes the context.
	///
	/// Queued callbacks are dropped without running: observers get
	/// [`UnhandledError::Disposed`] for each fire-and-forget item and awaited
	/// items resolve to [`ContextError::Disposed`]. A callback that is
	/// already running finishes normally. Idempotent.
	pub fn dispose(&self) {
		let dropped = {
			let mut queue = self.state.queue.lock();
			if queue.disposed {
				return;
			}
			queue.disposed = true;
			std::mem::take(&mut queue.items)
		};

		tracing::debug!(context = self.state.id, dropped = dropped.len(), "wicket.context.dispose");
		for item in dropped {
			self.state.reject(item);
		}
	}

	fn schedule(&self, item: WorkItem) -> Result<()> {
		let state = &self.state;

		if let Some(token) = state.token.try_lock() {
			let idle = {
				let queue = state.queue.lock();
				if queue.disposed {
					drop(queue);
					drop(token);
					state.reject(item);
					return Err(ContextError::Disposed);
				}
				queue.items.is_empty() && !queue.drainer_active
			};

			if idle {
				tracing::trace!(context = state.id, "wicket.context.inline");
				let active = ActiveGuard::enter(state);
				state.execute(item);
				drop(active);
				drop(token);
				return Ok(());
			}
		}

		let mut queue = state.queue.lock();
		if queue.disposed {
			drop(queue);
			state.reject(item);
			return Err(ContextError::Disposed);
		}

		queue.items.push_back(item);
		tracing::trace!(context = state.id, queued = queue.items.len(), "wicket.context.enqueue");
		if !queue.drainer_active {
			queue.drainer_active = true;
			drop(queue);
			State::spawn_drainer(Arc::clone(state));
		}
		Ok(())
	}
}

impl State {
	fn spawn_drainer(state: Arc<State>) {
		let pool = state.pool.clone();
		let drainer = Drainer(Some(state));
		pool.spawn_blocking(move || drainer.run());
	}

	fn drain(self: Arc<Self>) {
		let mut ran = 0_usize;
		{
			let _token = self.token.lock();
			let _active = ActiveGuard::enter(&self);
			loop {
				let next = self.queue.lock().items.pop_front();
				let Some(item) = next else {
					break;
				};
				self.execute(item);
				ran += 1;
			}
		}

		tracing::trace!(context = self.id, ran, "wicket.context.drain");

		let mut queue = self.queue.lock();
		if queue.items.is_empty() {
			queue.drainer_active = false;
			return;
		}
		drop(queue);

		tracing::trace!(context = self.id, "wicket.context.drain.reschedule");
		State::spawn_drainer(self);
	}

	fn execute(&self, item: WorkItem) {
		let WorkItem { job, snapshot, .. } = item;

		self.busy.store(true, Ordering::Release);
		let outcome = snapshot.run(|| panic::catch_unwind(AssertUnwindSafe(job)));
		self.busy.store(false, Ordering::Release);

		match outcome {
			Ok(Ok(())) => {}
			Ok(Err(err)) => self.report(UnhandledError::Failed(err)),
			Err(payload) => self.report(UnhandledError::Panicked(panic_message(payload.as_ref()))),
		}
	}

	/// The pool dropped a drainer unrun, so nothing will ever drain the queue.
	///
	/// The context is disposed and its queued work rejected.
	fn abandon(&self) {
		let dropped = {
			let mut queue = self.queue.lock();
			queue.drainer_active = false;
			queue.disposed = true;
			std::mem::take(&mut queue.items)
		};

		tracing::warn!(context = self.id, dropped = dropped.len(), "wicket.context.drain.abandoned");
		for item in dropped {
			self.reject(item);
		}
	}

	fn reject(&self, item: WorkItem) {
		if !item.awaited {
			self.report(UnhandledError::Disposed);
		}
	}

	fn report(&self, error: UnhandledError) {
		tracing::error!(context = self.id, error = %error, "wicket.context.unhandled");

		let observers = self.observers.read().clone();
		for observer in observers {
			if panic::catch_unwind(AssertUnwindSafe(|| observer(&error))).is_err() {
				tracing::error!(context = self.id, "wicket.context.observer_panicked");
			}
		}
	}
}

/// Drainer job handed to the pool. Dropping it unrun abandons the context.
struct Drainer(Option<Arc<State>>);

impl Drainer {
	fn run(mut self) {
		if let Some(state) = self.0.take() {
			state.drain();
		}
	}
}

impl Drop for Drainer {
	fn drop(&mut self) {
		if let Some(state) = self.0.take() {
			state.abandon();
		}
	}
}

/// Marks this thread as running inside a context for the guard's lifetime.
struct ActiveGuard;

impl ActiveGuard {
	fn enter(state: &Arc<State>) -> Self {
		ACTIVE.with(|active| active.borrow_mut().push(Arc::clone(state)));
		Self
	}
}

impl Drop for ActiveGuard {
	fn drop(&mut self) {
		ACTIVE.with(|active| {
			active.borrow_mut().pop();
		});
	}
}

impl fmt::Debug for SerializedContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let status = self.status();
		f.debug_struct("SerializedContext")
			.field("id", &self.state.id)
			.field("queued", &status.queued)
			.field("busy", &status.busy)
			.field("drainer_active", &status.drainer_active)
			.field("disposed", &status.disposed)
			.finish()
	}
}
