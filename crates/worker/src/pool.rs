use std::sync::OnceLock;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Shared worker pool that every circuit schedules onto.
///
/// A pool is a cheap handle to a tokio runtime. Pass it explicitly to the
/// contexts that need it; [`WorkerPool::current`] exists for callers that
/// are not handed one.
#[derive(Debug, Clone)]
pub struct WorkerPool {
	handle: Handle,
}

impl WorkerPool {
	/// Wraps an existing runtime handle.
	pub fn from_handle(handle: Handle) -> Self {
		Self { handle }
	}

	/// Returns the pool of the ambient tokio runtime, or a lazily built
	/// process-wide pool when called outside of one.
	pub fn current() -> Self {
		if let Ok(handle) = Handle::try_current() {
			return Self { handle };
		}

		static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
		let runtime = GLOBAL_RT.get_or_init(|| {
			tokio::runtime::Builder::new_multi_thread()
				.enable_all()
				.worker_threads(2)
				.thread_name("wicket-worker-global")
				.build()
				.expect("failed to build wicket-worker global tokio runtime")
		});
		Self {
			handle: runtime.handle().clone(),
		}
	}

	/// Returns the underlying runtime handle.
	pub fn handle(&self) -> &Handle {
		&self.handle
	}

	/// Runs synchronous work on the pool's blocking threads.
	///
	/// On a runtime that has shut down the closure is dropped without running.
	pub fn spawn_blocking<F, R>(&self, f: F) -> JoinHandle<R>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		tracing::trace!("wicket.worker.spawn_blocking");
		self.handle.spawn_blocking(f)
	}
}
