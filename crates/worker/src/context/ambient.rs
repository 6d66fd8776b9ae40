//! Caller-local state that follows a callback across the deferred path.
//!
//! A callback that runs inline sees whatever the caller set. A callback that
//! is queued runs later on a pool thread, so the caller's [`Ambient`] value
//! and tracing span are captured at enqueue time and re-entered around the
//! callback by the drainer.

use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
	static CURRENT: RefCell<Option<Arc<Ambient>>> = const { RefCell::new(None) };
}

/// Per-request values that callbacks may read while they run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ambient {
	pub trace_id: Option<String>,
	pub locale: Option<String>,
	pub principal: Option<String>,
}

impl Ambient {
	/// Returns the ambient value installed on this thread, if any.
	pub fn current() -> Option<Arc<Ambient>> {
		CURRENT.with(|cell| cell.borrow().clone())
	}

	/// Runs `f` with `ambient` installed, restoring the previous value
	/// afterwards (also on unwind).
	pub fn scope<R>(ambient: Option<Arc<Ambient>>, f: impl FnOnce() -> R) -> R {
		let previous = CURRENT.with(|cell| cell.replace(ambient));
		let _restore = Restore(Some(previous));
		f()
	}
}

struct Restore(Option<Option<Arc<Ambient>>>);

impl Drop for Restore {
	fn drop(&mut self) {
		if let Some(previous) = self.0.take() {
			CURRENT.with(|cell| *cell.borrow_mut() = previous);
		}
	}
}

/// Ambient state captured when a callback is queued.
#[derive(Debug)]
pub(crate) struct Snapshot {
	ambient: Option<Arc<Ambient>>,
	span: tracing::Span,
}

impl Snapshot {
	pub(crate) fn capture() -> Self {
		Self {
			ambient: Ambient::current(),
			span: tracing::Span::current(),
		}
	}

	pub(crate) fn run<R>(self, f: impl FnOnce() -> R) -> R {
		let Self { ambient, span } = self;
		span.in_scope(|| Ambient::scope(ambient, f))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ambient(trace: &str) -> Option<Arc<Ambient>> {
		Some(Arc::new(Ambient {
			trace_id: Some(trace.to_string()),
			..Ambient::default()
		}))
	}

	#[test]
	fn scope_installs_and_restores() {
		assert!(Ambient::current().is_none());
		Ambient::scope(ambient("outer"), || {
			assert_eq!(Ambient::current().unwrap().trace_id.as_deref(), Some("outer"));
			Ambient::scope(ambient("inner"), || {
				assert_eq!(Ambient::current().unwrap().trace_id.as_deref(), Some("inner"));
			});
			assert_eq!(Ambient::current().unwrap().trace_id.as_deref(), Some("outer"));
		});
		assert!(Ambient::current().is_none());
	}

	#[test]
	fn scope_restores_after_panic() {
		let result = std::panic::catch_unwind(|| Ambient::scope(ambient("doomed"), || panic!("boom")));
		assert!(result.is_err());
		assert!(Ambient::current().is_none());
	}

	#[test]
	fn snapshot_carries_value_to_another_thread() {
		let snapshot = Ambient::scope(ambient("req-42"), Snapshot::capture);
		let seen = std::thread::spawn(move || snapshot.run(|| Ambient::current().and_then(|a| a.trace_id.clone())))
			.join()
			.unwrap();
		assert_eq!(seen.as_deref(), Some("req-42"));
	}
}
