use std::sync::atomic::{AtomicI32, Ordering};

/// Hands out strictly increasing ids for the lifetime of a circuit.
#[derive(Debug)]
pub struct IdAllocator {
	next: AtomicI32,
}

impl IdAllocator {
	pub const fn starting_at(first: i32) -> Self {
		Self { next: AtomicI32::new(first) }
	}

	/// Returns the next id, or `None` once the `i32` range is used up.
	pub fn allocate(&self) -> Option<i32> {
		self.next.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(1)).ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_increase_until_exhausted() {
		let ids = IdAllocator::starting_at(i32::MAX - 2);
		assert_eq!(ids.allocate(), Some(i32::MAX - 2));
		assert_eq!(ids.allocate(), Some(i32::MAX - 1));
		assert_eq!(ids.allocate(), None);
		assert_eq!(ids.allocate(), None);
	}
}
