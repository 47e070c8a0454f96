//! Optimistic read validation for a single writer.
//!
//! The counter is even while no write is in progress. A writer makes it odd
//! for the duration of the write. A read is valid if the counter was even
//! when it began and has not changed since.

use std::sync::atomic::{fence, AtomicUsize, Ordering};

/// Counter value captured at the beginning of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHandle(usize);

impl ReadHandle {
	pub fn is_write_locked(&self) -> bool {
		self.0 & 1 == 1
	}
}

#[derive(Debug, Default)]
pub struct SequentialLock {
	counter: AtomicUsize,
}

impl SequentialLock {
	pub fn new() -> Self {
		SequentialLock::default()
	}

	pub fn begin_read(&self) -> ReadHandle {
		ReadHandle(self.counter.load(Ordering::Acquire))
	}

	pub fn is_read_valid(&self, handle: ReadHandle) -> bool {
		// order the reads made under the handle before the re-check
		fence(Ordering::Acquire);
		!handle.is_write_locked() && self.counter.load(Ordering::Relaxed) == handle.0
	}

	pub fn is_write_locked(&self) -> bool {
		self.counter.load(Ordering::Acquire) & 1 == 1
	}

	/// Returns `false`, leaving the counter untouched, if a write is already in progress.
	pub fn begin_write(&self) -> bool {
		if !self.advance(0) {
			return false;
		}
		fence(Ordering::Release);
		true
	}

	/// Returns `false`, leaving the counter untouched, if no write was in progress.
	pub fn end_write(&self) -> bool {
		self.advance(1)
	}

	/// Increments the counter only while its low bit equals `parity`.
	fn advance(&self, parity: usize) -> bool {
		let mut current = self.counter.load(Ordering::Acquire);
		loop {
			if current & 1 != parity {
				return false;
			}
			match self.counter.compare_exchange_weak(current, current.wrapping_add(1), Ordering::AcqRel, Ordering::Acquire) {
				Ok(_) => return true,
				Err(actual) => current = actual,
			}
		}
	}

	/// Write epoch ending when the guard is dropped.
	pub fn write(&self) -> WriteGuard {
		let began = self.begin_write();
		debug_assert!(began, "nested write epoch");
		WriteGuard { lock: self, began }
	}
}

pub struct WriteGuard<'a> {
	lock: &'a SequentialLock,
	began: bool,
}

impl<'a> Drop for WriteGuard<'a> {
	fn drop(&mut self) {
		// a guard that did not begin the epoch must not end someone else's
		if self.began {
			self.lock.end_write();
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	use std::thread;
	use super::SequentialLock;

	#[test]
	fn test_write_epoch_invalidates_reads() {
		let lock = SequentialLock::new();
		let handle = lock.begin_read();
		assert!(lock.is_read_valid(handle));

		{
			let _write = lock.write();
			assert!(lock.is_write_locked());
			assert!(!lock.is_read_valid(handle));
			assert!(!lock.is_read_valid(lock.begin_read()));
		}

		assert!(!lock.is_write_locked());
		assert!(!lock.is_read_valid(handle));
		assert!(lock.is_read_valid(lock.begin_read()));
	}

	#[test]
	fn test_unbalanced_calls_are_reported() {
		let lock = SequentialLock::new();
		let idle = lock.begin_read();
		assert!(!lock.end_write());
		assert!(!lock.is_write_locked());
		assert!(lock.is_read_valid(idle));

		assert!(lock.begin_write());
		assert!(!lock.begin_write());
		assert!(lock.is_write_locked());

		assert!(lock.end_write());
		assert!(!lock.end_write());
		assert!(!lock.is_write_locked());
		assert!(lock.is_read_valid(lock.begin_read()));
		assert!(!lock.is_read_valid(idle));
	}

	#[test]
	fn test_readers_never_accept_torn_pairs() {
		let lock = Arc::new(SequentialLock::new());
		let first = Arc::new(AtomicUsize::new(0));
		let second = Arc::new(AtomicUsize::new(0));
		let done = Arc::new(AtomicBool::new(false));

		let readers: Vec<_> = (0..4).map(|_| {
			let lock = lock.clone();
			let first = first.clone();
			let second = second.clone();
			let done = done.clone();
			thread::spawn(move || {
				let mut accepted = 0usize;
				while !done.load(Ordering::SeqCst) {
					let handle = lock.begin_read();
					let a = first.load(Ordering::Relaxed);
					let b = second.load(Ordering::Relaxed);
					if lock.is_read_valid(handle) {
						assert!(!handle.is_write_locked());
						assert_eq!(a, b);
						accepted += 1;
					}
				}
				accepted
			})
		}).collect();

		for i in 1..20_000 {
			let _write = lock.write();
			first.store(i, Ordering::Relaxed);
			second.store(i, Ordering::Relaxed);
		}
		done.store(true, Ordering::SeqCst);

		for reader in readers {
			reader.join().unwrap();
		}
		assert!(!lock.is_write_locked());
	}
}
