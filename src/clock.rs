//! Blocking waits between status polls.
//!
//! Drivers never call [`std::thread::sleep`] directly; they go through a
//! [`Clock`] so that tests can substitute a [`VirtualClock`] and run the
//! convergence loops without real delays.

use std::time::Duration;

/// Types that can block the current thread for a fixed duration.
pub trait Clock {
	/// Block for `duration`.
	fn sleep(&mut self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &mut C {
	fn sleep(&mut self, duration: Duration) {
		(**self).sleep(duration);
	}
}

impl<C: Clock + ?Sized> Clock for Box<C> {
	fn sleep(&mut self, duration: Duration) {
		(**self).sleep(duration);
	}
}

/// A [`Clock`] backed by [`std::thread::sleep`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ThreadClock;

impl Clock for ThreadClock {
	fn sleep(&mut self, duration: Duration) {
		std::thread::sleep(duration);
	}
}

/// A [`Clock`] that only advances virtual time.
///
/// Every call to [`sleep`](Clock::sleep) returns immediately and is recorded.
#[cfg(any(test, feature = "mock"))]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "mock")))]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VirtualClock {
	/// The total virtual time slept.
	elapsed: Duration,
	/// The number of calls to `sleep`.
	sleeps: usize,
}

#[cfg(any(test, feature = "mock"))]
impl VirtualClock {
	/// Create a clock at virtual time zero.
	pub fn new() -> Self {
		Self::default()
	}
	/// The total virtual time slept so far.
	pub fn elapsed(&self) -> Duration {
		self.elapsed
	}
	/// The number of times `sleep` has been called.
	pub fn sleeps(&self) -> usize {
		self.sleeps
	}
}

#[cfg(any(test, feature = "mock"))]
impl Clock for VirtualClock {
	fn sleep(&mut self, duration: Duration) {
		self.elapsed += duration;
		self.sleeps += 1;
	}
}
