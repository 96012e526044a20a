// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Point-in-time copy of [`RefreshMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
	/// Refresh requests received, coalesced ones included.
	pub attempts: u64,
	/// Pairs obtained from the refresh endpoint.
	pub rotations: u64,
	/// Requests that ended in an error.
	pub failures: u64,
	/// Requests answered with a pair another caller had just rotated.
	pub coalesced: u64,
}

/// Lock-free refresh counters shared by every clone of a client.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	rotations: AtomicU64,
	failures: AtomicU64,
	coalesced: AtomicU64,
}
impl RefreshMetrics {
	/// Refresh requests received, coalesced ones included.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Pairs obtained from the refresh endpoint.
	pub fn rotations(&self) -> u64 {
		self.rotations.load(Ordering::Relaxed)
	}

	/// Requests that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Requests answered without a network call.
	pub fn coalesced(&self) -> u64 {
		self.coalesced.load(Ordering::Relaxed)
	}

	/// Copies every counter at once.
	pub fn snapshot(&self) -> RefreshStats {
		RefreshStats {
			attempts: self.attempts(),
			rotations: self.rotations(),
			failures: self.failures(),
			coalesced: self.coalesced(),
		}
	}

	pub(crate) fn bump_attempts(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn bump_rotations(&self) {
		self.rotations.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn bump_failures(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn bump_coalesced(&self) {
		self.coalesced.fetch_add(1, Ordering::Relaxed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn snapshot_reflects_counters() {
		let metrics = RefreshMetrics::default();

		metrics.bump_attempts();
		metrics.bump_attempts();
		metrics.bump_rotations();
		metrics.bump_coalesced();

		assert_eq!(
			metrics.snapshot(),
			RefreshStats { attempts: 2, rotations: 1, failures: 0, coalesced: 1 },
		);
	}
}
