//! Per-order lock registry.
//!
//! All mutating operations on a given order are serialized through the
//! mutex registered here; cross-order operations run fully in parallel.
//! The override-lock check and the transition check always happen inside
//! the same critical section, so automation can never race a concurrent
//! administrative lock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Registry of per-order mutexes keyed by order id.
pub struct OrderLocks {
	locks: DashMap<String, Arc<Mutex<()>>>,
}

impl OrderLocks {
	pub fn new() -> Self {
		Self {
			locks: DashMap::new(),
		}
	}

	/// Returns the mutex guarding the given order, creating it on first use.
	pub fn for_order(&self, order_id: &str) -> Arc<Mutex<()>> {
		self.locks
			.entry(order_id.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}
}

impl Default for OrderLocks {
	fn default() -> Self {
		Self::new()
	}
}
