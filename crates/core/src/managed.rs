//! Managed (child) drivers.
//!
//! A parent driver keeps references to the drivers it supervises so that
//! timeout configuration stays in sync. The parent never owns a child's
//! lifetime and there is no removal operation.

use std::sync::Arc;

use downcast_rs::{DowncastSync, impl_downcast};
use parking_lot::RwLock;

/// Timeout setters a child may expose to its parent.
pub trait TimeoutSettings: Send + Sync {
	fn set_idle_timeout(&self, ms: u64);
	fn set_implicit_wait(&self, ms: u64);
}

/// A driver that can be registered under a parent.
///
/// Implementors that accept timeout fan-out return `Some` from
/// [`ManagedDriver::timeout_settings`]; the default opts out and the child is
/// skipped without error.
pub trait ManagedDriver: DowncastSync {
	fn timeout_settings(&self) -> Option<&dyn TimeoutSettings> {
		None
	}
}
impl_downcast!(sync ManagedDriver);

/// Append-only, ordered set of child drivers.
#[derive(Default)]
pub struct ManagedDriverRegistry {
	children: RwLock<Vec<Arc<dyn ManagedDriver>>>,
}

impl ManagedDriverRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&self, child: Arc<dyn ManagedDriver>) {
		self.children.write().push(child);
	}

	/// Children in registration order.
	pub fn list(&self) -> Vec<Arc<dyn ManagedDriver>> {
		self.children.read().clone()
	}

	pub fn len(&self) -> usize {
		self.children.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.children.read().is_empty()
	}

	/// Calls `apply` on every child that exposes timeout setters.
	///
	/// Returns how many children were updated. The child list is snapshotted
	/// first so a setter that registers further children cannot deadlock.
	/// Children may form cycles (a driver registered under itself, or two
	/// drivers under each other); [`crate::TimeoutController`] stops the
	/// fan-out the second time it reaches the same controller.
	pub(crate) fn for_each_timeout_target(&self, mut apply: impl FnMut(&dyn TimeoutSettings)) -> usize {
		let mut updated = 0;
		for child in self.list() {
			if let Some(settings) = child.timeout_settings() {
				apply(settings);
				updated += 1;
			}
		}
		updated
	}
}

impl std::fmt::Debug for ManagedDriverRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ManagedDriverRegistry").field("len", &self.len()).finish()
	}
}
