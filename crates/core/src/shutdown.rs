//! Unexpected-shutdown signal.
//!
//! A multicast cancellation channel. Listeners are kept in an [`IndexMap`]
//! so they fire in registration order and can be removed in O(1). Two kinds
//! of listener share the map:
//!
//! - [`ListenerKind::Persistent`] - registered through [`ShutdownSignal::on_shutdown`],
//!   never removed, may be registered any number of times
//! - [`ListenerKind::InFlight`] - one per executing command, created by
//!   [`ShutdownSignal::subscribe_in_flight`] and removed when its
//!   [`ListenerGuard`] drops
//!
//! [`ShutdownSignal::broadcast`] calls every listener synchronously and spawns
//! the futures they return, so the trigger never waits on listener work.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Identifier of a registered listener.
pub type ListenerId = u64;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

fn next_listener_id() -> ListenerId {
	NEXT_LISTENER_ID.fetch_add(1, Ordering::SeqCst)
}

/// Boxed listener future.
pub type ListenerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Listener function: shutdown cause -> async `Result<()>`.
pub type ListenerFn = Arc<dyn Fn(Error) -> ListenerFuture + Send + Sync>;

/// Who registered a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
	Persistent,
	InFlight,
}

struct ListenerEntry {
	kind: ListenerKind,
	listener: ListenerFn,
}

type ListenerMap = Mutex<IndexMap<ListenerId, ListenerEntry>>;

/// RAII handle that removes an in-flight listener on drop.
///
/// Holds a weak reference to the listener map; dropping it after the signal
/// is gone is a no-op.
pub struct ListenerGuard {
	id: ListenerId,
	map: Weak<ListenerMap>,
}

impl ListenerGuard {
	pub fn id(&self) -> ListenerId {
		self.id
	}

	/// Removes the listener now. Equivalent to dropping.
	pub fn release(self) {}
}

impl Drop for ListenerGuard {
	fn drop(&mut self) {
		if let Some(map) = self.map.upgrade() {
			map.lock().shift_remove(&self.id);
		}
	}
}

impl std::fmt::Debug for ListenerGuard {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ListenerGuard")
			.field("id", &self.id)
			.field("live", &(self.map.strong_count() > 0))
			.finish()
	}
}

/// Scoped "shutting down" state. Clears the flag on drop, on every path.
pub struct ShuttingDown<'a> {
	flag: &'a AtomicBool,
}

impl Drop for ShuttingDown<'_> {
	fn drop(&mut self) {
		self.flag.store(false, Ordering::SeqCst);
	}
}

/// Multicast channel announcing that the driver is going away.
pub struct ShutdownSignal {
	listeners: Arc<ListenerMap>,
	shutting_down: AtomicBool,
}

impl Default for ShutdownSignal {
	fn default() -> Self {
		Self::new()
	}
}

impl ShutdownSignal {
	pub fn new() -> Self {
		Self {
			listeners: Arc::new(Mutex::new(IndexMap::new())),
			shutting_down: AtomicBool::new(false),
		}
	}

	/// Registers a persistent listener. Registering the same code twice runs it twice.
	pub fn on_shutdown<F, Fut>(&self, listener: F) -> ListenerId
	where
		F: Fn(Error) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<()>> + Send + 'static,
	{
		let listener: ListenerFn = Arc::new(move |cause| -> ListenerFuture { Box::pin(listener(cause)) });
		self.insert(ListenerKind::Persistent, listener)
	}

	/// Registers a one-shot listener for a command that is about to run.
	///
	/// The receiver resolves with the cause of the first broadcast. The
	/// listener stays registered until the returned guard drops.
	pub fn subscribe_in_flight(&self) -> (oneshot::Receiver<Error>, ListenerGuard) {
		let (tx, rx) = oneshot::channel();
		let tx = Mutex::new(Some(tx));
		let listener: ListenerFn = Arc::new(move |cause| -> ListenerFuture {
			if let Some(tx) = tx.lock().take() {
				let _ = tx.send(cause);
			}
			Box::pin(async { Ok(()) })
		});
		let id = self.insert(ListenerKind::InFlight, listener);
		let guard = ListenerGuard {
			id,
			map: Arc::downgrade(&self.listeners),
		};
		(rx, guard)
	}

	fn insert(&self, kind: ListenerKind, listener: ListenerFn) -> ListenerId {
		let id = next_listener_id();
		self.listeners.lock().insert(id, ListenerEntry { kind, listener });
		id
	}

	/// Number of registered listeners of `kind`.
	pub fn listener_count(&self, kind: ListenerKind) -> usize {
		self.listeners.lock().values().filter(|entry| entry.kind == kind).count()
	}

	pub fn is_shutting_down(&self) -> bool {
		self.shutting_down.load(Ordering::SeqCst)
	}

	/// Marks the driver as shutting down until the returned guard drops.
	pub fn begin(&self) -> ShuttingDown<'_> {
		self.shutting_down.store(true, Ordering::SeqCst);
		ShuttingDown {
			flag: &self.shutting_down,
		}
	}

	/// Delivers `cause` to every listener in registration order.
	///
	/// Listener bodies run here; the futures they return are spawned and not
	/// awaited. Without a runtime those futures are dropped.
	pub fn broadcast(&self, cause: &Error) {
		let snapshot: Vec<(ListenerId, ListenerFn)> = self
			.listeners
			.lock()
			.iter()
			.map(|(id, entry)| (*id, Arc::clone(&entry.listener)))
			.collect();

		debug!(target = "wd", listeners = snapshot.len(), cause = %cause, "Broadcasting unexpected shutdown");

		let runtime = tokio::runtime::Handle::try_current().ok();
		for (id, listener) in snapshot {
			let fut = listener(cause.clone());
			match &runtime {
				Some(handle) => {
					handle.spawn(async move {
						if let Err(e) = fut.await {
							warn!(target = "wd", listener = id, error = %e, "Shutdown listener failed");
						}
					});
				}
				None => debug!(target = "wd", listener = id, "No runtime; shutdown listener future dropped"),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicUsize;

	use super::*;

	#[tokio::test]
	async fn in_flight_receiver_gets_cause() {
		let signal = ShutdownSignal::new();
		let (rx, _guard) = signal.subscribe_in_flight();

		signal.broadcast(&Error::Unknown("boom".into()));

		assert_eq!(rx.await.unwrap(), Error::Unknown("boom".into()));
	}

	#[test]
	fn guard_drop_removes_listener() {
		let signal = ShutdownSignal::new();
		let (_rx, guard) = signal.subscribe_in_flight();
		assert_eq!(signal.listener_count(ListenerKind::InFlight), 1);

		guard.release();
		assert_eq!(signal.listener_count(ListenerKind::InFlight), 0);
	}

	#[tokio::test]
	async fn persistent_listeners_fire_once_per_registration() {
		let signal = ShutdownSignal::new();
		let hits = Arc::new(AtomicUsize::new(0));
		for _ in 0..2 {
			let hits = Arc::clone(&hits);
			signal.on_shutdown(move |_| {
				let hits = Arc::clone(&hits);
				async move {
					hits.fetch_add(1, Ordering::SeqCst);
					Ok(())
				}
			});
		}

		signal.broadcast(&Error::unexpected_shutdown());
		tokio::task::yield_now().await;
		tokio::task::yield_now().await;

		assert_eq!(hits.load(Ordering::SeqCst), 2);
		assert_eq!(signal.listener_count(ListenerKind::Persistent), 2);
	}

	#[test]
	fn shutting_down_flag_is_scoped() {
		let signal = ShutdownSignal::new();
		{
			let _flag = signal.begin();
			assert!(signal.is_shutting_down());
		}
		assert!(!signal.is_shutting_down());
	}
}
