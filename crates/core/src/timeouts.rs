//! Idle-timeout and implicit-wait bookkeeping.
//!
//! [`TimeoutController`] owns both durations, the single idle timer, and the
//! [`ManagedDriverRegistry`] that the setters fan out to.
//!
//! The idle timer is a spawned sleep tagged with a generation number.
//! Cancelling bumps the generation and aborts the task, so a timer that has
//! already woken but not yet fired sees a stale generation and does nothing.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::managed::ManagedDriverRegistry;

/// Interval between condition polls in [`TimeoutController::wait_for_condition`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default idle timeout.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 60_000;

#[derive(Default)]
struct IdleTimer {
	generation: u64,
	handle: Option<JoinHandle<()>>,
}

impl IdleTimer {
	fn cancel(&mut self) {
		self.generation = self.generation.wrapping_add(1);
		if let Some(handle) = self.handle.take() {
			handle.abort();
		}
	}
}

thread_local! {
	/// Controllers whose fan-out is running on this thread.
	static FANNING_OUT: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks a controller as fanning out until dropped.
///
/// Fan-out is synchronous, so a controller reached again on the same thread
/// means the managed drivers form a cycle; that visit stores the value and
/// stops there.
struct FanOut {
	id: usize,
}

impl FanOut {
	fn enter(controller: &TimeoutController) -> Option<Self> {
		let id = controller as *const TimeoutController as usize;
		FANNING_OUT.with(|active| {
			let mut active = active.borrow_mut();
			if active.contains(&id) {
				debug!(target = "wd", "Managed driver cycle, not fanning out again");
				return None;
			}
			active.push(id);
			Some(Self { id })
		})
	}
}

impl Drop for FanOut {
	fn drop(&mut self) {
		FANNING_OUT.with(|active| active.borrow_mut().retain(|&id| id != self.id));
	}
}

pub struct TimeoutController {
	idle_timeout_ms: AtomicU64,
	implicit_wait_ms: AtomicU64,
	timer: Arc<Mutex<IdleTimer>>,
	managed: ManagedDriverRegistry,
}

impl Default for TimeoutController {
	fn default() -> Self {
		Self::new(DEFAULT_IDLE_TIMEOUT_MS, 0)
	}
}

impl TimeoutController {
	pub fn new(idle_timeout_ms: u64, implicit_wait_ms: u64) -> Self {
		Self {
			idle_timeout_ms: AtomicU64::new(idle_timeout_ms),
			implicit_wait_ms: AtomicU64::new(implicit_wait_ms),
			timer: Arc::new(Mutex::new(IdleTimer::default())),
			managed: ManagedDriverRegistry::new(),
		}
	}

	pub fn idle_timeout_ms(&self) -> u64 {
		self.idle_timeout_ms.load(Ordering::SeqCst)
	}

	pub fn implicit_wait_ms(&self) -> u64 {
		self.implicit_wait_ms.load(Ordering::SeqCst)
	}

	pub fn managed(&self) -> &ManagedDriverRegistry {
		&self.managed
	}

	/// Stores the idle timeout and forwards it to every managed child that accepts it.
	///
	/// Does not reschedule a running timer; the new value applies from the
	/// next restart.
	pub fn set_idle_timeout(&self, ms: u64) {
		debug!(target = "wd", timeout_ms = ms, "Set idle timeout");
		self.idle_timeout_ms.store(ms, Ordering::SeqCst);
		let Some(_fan_out) = FanOut::enter(self) else {
			return;
		};
		let updated = self.managed.for_each_timeout_target(|child| child.set_idle_timeout(ms));
		if updated > 0 {
			debug!(target = "wd", children = updated, "Propagated idle timeout to managed drivers");
		}
	}

	/// Stores the implicit wait and forwards it like [`Self::set_idle_timeout`].
	pub fn set_implicit_wait(&self, ms: u64) {
		debug!(target = "wd", timeout_ms = ms, "Set implicit wait");
		self.implicit_wait_ms.store(ms, Ordering::SeqCst);
		let Some(_fan_out) = FanOut::enter(self) else {
			return;
		};
		let updated = self.managed.for_each_timeout_target(|child| child.set_implicit_wait(ms));
		if updated > 0 {
			debug!(target = "wd", children = updated, "Propagated implicit wait to managed drivers");
		}
	}

	/// Cancels the pending idle timer, if any.
	pub fn clear_idle_timer(&self) {
		self.timer.lock().cancel();
	}

	pub fn idle_timer_active(&self) -> bool {
		self.timer.lock().handle.as_ref().is_some_and(|h| !h.is_finished())
	}

	/// (Re)schedules the idle timer.
	///
	/// Any pending timer is cancelled first. With an idle timeout of zero
	/// nothing is scheduled. When the timer fires, `on_expire` receives an
	/// [`Error::IdleTimeout`]. Must be called from within a tokio runtime.
	pub fn start_idle_timer<F>(&self, on_expire: F)
	where
		F: FnOnce(Error) + Send + 'static,
	{
		self.start_idle_timer_when(|| true, on_expire);
	}

	/// Like [`Self::start_idle_timer`], but only arms the timer if `ready`
	/// returns true. `ready` runs while the timer lock is held, so a
	/// concurrent [`Self::clear_idle_timer`] is ordered either before the
	/// check or after the timer is armed.
	pub fn start_idle_timer_when<R, F>(&self, ready: R, on_expire: F)
	where
		R: FnOnce() -> bool,
		F: FnOnce(Error) + Send + 'static,
	{
		let mut timer = self.timer.lock();
		timer.cancel();

		let timeout_ms = self.idle_timeout_ms();
		if timeout_ms == 0 || !ready() {
			return;
		}

		let generation = timer.generation;
		let state = Arc::clone(&self.timer);
		timer.handle = Some(tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
			{
				let mut timer = state.lock();
				if timer.generation != generation {
					return;
				}
				timer.handle = None;
			}
			warn!(target = "wd", timeout_ms, "Idle timeout expired, shutting down session");
			on_expire(Error::IdleTimeout { timeout_ms });
		}));
	}

	/// Polls `condition` until it yields a value or the implicit wait runs out.
	///
	/// The condition is checked at least once, then every [`POLL_INTERVAL`].
	/// Errors from the condition stop the wait immediately. Every poll counts
	/// as session activity and clears the idle timer.
	pub async fn wait_for_condition<T, F, Fut>(&self, mut condition: F) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<Option<T>>>,
	{
		let wait_ms = self.implicit_wait_ms();
		let started = Instant::now();
		let deadline = started + Duration::from_millis(wait_ms);
		debug!(target = "wd", wait_ms, "Waiting for condition");

		loop {
			self.clear_idle_timer();
			if let Some(value) = condition().await? {
				return Ok(value);
			}
			let now = Instant::now();
			if now >= deadline {
				let elapsed = now.duration_since(started).as_millis();
				return Err(Error::Timeout(format!("Condition unmet after {elapsed} ms. Timing out.")));
			}
			tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
		}
	}
}

impl std::fmt::Debug for TimeoutController {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TimeoutController")
			.field("idle_timeout_ms", &self.idle_timeout_ms())
			.field("implicit_wait_ms", &self.implicit_wait_ms())
			.field("managed", &self.managed)
			.finish()
	}
}

/// Parses a timeout given as text.
///
/// Leading whitespace and an optional sign are accepted, parsing stops at the
/// first non-digit, and anything after it is ignored (`"500ms"` is 500).
/// Fails with [`Error::InvalidArgument`] when no digits are found, the value
/// is negative, or it does not fit in a `u64`.
pub fn parse_timeout_argument(raw: &str) -> Result<u64> {
	let invalid = || Error::InvalidArgument(format!("Invalid timeout value '{raw}'"));

	let trimmed = raw.trim_start();
	let (negative, rest) = match trimmed.as_bytes().first() {
		Some(b'-') => (true, &trimmed[1..]),
		Some(b'+') => (false, &trimmed[1..]),
		_ => (false, trimmed),
	};
	let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
	if digits_len == 0 {
		return Err(invalid());
	}
	let magnitude: u64 = rest[..digits_len].parse().map_err(|_| invalid())?;
	if negative && magnitude > 0 {
		return Err(invalid());
	}
	Ok(magnitude)
}

/// Parses a timeout argument that may arrive as a JSON number or string.
pub fn parse_timeout_value(raw: &Value) -> Result<u64> {
	match raw {
		Value::String(s) => parse_timeout_argument(s),
		Value::Number(n) => parse_timeout_argument(&n.to_string()),
		other => Err(Error::InvalidArgument(format!("Invalid timeout value '{other}'"))),
	}
}
