//! Command dispatch.
//!
//! Order of operations for one [`Driver::execute`] call:
//!
//! 1. note the start time; session creation negotiates the dialect
//! 2. count the command as in flight, then clear the idle timer
//! 3. refuse everything while an unexpected shutdown is in progress
//! 4. resolve the handler and check for a live session
//! 5. wait for the command queue, racing the shutdown signal, and check the
//!    session again once the turn comes
//! 6. run the handler, still racing the shutdown signal
//! 7. re-arm the idle timer once nothing is in flight
//! 8. append the command record to the history

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::Driver;
use crate::commands::{CREATE_SESSION, CommandFn, DELETE_SESSION, EXECUTE_DRIVER_SCRIPT, requires_session};
use crate::error::{Error, Result};
use crate::history::{
	CommandRecord, EVENT_SESSION_INIT, EVENT_SESSION_QUIT_DONE, EVENT_SESSION_QUIT_START, EVENT_SESSION_START, now_ms,
};

/// Counts a command as in flight until dropped.
struct InFlight<'a> {
	count: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
	fn enter(count: &'a AtomicUsize) -> Self {
		count.fetch_add(1, Ordering::SeqCst);
		Self { count }
	}
}

impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		self.count.fetch_sub(1, Ordering::SeqCst);
	}
}

impl Driver {
	/// Runs `command` with `args` and returns its result.
	///
	/// Guarded commands run one at a time per driver. `executeDriverScript`
	/// bypasses the queue so the commands it runs can themselves be queued;
	/// it must not touch session state directly.
	pub async fn execute(&self, command: &str, args: Vec<Value>) -> Result<Value> {
		let inner = &self.inner;
		let start_time = now_ms();
		if command == CREATE_SESSION {
			// A live session keeps the dialect it was created with.
			if !self.has_session() {
				inner.negotiator.negotiate(&args);
			}
			inner.history.record(EVENT_SESSION_INIT);
		} else if command == DELETE_SESSION {
			inner.history.record(EVENT_SESSION_QUIT_START);
		}

		// In flight before the timer is cleared, so a concurrent re-arm sees us.
		let in_flight = InFlight::enter(&inner.in_flight);
		inner.timeouts.clear_idle_timer();

		if inner.shutdown.is_shutting_down() {
			return Err(Error::unexpected_shutdown());
		}

		let handler = match self.admit(command) {
			Ok(handler) => handler,
			Err(err) => return self.reject(command, in_flight, err),
		};

		// Subscribed before queueing so a shutdown also releases queued commands.
		let (mut cancelled, subscription) = inner.shutdown.subscribe_in_flight();
		let queued = inner.automation.commands_queue_enabled() && command != EXECUTE_DRIVER_SCRIPT;
		let turn = if queued {
			tokio::select! {
				turn = inner.queue.lock() => Some(turn),
				Ok(cause) = &mut cancelled => return self.reject(command, in_flight, cause),
			}
		} else {
			None
		};

		// The session may have gone while this command waited for its turn.
		if let Err(err) = self.admit_session(command) {
			drop(turn);
			return self.reject(command, in_flight, err);
		}

		debug!(target = "wd", command, "Executing command");
		let outcome = self.run_cancellable(handler, args, &mut cancelled).await;
		drop(subscription);
		drop(turn);
		drop(in_flight);

		self.rearm_idle_timer(command);

		let end_time = now_ms().max(start_time);
		inner.history.push_command(CommandRecord {
			command: command.to_string(),
			start_time,
			end_time,
		});

		match &outcome {
			Ok(_) => {
				if command == CREATE_SESSION {
					inner.history.record(EVENT_SESSION_START);
				} else if command == DELETE_SESSION {
					inner.history.record(EVENT_SESSION_QUIT_DONE);
				}
				debug!(target = "wd", command, elapsed_ms = end_time - start_time, "Command finished");
			}
			Err(err) => {
				debug!(target = "wd", command, elapsed_ms = end_time - start_time, error = %err, "Command failed");
			}
		}
		outcome
	}

	fn admit(&self, command: &str) -> Result<CommandFn> {
		let handler = self.inner.commands.get(command).ok_or(Error::NotYetImplemented)?;
		self.admit_session(command)?;
		Ok(handler)
	}

	fn admit_session(&self, command: &str) -> Result<()> {
		if self.inner.shutdown.is_shutting_down() {
			return Err(Error::unexpected_shutdown());
		}
		if requires_session(command) && !self.has_session() {
			return Err(Error::no_session());
		}
		Ok(())
	}

	/// Fails `command` before its handler runs. No history record is kept.
	fn reject(&self, command: &str, in_flight: InFlight<'_>, err: Error) -> Result<Value> {
		drop(in_flight);
		debug!(target = "wd", command, error = %err, "Command rejected");
		self.rearm_idle_timer(command);
		Err(err)
	}

	/// Runs `handler` as its own task and races it against the shutdown signal.
	///
	/// If the shutdown wins, the handler task keeps running detached and its
	/// result is dropped.
	async fn run_cancellable(
		&self,
		handler: CommandFn,
		args: Vec<Value>,
		cancelled: &mut oneshot::Receiver<Error>,
	) -> Result<Value> {
		let task = tokio::spawn(handler(self.clone(), args));
		tokio::select! {
			joined = task => joined.unwrap_or_else(|e| Err(Error::Unknown(format!("Command task failed: {e}")))),
			Ok(cause) = cancelled => Err(cause),
		}
	}

	/// Arms the idle timer after `command` settles, if the driver is idle now.
	fn rearm_idle_timer(&self, command: &str) {
		let inner = &self.inner;
		if !inner.automation.commands_queue_enabled() || command == DELETE_SESSION {
			return;
		}

		// Checked under the timer lock; a command entering clears the timer after
		// bumping the in-flight count, so it can never run with the timer armed.
		let idle = || {
			inner.in_flight.load(Ordering::SeqCst) == 0 && !inner.shutdown.is_shutting_down() && self.has_session()
		};
		let weak = Arc::downgrade(&self.inner);
		inner.timeouts.start_idle_timer_when(idle, move |cause| {
			let Some(inner) = weak.upgrade() else {
				return;
			};
			let driver = Driver { inner };
			tokio::spawn(async move {
				if let Err(err) = driver.start_unexpected_shutdown(cause).await {
					warn!(target = "wd", error = %err, "Session cleanup after idle timeout failed");
				}
			});
		});
	}

	/// Tears the session down after a fatal error.
	///
	/// Delivers `cause` to every shutdown listener, including commands in
	/// flight, then deletes the session. New commands are refused with
	/// no-such-driver until the deletion finishes. The driver accepts a new
	/// session afterwards.
	pub async fn start_unexpected_shutdown(&self, cause: Error) -> Result<()> {
		let inner = &self.inner;
		warn!(target = "wd", cause = %cause, "Driver shutting down unexpectedly");
		inner.shutdown.broadcast(&cause);

		let _shutting_down = inner.shutdown.begin();
		match inner.commands.get(DELETE_SESSION) {
			Some(delete) => delete(self.clone(), Vec::new()).await.map(|_| ()),
			None => Ok(()),
		}
	}
}
