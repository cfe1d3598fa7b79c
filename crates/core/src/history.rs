//! Session event history.
//!
//! Two kinds of record: named events with their timestamps, and one
//! [`CommandRecord`] per executed command. Readers get a cloned
//! [`EventHistory`] snapshot, never a reference into the live state.

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const EVENT_SESSION_INIT: &str = "newSessionRequested";
pub const EVENT_SESSION_START: &str = "newSessionStarted";
pub const EVENT_SESSION_QUIT_START: &str = "quitSessionRequested";
pub const EVENT_SESSION_QUIT_DONE: &str = "quitSessionFinished";

/// Key reserved for command records in the serialized snapshot.
pub const COMMANDS_KEY: &str = "commands";

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
	pub command: String,
	pub start_time: u64,
	pub end_time: u64,
}

/// Read-only snapshot of the history.
///
/// Serializes as `{"commands": [...], "<event>": [ts, ...], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHistory {
	pub commands: Vec<CommandRecord>,
	#[serde(flatten)]
	pub events: IndexMap<String, Vec<u64>>,
}

impl EventHistory {
	pub fn event(&self, name: &str) -> &[u64] {
		self.events.get(name).map(Vec::as_slice).unwrap_or_default()
	}
}

#[derive(Debug, Default)]
pub struct HistoryLog {
	inner: Mutex<EventHistory>,
}

impl HistoryLog {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records `name` at the current time.
	pub fn log_event(&self, name: &str) -> Result<u64> {
		if name.is_empty() || name == COMMANDS_KEY {
			return Err(Error::Misuse(format!("Cannot log event with reserved or empty name '{name}'")));
		}
		Ok(self.record(name))
	}

	/// Records one of the built-in lifecycle events.
	pub(crate) fn record(&self, name: &str) -> u64 {
		let ts = now_ms();
		self.inner.lock().events.entry(name.to_string()).or_default().push(ts);
		debug!(target = "wd", event = name, ts, "Event logged");
		ts
	}

	pub fn push_command(&self, record: CommandRecord) {
		self.inner.lock().commands.push(record);
	}

	pub fn snapshot(&self) -> EventHistory {
		self.inner.lock().clone()
	}
}
