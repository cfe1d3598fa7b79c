//! Command table and the base command set.
//!
//! The table maps command names to handlers and is fixed once the driver is
//! built. Handlers take an owned [`Driver`] handle and the raw argument list
//! so they can run as detached tasks.

mod find;
mod logs;
mod session;
mod settings;
mod timeouts;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::driver::Driver;
use crate::error::{Error, Result};

pub const CREATE_SESSION: &str = "createSession";
pub const DELETE_SESSION: &str = "deleteSession";
pub const GET_STATUS: &str = "getStatus";
pub const GET_SESSIONS: &str = "getSessions";
/// Runs nested commands; exempt from the command queue.
pub const EXECUTE_DRIVER_SCRIPT: &str = "executeDriverScript";

/// Commands that may run without a live session.
pub const NO_SESSION_COMMANDS: &[&str] = &[CREATE_SESSION, GET_STATUS, GET_SESSIONS];

pub fn requires_session(command: &str) -> bool {
	!NO_SESSION_COMMANDS.contains(&command)
}

/// Boxed handler future.
pub type CommandFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Command handler: driver handle + arguments -> async result.
pub type CommandFn = Arc<dyn Fn(Driver, Vec<Value>) -> CommandFuture + Send + Sync>;

fn boxed<F, Fut>(handler: F) -> CommandFn
where
	F: Fn(Driver, Vec<Value>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Value>> + Send + 'static,
{
	Arc::new(move |driver, args| -> CommandFuture { Box::pin(handler(driver, args)) })
}

#[derive(Clone, Default)]
pub struct CommandTable {
	handlers: IndexMap<String, CommandFn>,
}

impl CommandTable {
	/// An empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// The commands every driver supports.
	pub fn base() -> Self {
		let mut table = Self::new();
		table.put(CREATE_SESSION, boxed(session::create_session));
		table.put(DELETE_SESSION, boxed(session::delete_session));
		table.put("getSession", boxed(session::get_session));
		table.put(GET_SESSIONS, boxed(session::get_sessions));
		table.put(GET_STATUS, boxed(session::get_status));
		table.put("reset", boxed(session::reset));
		table.put("timeouts", boxed(timeouts::timeouts));
		table.put("getTimeouts", boxed(timeouts::get_timeouts));
		table.put("implicitWait", boxed(timeouts::implicit_wait));
		table.put("newCommandTimeout", boxed(timeouts::new_command_timeout));
		table.put("updateSettings", boxed(settings::update_settings));
		table.put("getSettings", boxed(settings::get_settings));
		table.put("getLogTypes", boxed(logs::get_log_types));
		table.put("getLog", boxed(logs::get_log));
		table.put("logEvent", boxed(logs::log_event));
		table.put("getLogEvents", boxed(logs::get_log_events));
		table.put("findElement", boxed(find::find_element));
		table.put("findElements", boxed(find::find_elements));
		table.put("findElementFromElement", boxed(find::find_element_from_element));
		table.put("findElementsFromElement", boxed(find::find_elements_from_element));
		table
	}

	fn put(&mut self, name: &str, handler: CommandFn) {
		self.handlers.insert(name.to_string(), handler);
	}

	/// Adds a new command. Fails with [`Error::Misuse`] if the name is taken.
	pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> Result<()>
	where
		F: Fn(Driver, Vec<Value>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Value>> + Send + 'static,
	{
		let name = name.into();
		if self.handlers.contains_key(&name) {
			return Err(Error::Misuse(format!(
				"Command '{name}' is already registered; use override_command to replace it"
			)));
		}
		self.handlers.insert(name, boxed(handler));
		Ok(())
	}

	/// Replaces (or adds) a command. Returns true if one was replaced.
	pub fn override_command<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> bool
	where
		F: Fn(Driver, Vec<Value>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Value>> + Send + 'static,
	{
		self.handlers.insert(name.into(), boxed(handler)).is_some()
	}

	pub fn get(&self, name: &str) -> Option<CommandFn> {
		self.handlers.get(name).cloned()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.handlers.contains_key(name)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.handlers.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.handlers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.is_empty()
	}
}

impl std::fmt::Debug for CommandTable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.handlers.keys()).finish()
	}
}

/// Positional argument, treating JSON `null` as absent.
pub fn arg(args: &[Value], index: usize) -> Option<&Value> {
	args.get(index).filter(|v| !v.is_null())
}

/// Required string argument.
pub fn str_arg<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a str> {
	match arg(args, index) {
		Some(Value::String(s)) => Ok(s),
		Some(other) => Err(Error::InvalidArgument(format!("'{name}' must be a string, got {other}"))),
		None => Err(Error::InvalidArgument(format!("Missing required argument '{name}'"))),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	async fn noop(_driver: Driver, _args: Vec<Value>) -> Result<Value> {
		Ok(Value::Null)
	}

	#[test]
	fn base_table_has_lifecycle_commands() {
		let table = CommandTable::base();
		for name in [CREATE_SESSION, DELETE_SESSION, GET_STATUS, "findElements", "getLogEvents"] {
			assert!(table.contains(name), "{name}");
		}
		assert!(!table.contains(EXECUTE_DRIVER_SCRIPT));
	}

	#[test]
	fn duplicate_registration_is_misuse() {
		let mut table = CommandTable::base();
		let err = table.register(GET_STATUS, noop).unwrap_err();
		assert!(matches!(err, Error::Misuse(_)));

		assert!(table.override_command(GET_STATUS, noop));
		assert!(!table.override_command("brandNew", noop));
		assert!(table.register("another", noop).is_ok());
	}

	#[test]
	fn session_requirement() {
		assert!(!requires_session(CREATE_SESSION));
		assert!(!requires_session(GET_STATUS));
		assert!(requires_session(DELETE_SESSION));
		assert!(requires_session("findElement"));
	}

	#[test]
	fn argument_helpers() {
		let args = vec![json!("css selector"), Value::Null, json!(3)];
		assert_eq!(str_arg(&args, 0, "using").unwrap(), "css selector");
		assert!(arg(&args, 1).is_none());
		assert!(matches!(str_arg(&args, 2, "value"), Err(Error::InvalidArgument(_))));
		assert!(matches!(str_arg(&args, 9, "value"), Err(Error::InvalidArgument(_))));
	}
}
