//! Named log types a driver can serve through `getLog`.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::driver::Driver;
use crate::error::{Error, Result};

/// Produces the entries of one log type.
pub type LogGetter = Arc<dyn Fn(&Driver) -> Result<Vec<Value>> + Send + Sync>;

#[derive(Clone)]
pub struct LogType {
	pub description: String,
	pub getter: LogGetter,
}

impl LogType {
	pub fn new<F>(description: impl Into<String>, getter: F) -> Self
	where
		F: Fn(&Driver) -> Result<Vec<Value>> + Send + Sync + 'static,
	{
		Self {
			description: description.into(),
			getter: Arc::new(getter),
		}
	}
}

impl std::fmt::Debug for LogType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LogType").field("description", &self.description).finish()
	}
}

/// Log types in registration order.
#[derive(Debug, Clone, Default)]
pub struct LogTypes(IndexMap<String, LogType>);

impl LogTypes {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds or replaces a log type.
	pub fn insert(&mut self, name: impl Into<String>, log_type: LogType) {
		self.0.insert(name.into(), log_type);
	}

	pub fn names(&self) -> Vec<String> {
		self.0.keys().cloned().collect()
	}

	/// Runs the getter for `name`.
	pub fn fetch(&self, driver: &Driver, name: &str) -> Result<Vec<Value>> {
		let Some(log_type) = self.0.get(name) else {
			let supported: serde_json::Map<String, Value> = self
				.0
				.iter()
				.map(|(name, ty)| (name.clone(), Value::String(ty.description.clone())))
				.collect();
			return Err(Error::InvalidArgument(format!(
				"Unsupported log type '{name}'. Supported types: {}",
				Value::Object(supported)
			)));
		};
		(log_type.getter)(driver)
	}
}
