//! Device settings: a JSON object drivers expose for runtime tuning.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// Called with `(name, new_value, old_value)` for every key whose value changes.
pub type SettingsListener = Arc<dyn Fn(&str, &Value, Option<&Value>) -> Result<()> + Send + Sync>;

#[derive(Default)]
pub struct DeviceSettings {
	values: RwLock<Map<String, Value>>,
	listener: Option<SettingsListener>,
}

impl DeviceSettings {
	pub fn new(defaults: Map<String, Value>) -> Self {
		Self {
			values: RwLock::new(defaults),
			listener: None,
		}
	}

	pub fn with_listener(mut self, listener: SettingsListener) -> Self {
		self.listener = Some(listener);
		self
	}

	/// Applies `update`, which must be a non-empty object.
	///
	/// The listener runs for each changed key before anything is stored; a
	/// listener error aborts the update with no keys applied.
	pub fn update(&self, update: &Value) -> Result<()> {
		let changes = update
			.as_object()
			.filter(|obj| !obj.is_empty())
			.ok_or_else(|| {
				Error::InvalidArgument(format!("Settings update should be called with a non-empty object. Got: {update}"))
			})?;

		if let Some(listener) = &self.listener {
			let current = self.values.read().clone();
			for (name, value) in changes {
				let old = current.get(name);
				if old != Some(value) {
					listener(name, value, old)?;
				}
			}
		}

		let mut values = self.values.write();
		for (name, value) in changes {
			values.insert(name.clone(), value.clone());
		}
		debug!(target = "wd", keys = ?changes.keys().collect::<Vec<_>>(), "Settings updated");
		Ok(())
	}

	pub fn get(&self) -> Map<String, Value> {
		self.values.read().clone()
	}
}

impl std::fmt::Debug for DeviceSettings {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DeviceSettings")
			.field("values", &*self.values.read())
			.field("listener", &self.listener.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use parking_lot::Mutex;
	use serde_json::json;

	use super::*;

	#[test]
	fn listener_sees_only_changed_keys() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		let settings = DeviceSettings::new(json!({"a": 1, "b": 2}).as_object().cloned().unwrap()).with_listener(
			Arc::new(move |name, new, old| {
				sink.lock().push((name.to_string(), new.clone(), old.cloned()));
				Ok(())
			}),
		);

		settings.update(&json!({"a": 1, "b": 3, "c": true})).unwrap();

		assert_eq!(
			*seen.lock(),
			vec![
				("b".to_string(), json!(3), Some(json!(2))),
				("c".to_string(), json!(true), None),
			]
		);
		assert_eq!(Value::Object(settings.get()), json!({"a": 1, "b": 3, "c": true}));
	}

	#[test]
	fn rejects_empty_and_non_objects() {
		let settings = DeviceSettings::default();
		for bad in [json!({}), json!([1]), json!("x"), Value::Null] {
			assert!(matches!(settings.update(&bad), Err(Error::InvalidArgument(_))), "{bad}");
		}
	}

	#[test]
	fn listener_error_leaves_values_untouched() {
		let settings = DeviceSettings::default()
			.with_listener(Arc::new(|name, _, _| Err(Error::InvalidArgument(format!("{name} is read-only")))));
		assert!(settings.update(&json!({"locked": 1})).is_err());
		assert!(settings.get().is_empty());
	}
}
