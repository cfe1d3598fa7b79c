use serde_json::{Map, Value};
use tracing::debug;

use super::{arg, str_arg};
use crate::driver::Driver;
use crate::error::{Error, Result};

pub(super) async fn get_log_types(driver: Driver, _args: Vec<Value>) -> Result<Value> {
	debug!(target = "wd", "Retrieving supported log types");
	Ok(Value::from(driver.log_types().names()))
}

pub(super) async fn get_log(driver: Driver, args: Vec<Value>) -> Result<Value> {
	let log_type = str_arg(&args, 0, "type")?;
	debug!(target = "wd", log_type, "Retrieving logs");
	Ok(Value::Array(driver.log_types().fetch(&driver, log_type)?))
}

pub(super) async fn log_event(driver: Driver, args: Vec<Value>) -> Result<Value> {
	let name = str_arg(&args, 0, "event")?;
	driver.log_event(name)?;
	Ok(Value::Null)
}

/// The whole history, or only the entries named by a string or list of strings.
pub(super) async fn get_log_events(driver: Driver, args: Vec<Value>) -> Result<Value> {
	let history = serde_json::to_value(driver.event_history())?;
	let wanted: Vec<&str> = match arg(&args, 0) {
		None => return Ok(history),
		Some(Value::String(name)) => vec![name.as_str()],
		Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
		Some(other) => {
			return Err(Error::InvalidArgument(format!(
				"Event type must be a string or a list of strings, got {other}"
			)));
		}
	};
	if wanted.is_empty() {
		return Ok(history);
	}

	let Value::Object(entries) = history else {
		return Ok(Value::Object(Map::new()));
	};
	let picked: Map<String, Value> = entries
		.into_iter()
		.filter(|(name, _)| wanted.contains(&name.as_str()))
		.collect();
	Ok(Value::Object(picked))
}
