use serde_json::{Value, json};
use tracing::debug;

use super::arg;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::timeouts::parse_timeout_value;

fn script_unsupported() -> Error {
	Error::NotImplemented("Not implemented yet for script.".to_string())
}

fn page_load_unsupported() -> Error {
	Error::NotImplemented("Not implemented yet for pageLoad.".to_string())
}

/// `timeouts(type, ms, script, pageLoad, implicit)`.
///
/// `type` and `ms` together select the JSONWP form; otherwise the W3C fields apply.
pub(super) async fn timeouts(driver: Driver, args: Vec<Value>) -> Result<Value> {
	if let (Some(kind), Some(ms)) = (arg(&args, 0), arg(&args, 1)) {
		debug!(target = "wd", kind = %kind, ms = %ms, "JSONWP timeout arguments");
		match kind.as_str() {
			Some("command") => set_new_command_timeout(&driver, ms)?,
			Some("implicit") => set_implicit_wait(&driver, ms)?,
			Some("page load") => return Err(page_load_unsupported()),
			Some("script") => return Err(script_unsupported()),
			_ => {
				return Err(Error::InvalidArgument(format!(
					"'{kind}' type is not supported for MJSONWP timeout"
				)));
			}
		}
		return Ok(Value::Null);
	}

	let (script, page_load, implicit) = (arg(&args, 2), arg(&args, 3), arg(&args, 4));
	debug!(target = "wd", ?script, ?page_load, ?implicit, "W3C timeout arguments");
	if script.is_some() {
		return Err(script_unsupported());
	}
	if page_load.is_some() {
		return Err(page_load_unsupported());
	}
	if let Some(ms) = implicit {
		set_implicit_wait(&driver, ms)?;
	}
	Ok(Value::Null)
}

pub(super) async fn get_timeouts(driver: Driver, _args: Vec<Value>) -> Result<Value> {
	Ok(json!({
		"command": driver.timeouts().idle_timeout_ms(),
		"implicit": driver.timeouts().implicit_wait_ms(),
	}))
}

pub(super) async fn implicit_wait(driver: Driver, args: Vec<Value>) -> Result<Value> {
	set_implicit_wait(&driver, args.first().unwrap_or(&Value::Null))?;
	Ok(Value::Null)
}

pub(super) async fn new_command_timeout(driver: Driver, args: Vec<Value>) -> Result<Value> {
	set_new_command_timeout(&driver, args.first().unwrap_or(&Value::Null))?;
	Ok(Value::Null)
}

fn set_implicit_wait(driver: &Driver, raw: &Value) -> Result<()> {
	driver.timeouts().set_implicit_wait(parse_timeout_value(raw)?);
	Ok(())
}

fn set_new_command_timeout(driver: &Driver, raw: &Value) -> Result<()> {
	driver.timeouts().set_idle_timeout(parse_timeout_value(raw)?);
	Ok(())
}
