use serde_json::Value;

use crate::driver::Driver;
use crate::error::Result;

pub(super) async fn update_settings(driver: Driver, args: Vec<Value>) -> Result<Value> {
	driver.settings().update(args.first().unwrap_or(&Value::Null))?;
	Ok(Value::Null)
}

pub(super) async fn get_settings(driver: Driver, _args: Vec<Value>) -> Result<Value> {
	Ok(Value::Object(driver.settings().get()))
}
