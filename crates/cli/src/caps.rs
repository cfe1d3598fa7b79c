//! `wd caps FILE`: offline capability validation.

use std::path::Path;

use serde_json::{Value, json};
use wd::{Caps, Constraints};

use crate::error::{Result, read_json};

/// Validates the capability object in `path` against the base schema.
///
/// Returns a summary of the non-fatal findings; a failing object is an error
/// carrying every reason.
pub fn check_file(path: &Path) -> Result<Value> {
	let caps: Caps = read_json(path)?;
	check(&caps)
}

pub fn check(caps: &Caps) -> Result<Value> {
	let report = Constraints::base().validate(caps)?;
	Ok(json!({
		"valid": true,
		"unrecognized": report.unrecognized,
		"deprecated": report.deprecated,
	}))
}
