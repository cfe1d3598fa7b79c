//! Wire dialect detection for session creation.
//!
//! A session speaks either the legacy JSON Wire Protocol or W3C WebDriver.
//! The choice is made once, from the *shape* of the session-creation
//! arguments: any argument that looks like a W3C capability container
//! (`alwaysMatch` / `firstMatch`) selects W3C, everything else is JSONWP.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire dialect negotiated for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
	/// Legacy JSON Wire Protocol (`desiredCapabilities`).
	#[serde(rename = "MJSONWP")]
	JsonWire,
	/// W3C WebDriver (`capabilities.alwaysMatch` / `firstMatch`).
	#[serde(rename = "W3C")]
	W3c,
}

impl Dialect {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::JsonWire => "MJSONWP",
			Self::W3c => "W3C",
		}
	}
}

impl fmt::Display for Dialect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Returns `true` if `value` is a W3C capability container.
///
/// Accepts the bare container (`{"alwaysMatch": {...}}`) and the request-body
/// wrapper (`{"capabilities": {"firstMatch": [...]}}`).
pub fn is_w3c_capabilities(value: &Value) -> bool {
	let Some(obj) = value.as_object() else {
		return false;
	};
	if let Some(inner) = obj.get("capabilities") {
		return is_w3c_capabilities(inner);
	}
	let always = obj.get("alwaysMatch").is_some_and(Value::is_object);
	let first = obj.get("firstMatch").is_some_and(Value::is_array);
	always || first
}

/// Classifies session-creation arguments by shape.
///
/// Pure: inspects the arguments only. An empty argument list is JSONWP.
pub fn determine_dialect(args: &[Value]) -> Dialect {
	if args.iter().any(is_w3c_capabilities) {
		Dialect::W3c
	} else {
		Dialect::JsonWire
	}
}
