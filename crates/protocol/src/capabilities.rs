//! W3C capability containers.
//!
//! A W3C `newSession` body carries `alwaysMatch` (applied to every candidate)
//! and `firstMatch` (alternatives, tried in order). [`W3cCapabilities::candidates`]
//! expands the container into the flat capability sets a driver validates,
//! after stripping the driver's vendor prefix from keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::dialect::is_w3c_capabilities;

/// Flat capability set: capability name to value.
pub type Caps = Map<String, Value>;

/// Malformed capability containers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityShapeError {
	/// The container could not be decoded.
	#[error("malformed W3C capabilities: {0}")]
	Malformed(String),

	/// A key appears in both `alwaysMatch` and a `firstMatch` entry.
	#[error("property '{key}' should not exist on both alwaysMatch and firstMatch")]
	Conflict { key: String },
}

/// The `alwaysMatch` / `firstMatch` pair of a W3C session request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct W3cCapabilities {
	#[serde(default)]
	pub always_match: Caps,
	#[serde(default)]
	pub first_match: Vec<Caps>,
}

impl W3cCapabilities {
	/// Finds the first W3C container among session-creation arguments.
	///
	/// Unwraps a `{"capabilities": {...}}` request body if present.
	pub fn from_args(args: &[Value]) -> Result<Option<Self>, CapabilityShapeError> {
		let Some(found) = args.iter().find(|arg| is_w3c_capabilities(arg)) else {
			return Ok(None);
		};
		let container = found.get("capabilities").unwrap_or(found);
		serde_json::from_value(container.clone())
			.map(Some)
			.map_err(|e| CapabilityShapeError::Malformed(e.to_string()))
	}

	/// Expands into merged candidate sets, in `firstMatch` order.
	///
	/// An empty `firstMatch` behaves as a single empty entry. Vendor prefixes
	/// are stripped before merging so `wd:foo` and `foo` collide.
	pub fn candidates(&self, vendor_prefix: &str) -> Result<Vec<Caps>, CapabilityShapeError> {
		let always = strip_vendor_prefix(&self.always_match, vendor_prefix);
		let first_match: Vec<Caps> = if self.first_match.is_empty() {
			vec![Caps::new()]
		} else {
			self.first_match
				.iter()
				.map(|caps| strip_vendor_prefix(caps, vendor_prefix))
				.collect()
		};

		first_match
			.into_iter()
			.map(|entry| {
				let mut merged = always.clone();
				for (key, value) in entry {
					if merged.contains_key(&key) {
						return Err(CapabilityShapeError::Conflict { key });
					}
					merged.insert(key, value);
				}
				Ok(merged)
			})
			.collect()
	}
}

/// Removes `prefix` from every key that carries it.
///
/// An empty prefix leaves the set unchanged.
pub fn strip_vendor_prefix(caps: &Caps, prefix: &str) -> Caps {
	caps.iter()
		.map(|(key, value)| {
			let key = match key.strip_prefix(prefix) {
				Some(stripped) if !prefix.is_empty() => stripped.to_string(),
				_ => key.clone(),
			};
			(key, value.clone())
		})
		.collect()
}
