//! Proxy-avoidance rules.
//!
//! A driver that forwards commands to a remote endpoint lists the routes it
//! wants to handle locally. Rules are validated when they are built, so a
//! malformed list fails at the point the driver produces it.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};

/// HTTP methods a rule may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvoidMethod {
	Get,
	Post,
	Delete,
}

impl AvoidMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Delete => "DELETE",
		}
	}
}

impl FromStr for AvoidMethod {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"GET" => Ok(Self::Get),
			"POST" => Ok(Self::Post),
			"DELETE" => Ok(Self::Delete),
			other => Err(Error::Misuse(format!("Unrecognized proxy avoidance method '{other}'"))),
		}
	}
}

impl fmt::Display for AvoidMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A (method, path pattern) pair.
#[derive(Debug, Clone)]
pub struct AvoidRule {
	method: AvoidMethod,
	pattern: Regex,
}

impl AvoidRule {
	/// Builds a rule from a method name and a regular expression.
	pub fn new(method: &str, pattern: &str) -> Result<Self> {
		let method = method.parse()?;
		let pattern = Regex::new(pattern)
			.map_err(|e| Error::Misuse(format!("Proxy avoidance path must be a regular expression: {e}")))?;
		Ok(Self { method, pattern })
	}

	/// Builds a rule from a two-element list.
	pub fn from_pair<S: AsRef<str>>(pair: &[S]) -> Result<Self> {
		match pair {
			[method, pattern] => Self::new(method.as_ref(), pattern.as_ref()),
			_ => Err(Error::Misuse("Proxy avoidance must be a list of pairs".to_string())),
		}
	}

	/// Builds a rule from a JSON `["GET", "^/status$"]` pair.
	pub fn from_value(value: &Value) -> Result<Self> {
		let pair = value
			.as_array()
			.filter(|items| items.len() == 2)
			.ok_or_else(|| Error::Misuse("Proxy avoidance must be a list of pairs".to_string()))?;
		let method = pair[0]
			.as_str()
			.ok_or_else(|| Error::Misuse(format!("Unrecognized proxy avoidance method '{}'", pair[0])))?;
		let pattern = pair[1]
			.as_str()
			.ok_or_else(|| Error::Misuse("Proxy avoidance path must be a regular expression".to_string()))?;
		Self::new(method, pattern)
	}

	pub fn method(&self) -> AvoidMethod {
		self.method
	}

	pub fn pattern(&self) -> &str {
		self.pattern.as_str()
	}

	pub fn matches(&self, method: &str, path: &str) -> bool {
		self.method.as_str() == method && self.pattern.is_match(path)
	}
}

/// Returns true if any rule claims `(method, path)`.
///
/// `base_path` is stripped from the front of `path` before matching.
pub fn should_avoid(method: &str, path: &str, rules: &[AvoidRule], base_path: &str) -> bool {
	let normalized = path.strip_prefix(base_path).unwrap_or(path);
	rules.iter().any(|rule| rule.matches(method, normalized))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn matching_rule_avoids() {
		let rules = vec![AvoidRule::new("GET", "^/status$").unwrap()];
		assert!(should_avoid("GET", "/status", &rules, ""));
		assert!(!should_avoid("POST", "/status", &rules, ""));
		assert!(!should_avoid("GET", "/status/extra", &rules, ""));
	}

	#[test]
	fn empty_rules_never_avoid() {
		assert!(!should_avoid("GET", "/status", &[], ""));
	}

	#[test]
	fn base_path_is_stripped() {
		let rules = vec![AvoidRule::new("POST", "^/session/[^/]+/appium/").unwrap()];
		assert!(should_avoid("POST", "/wd/hub/session/abc/appium/reset", &rules, "/wd/hub"));
		assert!(!should_avoid("POST", "/other/session/abc/appium/reset", &rules, "/wd/hub"));
	}

	#[test]
	fn single_element_rule_is_misuse() {
		let err = AvoidRule::from_pair(&["GET"]).unwrap_err();
		assert!(matches!(err, Error::Misuse(ref m) if m.contains("list of pairs")));
		assert!(AvoidRule::from_value(&json!(["GET"])).is_err());
	}

	#[test]
	fn unknown_method_is_misuse() {
		let err = AvoidRule::new("PUT", "^/x$").unwrap_err();
		assert!(matches!(err, Error::Misuse(ref m) if m.contains("'PUT'")));
	}

	#[test]
	fn bad_pattern_is_misuse() {
		assert!(matches!(AvoidRule::new("GET", "(unclosed"), Err(Error::Misuse(_))));
		assert!(AvoidRule::from_value(&json!(["GET", 5])).is_err());
	}

	#[test]
	fn from_value_accepts_pairs() {
		let rule = AvoidRule::from_value(&json!(["DELETE", "^/session/.+$"])).unwrap();
		assert_eq!(rule.method(), AvoidMethod::Delete);
		assert_eq!(rule.pattern(), "^/session/.+$");
	}
}
