//! Capability constraints and validation.
//!
//! A driver declares a [`Constraints`] schema: capability name to
//! [`Constraint`]. Schemas only grow. [`Constraints::merge`] adds new entries
//! and rejects any attempt to change an existing one.
//!
//! Constraints deserialize from the familiar JSON shape:
//!
//! ```json
//! { "platformName": { "presence": true, "isString": true },
//!   "orientation": { "inclusion": ["LANDSCAPE", "PORTRAIT"] } }
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use wd_protocol::Caps;

use crate::error::{Error, Result};

/// JSON type a capability value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
	String,
	Number,
	Boolean,
	Object,
	Array,
}

impl ValueType {
	pub fn matches(&self, value: &Value) -> bool {
		match self {
			Self::String => value.is_string(),
			Self::Number => value.is_number(),
			Self::Boolean => value.is_boolean(),
			Self::Object => value.is_object(),
			Self::Array => value.is_array(),
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::String => "string",
			Self::Number => "number",
			Self::Boolean => "boolean",
			Self::Object => "object",
			Self::Array => "array",
		}
	}
}

impl fmt::Display for ValueType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Required-presence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Presence {
	/// When false, null, blank strings, and empty arrays or objects count as missing.
	pub allow_empty: bool,
}

/// Validation rules for one capability.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "RawConstraint")]
pub struct Constraint {
	pub presence: Option<Presence>,
	pub value_type: Option<ValueType>,
	pub inclusion: Option<Vec<Value>>,
	pub deprecated: bool,
}

impl Constraint {
	pub fn new() -> Self {
		Self::default()
	}

	/// Must be present and non-empty.
	pub fn required(mut self) -> Self {
		self.presence = Some(Presence { allow_empty: false });
		self
	}

	/// Must be present; empty values are accepted.
	pub fn required_allow_empty(mut self) -> Self {
		self.presence = Some(Presence { allow_empty: true });
		self
	}

	pub fn of_type(mut self, value_type: ValueType) -> Self {
		self.value_type = Some(value_type);
		self
	}

	pub fn one_of<I, V>(mut self, values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		self.inclusion = Some(values.into_iter().map(Into::into).collect());
		self
	}

	pub fn deprecated(mut self) -> Self {
		self.deprecated = true;
		self
	}

	/// Appends every violation of this rule by `value` to `reasons`.
	fn check(&self, value: Option<&Value>, reasons: &mut Vec<String>) {
		if let Some(presence) = self.presence {
			let missing = match value {
				None => true,
				Some(v) => !presence.allow_empty && is_empty(v),
			};
			if missing {
				reasons.push("can't be blank".to_string());
				return;
			}
		}

		let Some(value) = value.filter(|v| !v.is_null()) else {
			return;
		};

		if let Some(value_type) = self.value_type.filter(|ty| !ty.matches(value)) {
			reasons.push(format!("must be of type {value_type}"));
		}

		if let Some(allowed) = self.inclusion.as_ref().filter(|allowed| !allowed.contains(value)) {
			let list = allowed.iter().map(display_value).collect::<Vec<_>>().join(", ");
			reasons.push(format!("{} is not included in the list ({list})", display_value(value)));
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPresence {
	Flag(bool),
	Options {
		#[serde(rename = "allowEmpty", default)]
		allow_empty: bool,
	},
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConstraint {
	presence: Option<RawPresence>,
	#[serde(default)]
	is_string: bool,
	#[serde(default)]
	is_number: bool,
	#[serde(default)]
	is_boolean: bool,
	#[serde(default)]
	is_object: bool,
	#[serde(default)]
	is_array: bool,
	inclusion: Option<Vec<Value>>,
	#[serde(default)]
	deprecated: bool,
}

impl TryFrom<RawConstraint> for Constraint {
	type Error = String;

	fn try_from(raw: RawConstraint) -> std::result::Result<Self, Self::Error> {
		let flagged: Vec<ValueType> = [
			(raw.is_string, ValueType::String),
			(raw.is_number, ValueType::Number),
			(raw.is_boolean, ValueType::Boolean),
			(raw.is_object, ValueType::Object),
			(raw.is_array, ValueType::Array),
		]
		.into_iter()
		.filter_map(|(set, ty)| set.then_some(ty))
		.collect();
		if flagged.len() > 1 {
			return Err(format!("conflicting type assertions: {flagged:?}"));
		}

		// `presence: true` means present and non-empty.
		let presence = match raw.presence {
			None | Some(RawPresence::Flag(false)) => None,
			Some(RawPresence::Flag(true)) => Some(Presence { allow_empty: false }),
			Some(RawPresence::Options { allow_empty }) => Some(Presence { allow_empty }),
		};

		Ok(Constraint {
			presence,
			value_type: flagged.first().copied(),
			inclusion: raw.inclusion,
			deprecated: raw.deprecated,
		})
	}
}

/// Ordered capability schema.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(transparent)]
pub struct Constraints(IndexMap<String, Constraint>);

impl Constraints {
	pub fn new() -> Self {
		Self::default()
	}

	/// Schema shared by every driver.
	pub fn base() -> Self {
		let entries = [
			("platformName", Constraint::new().required().of_type(ValueType::String)),
			("deviceName", Constraint::new().of_type(ValueType::String)),
			("platformVersion", Constraint::new()),
			("newCommandTimeout", Constraint::new().of_type(ValueType::Number)),
			("automationName", Constraint::new().of_type(ValueType::String)),
			("autoLaunch", Constraint::new().of_type(ValueType::Boolean)),
			("udid", Constraint::new().of_type(ValueType::String)),
			("orientation", Constraint::new().one_of(["LANDSCAPE", "PORTRAIT"])),
			("autoWebview", Constraint::new().of_type(ValueType::Boolean)),
			("noReset", Constraint::new().of_type(ValueType::Boolean)),
			("fullReset", Constraint::new().of_type(ValueType::Boolean)),
			("language", Constraint::new().of_type(ValueType::String)),
			("locale", Constraint::new().of_type(ValueType::String)),
			("eventTimings", Constraint::new().of_type(ValueType::Boolean)),
			("printPageSourceOnFindFailure", Constraint::new().of_type(ValueType::Boolean)),
		];
		Self(entries.into_iter().map(|(name, rule)| (name.to_string(), rule)).collect())
	}

	pub fn get(&self, name: &str) -> Option<&Constraint> {
		self.0.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(name)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Adds a single rule. Same contract as [`Self::merge`].
	pub fn insert(&mut self, name: impl Into<String>, rule: Constraint) -> Result<()> {
		let name = name.into();
		match self.0.get(&name) {
			Some(existing) if *existing != rule => Err(Error::Misuse(format!(
				"Capability constraint '{name}' is already defined and cannot be redefined"
			))),
			Some(_) => Ok(()),
			None => {
				self.0.insert(name, rule);
				Ok(())
			}
		}
	}

	/// Adds every rule of `other`.
	///
	/// Re-declaring an identical rule is accepted. Changing an existing rule
	/// is a [`Error::Misuse`] and leaves `self` untouched.
	pub fn merge(&mut self, other: Constraints) -> Result<()> {
		if let Some((name, _)) = other
			.0
			.iter()
			.find(|(name, rule)| self.0.get(*name).is_some_and(|existing| existing != *rule))
		{
			return Err(Error::Misuse(format!(
				"Capability constraint '{name}' is already defined and cannot be redefined"
			)));
		}
		for (name, rule) in other.0 {
			self.0.entry(name).or_insert(rule);
		}
		Ok(())
	}

	/// Validates `caps`, failing with [`Error::SessionNotCreated`] that lists every violation.
	///
	/// Unknown and deprecated capabilities are not errors; they are logged and
	/// returned in the report.
	pub fn validate(&self, caps: &Caps) -> Result<ValidationReport> {
		let mut violations = Vec::new();
		for (name, rule) in &self.0 {
			let mut reasons = Vec::new();
			rule.check(caps.get(name), &mut reasons);
			violations.extend(reasons.into_iter().map(|reason| format!("'{name}' {reason}")));
		}
		if !violations.is_empty() {
			return Err(Error::SessionNotCreated(format!(
				"The desiredCapabilities object was not valid for the following reason(s): {}",
				violations.join("; ")
			)));
		}

		let report = ValidationReport {
			unrecognized: caps.keys().filter(|k| !self.contains(k)).cloned().collect(),
			deprecated: caps
				.keys()
				.filter(|k| self.get(k).is_some_and(|rule| rule.deprecated))
				.cloned()
				.collect(),
		};
		report.log();
		Ok(report)
	}
}

impl FromIterator<(String, Constraint)> for Constraints {
	fn from_iter<T: IntoIterator<Item = (String, Constraint)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// Non-fatal findings from [`Constraints::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
	pub unrecognized: Vec<String>,
	pub deprecated: Vec<String>,
}

impl ValidationReport {
	fn log(&self) {
		if !self.unrecognized.is_empty() {
			warn!(
				target = "wd",
				capabilities = ?self.unrecognized,
				"The following capabilities were provided, but are not recognized"
			);
		}
		for name in &self.deprecated {
			warn!(target = "wd", capability = %name, "Capability is deprecated");
		}
	}
}

/// Null, blank strings, and empty arrays or objects.
pub fn is_empty(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::String(s) => s.trim().is_empty(),
		Value::Array(a) => a.is_empty(),
		Value::Object(o) => o.is_empty(),
		Value::Bool(_) | Value::Number(_) => false,
	}
}

fn display_value(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn caps(value: Value) -> Caps {
		value.as_object().cloned().unwrap_or_default()
	}

	#[test]
	fn blank_platform_name_is_rejected() {
		let err = Constraints::base().validate(&caps(json!({"platformName": ""}))).unwrap_err();
		let Error::SessionNotCreated(msg) = err else {
			panic!("unexpected error: {err:?}");
		};
		assert!(msg.contains("'platformName' can't be blank"), "{msg}");
	}

	#[test]
	fn unknown_caps_are_reported_not_rejected() {
		let report = Constraints::base()
			.validate(&caps(json!({"platformName": "Android", "extraCap": 1})))
			.unwrap();
		assert_eq!(report.unrecognized, vec!["extraCap".to_string()]);
	}

	#[test]
	fn violations_are_aggregated() {
		let err = Constraints::base()
			.validate(&caps(json!({"noReset": "yes", "orientation": "SIDEWAYS"})))
			.unwrap_err();
		let msg = err.to_string();
		assert!(msg.contains("'platformName' can't be blank"));
		assert!(msg.contains("'noReset' must be of type boolean"));
		assert!(msg.contains("'orientation' SIDEWAYS is not included in the list"));
	}

	#[test]
	fn optional_null_skips_type_check() {
		Constraints::base()
			.validate(&caps(json!({"platformName": "iOS", "udid": null})))
			.unwrap();
	}

	#[test]
	fn allow_empty_accepts_blank() {
		let schema: Constraints = [("app".to_string(), Constraint::new().required_allow_empty())]
			.into_iter()
			.collect();
		schema.validate(&caps(json!({"app": ""}))).unwrap();
		assert!(schema.validate(&caps(json!({}))).is_err());
	}

	#[test]
	fn deserializes_json_shape() {
		let schema: Constraints = serde_json::from_value(json!({
			"app": {"presence": true, "isString": true},
			"bundleId": {"presence": {"allowEmpty": true}},
			"legacy": {"deprecated": true, "isBoolean": true},
			"mode": {"inclusion": ["fast", "slow"]}
		}))
		.unwrap();

		assert_eq!(schema.get("app"), Some(&Constraint::new().required().of_type(ValueType::String)));
		assert_eq!(schema.get("bundleId").unwrap().presence, Some(Presence { allow_empty: true }));
		assert!(schema.get("legacy").unwrap().deprecated);
		assert_eq!(schema.names().collect::<Vec<_>>(), ["app", "bundleId", "legacy", "mode"]);
	}

	#[test]
	fn rejects_conflicting_type_flags() {
		let parsed: std::result::Result<Constraint, _> =
			serde_json::from_value(json!({"isString": true, "isNumber": true}));
		assert!(parsed.is_err());
	}

	#[test]
	fn merge_is_additive() {
		let mut schema = Constraints::base();
		let before = schema.len();
		let extra: Constraints = serde_json::from_value(json!({"app": {"presence": true}})).unwrap();
		schema.merge(extra).unwrap();
		assert_eq!(schema.len(), before + 1);
		assert!(schema.get("app").unwrap().presence.is_some());
	}

	#[test]
	fn merge_cannot_redefine() {
		let mut schema = Constraints::base();
		let narrowed: Constraints =
			serde_json::from_value(json!({"platformName": {"inclusion": ["iOS"]}})).unwrap();
		let err = schema.merge(narrowed).unwrap_err();
		assert!(matches!(err, Error::Misuse(_)));
		assert_eq!(schema, Constraints::base());
	}

	#[test]
	fn deprecated_caps_are_reported() {
		let mut schema = Constraints::base();
		schema.insert("oldCap", Constraint::new().deprecated()).unwrap();
		let report = schema
			.validate(&caps(json!({"platformName": "Android", "oldCap": 1})))
			.unwrap();
		assert_eq!(report.deprecated, vec!["oldCap".to_string()]);
		assert!(report.unrecognized.is_empty());
	}

	#[test]
	fn emptiness() {
		assert!(is_empty(&json!("  ")));
		assert!(is_empty(&json!([])));
		assert!(is_empty(&json!({})));
		assert!(!is_empty(&json!(0)));
		assert!(!is_empty(&json!(false)));
	}
}
