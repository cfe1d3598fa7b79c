//! Opt-in policy for potentially insecure driver features.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{Error, Result};

/// Resolves whether a named insecure feature may be used.
///
/// Precedence: deny list, then allow list, then relaxed security. Only
/// features the driver declared can be queried.
#[derive(Debug, Clone, Default)]
pub struct SecurityPolicy {
	declared: BTreeSet<String>,
	allow: BTreeSet<String>,
	deny: BTreeSet<String>,
	relaxed: bool,
}

impl SecurityPolicy {
	pub fn new<I, S>(declared: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			declared: declared.into_iter().map(Into::into).collect(),
			..Self::default()
		}
	}

	pub fn relaxed(mut self, relaxed: bool) -> Self {
		self.relaxed = relaxed;
		self
	}

	pub fn allow<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.allow.extend(names.into_iter().map(Into::into));
		self
	}

	pub fn deny<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.deny.extend(names.into_iter().map(Into::into));
		self
	}

	pub fn declare(&mut self, name: impl Into<String>) {
		self.declared.insert(name.into());
	}

	pub fn declared(&self) -> impl Iterator<Item = &str> {
		self.declared.iter().map(String::as_str)
	}

	pub fn is_feature_enabled(&self, name: &str) -> Result<bool> {
		if !self.declared.contains(name) {
			return Err(Error::Misuse(format!("Unknown insecure feature '{name}'")));
		}
		let enabled = if self.deny.contains(name) {
			false
		} else {
			self.allow.contains(name) || self.relaxed
		};
		debug!(target = "wd", feature = name, enabled, "Checked insecure feature");
		Ok(enabled)
	}

	pub fn ensure_feature_enabled(&self, name: &str) -> Result<()> {
		if self.is_feature_enabled(name)? {
			Ok(())
		} else {
			Err(Error::FeatureDisabled(name.to_string()))
		}
	}
}
