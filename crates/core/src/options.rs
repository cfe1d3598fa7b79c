//! Driver construction options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::timeouts::DEFAULT_IDLE_TIMEOUT_MS;

/// Environment variable that overrides the default working directory.
pub const TMP_DIR_ENV: &str = "WD_TMP_DIR";

/// Options a driver is constructed with. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverOptions {
	/// Working directory for driver artifacts.
	pub tmp_dir: PathBuf,
	/// Prefix stripped from request paths before proxy-avoidance matching.
	pub base_path: String,
	pub relaxed_security: bool,
	pub allow_insecure: Vec<String>,
	pub deny_insecure: Vec<String>,
	pub print_page_source_on_find_failure: bool,
	pub validate_caps: bool,
	/// Vendor prefix stripped from W3C capability names.
	pub vendor_prefix: String,
	pub idle_timeout_ms: u64,
	pub implicit_wait_ms: u64,
}

impl Default for DriverOptions {
	fn default() -> Self {
		Self {
			tmp_dir: default_tmp_dir(),
			base_path: String::new(),
			relaxed_security: false,
			allow_insecure: Vec::new(),
			deny_insecure: Vec::new(),
			print_page_source_on_find_failure: false,
			validate_caps: true,
			vendor_prefix: "wd:".to_string(),
			idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
			implicit_wait_ms: 0,
		}
	}
}

fn default_tmp_dir() -> PathBuf {
	std::env::var_os(TMP_DIR_ENV)
		.map(PathBuf::from)
		.unwrap_or_else(std::env::temp_dir)
}
