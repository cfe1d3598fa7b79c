//! Driver options from an optional config file plus command-line overrides.

use std::path::Path;

use tracing::debug;
use wd::DriverOptions;

use crate::cli::OptionOverrides;
use crate::error::{Result, read_json};

/// Loads `path` (if any) and applies `overrides` on top.
///
/// Missing keys in the file keep their defaults. List overrides extend the
/// file's lists rather than replacing them.
pub fn load_options(path: Option<&Path>, overrides: &OptionOverrides) -> Result<DriverOptions> {
	let mut opts = match path {
		Some(path) => {
			debug!(path = %path.display(), "Loading driver options");
			read_json(path)?
		}
		None => DriverOptions::default(),
	};
	apply_overrides(&mut opts, overrides);
	Ok(opts)
}

fn apply_overrides(opts: &mut DriverOptions, overrides: &OptionOverrides) {
	if let Some(base_path) = &overrides.base_path {
		opts.base_path = base_path.clone();
	}
	if overrides.relaxed_security {
		opts.relaxed_security = true;
	}
	opts.allow_insecure.extend(overrides.allow_insecure.iter().cloned());
	opts.deny_insecure.extend(overrides.deny_insecure.iter().cloned());
	if let Some(tmp_dir) = &overrides.tmp_dir {
		opts.tmp_dir = tmp_dir.clone();
	}
	if let Some(ms) = overrides.idle_timeout_ms {
		opts.idle_timeout_ms = ms;
	}
}
