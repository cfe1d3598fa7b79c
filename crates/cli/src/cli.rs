use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "wd")]
#[command(about = "WebDriver session engine host - drive a session over NDJSON")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON file with driver options (camelCase keys)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(flatten)]
	pub overrides: OptionOverrides,

	#[command(subcommand)]
	pub command: Commands,
}

/// Command-line overrides applied on top of the config file.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
	/// Path prefix stripped before proxy-avoidance matching
	#[arg(long, global = true, value_name = "PATH")]
	pub base_path: Option<String>,

	/// Enable every insecure feature not explicitly denied
	#[arg(long, global = true)]
	pub relaxed_security: bool,

	/// Insecure features to enable (comma-separated or repeated)
	#[arg(long, global = true, value_name = "FEATURE", value_delimiter = ',')]
	pub allow_insecure: Vec<String>,

	/// Insecure features to disable, overriding any allowance
	#[arg(long, global = true, value_name = "FEATURE", value_delimiter = ',')]
	pub deny_insecure: Vec<String>,

	/// Working directory for driver artifacts
	#[arg(long, global = true, value_name = "DIR")]
	pub tmp_dir: Option<PathBuf>,

	/// Idle timeout in milliseconds (0 disables)
	#[arg(long, global = true, value_name = "MS")]
	pub idle_timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Read NDJSON commands from stdin and stream responses to stdout
	Run {
		/// Fixture describing the page source, elements, settings and logs
		#[arg(long, value_name = "FILE")]
		fixture: Option<PathBuf>,
	},

	/// Validate a capability object against the base schema
	Caps {
		/// JSON file holding the capability object
		file: PathBuf,
	},
}
