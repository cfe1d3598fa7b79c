//! Host for the `wd` session engine: configuration, logging and the NDJSON
//! batch loop around a fixture-backed driver.

pub mod caps;
pub mod cli;
pub mod config;
pub mod error;
pub mod fixture;
pub mod logging;
pub mod run;

use anyhow::Context;
use tokio::io::BufReader;
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::fixture::Fixture;

/// Runs the parsed command line to completion.
pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
	let opts = config::load_options(cli.config.as_deref(), &cli.overrides).context("loading driver options")?;

	match cli.command {
		Commands::Run { fixture } => {
			let fixture = match fixture {
				Some(path) => error::read_json::<Fixture>(&path).context("loading fixture")?,
				None => Fixture::default(),
			};
			let driver = fixture::build_driver(&fixture, opts)?;
			info!(commands = driver.commands().len(), "Driver ready, reading commands from stdin");

			let stdin = BufReader::new(tokio::io::stdin());
			let mut stdout = std::io::stdout();
			run::run_batch(&driver, stdin, &mut stdout).await?;
		}
		Commands::Caps { file } => {
			let summary = caps::check_file(&file)?;
			println!("{}", serde_json::to_string_pretty(&summary)?);
		}
	}
	Ok(())
}
