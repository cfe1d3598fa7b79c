use clap::Parser;
use wd_cli::{cli::Cli, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = wd_cli::dispatch(cli).await {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}
