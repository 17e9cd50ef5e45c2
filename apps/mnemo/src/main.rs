mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let cli = Cli::parse();
	let config = mnemo_config::load(&cli.config)?;

	init_tracing(&config);

	match cli.command {
		Command::Serve => {
			mnemo_api::run(mnemo_api::Args { config: cli.config, skip_tracing: true }).await
		},
		Command::Worker => {
			mnemo_worker::run(mnemo_worker::Args { config: cli.config, skip_tracing: true }).await
		},
		command => commands::dispatch(config, command).await,
	}
}

fn init_tracing(config: &mnemo_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

	tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
