pub mod routes;
pub mod state;

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(
	version = mnemo_cli::VERSION,
	rename_all = "kebab",
	styles = mnemo_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE", default_value = "config.toml")]
	pub config: PathBuf,
	/// Skip tracing initialization when embedded in another binary.
	#[arg(skip)]
	pub skip_tracing: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = mnemo_config::load(&args.config)?;

	if !args.skip_tracing {
		init_tracing(&config);
	}

	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let state = AppState::new(config).await?;
	let app = routes::router(state);
	let listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	axum::serve(listener, app).await?;

	Ok(())
}

pub fn init_tracing(config: &mnemo_config::Config) {
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}
