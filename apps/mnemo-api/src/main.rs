use clap::Parser;

use mnemo_api::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	mnemo_api::run(args).await
}
