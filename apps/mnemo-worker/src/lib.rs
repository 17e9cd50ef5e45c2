use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use mnemo_queue::WorkerRuntime;
use mnemo_service::{JobStatusSink, Service};

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
		let filter = EnvFilter::try_new(&config.service.log_level)
			.unwrap_or_else(|_| EnvFilter::new("info"));

		tracing_subscriber::fmt().with_env_filter(filter).init();
	}

	let concurrency = config.worker.concurrency;
	let queues = config.worker.queues.clone();
	let service = Arc::new(
		Service::build(config)
			.await
			.map_err(|err| color_eyre::eyre::eyre!("failed to build service: {err}"))?,
	);
	let mut runtime = WorkerRuntime::new(service.db.pool.clone(), concurrency, &queues)?
		.with_event_sink(Arc::new(JobStatusSink::new(service.db.clone())));

	mnemo_service::register_handlers(&mut runtime, service);

	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::info!("Shutdown signal received; draining in-flight tasks.");

			let _ = shutdown_tx.send(true);
		}
	});

	runtime.run(shutdown_rx).await?;

	Ok(())
}
