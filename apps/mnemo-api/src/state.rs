use std::sync::Arc;

use mnemo_config::Config;
use mnemo_service::Service;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<Service>,
}
impl AppState {
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let service = Service::build(config)
			.await
			.map_err(|err| color_eyre::eyre::eyre!("failed to build service: {err}"))?;

		Ok(Self { service: Arc::new(service) })
	}
}
