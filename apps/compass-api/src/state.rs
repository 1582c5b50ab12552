use std::sync::Arc;

use compass_service::CompassService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<CompassService>,
}
impl AppState {
	/// Connects every store named in `config`.
	pub async fn new(config: compass_config::Config) -> color_eyre::Result<Self> {
		let service = CompassService::connect(config).await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: CompassService) -> Self {
		Self { service: Arc::new(service) }
	}
}
