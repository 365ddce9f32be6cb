use crate::config::LocatorConfig;
use crate::location::Geocoder;
use std::sync::Arc;

pub struct AppState {
    pub config: LocatorConfig,
    pub geocoder: Arc<dyn Geocoder>,
}
