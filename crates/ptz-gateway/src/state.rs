use crate::config::CameraRegistry;
use crate::onvif::DeviceConnector;
use std::sync::Arc;

/// Shared handler state: the immutable registry plus the connector used to
/// open a fresh device session per request.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CameraRegistry>,
    pub connector: Arc<dyn DeviceConnector>,
}

impl AppState {
    pub fn new(registry: Arc<CameraRegistry>, connector: Arc<dyn DeviceConnector>) -> Self {
        Self {
            registry,
            connector,
        }
    }
}
