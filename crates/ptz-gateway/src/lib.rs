pub mod config;
pub mod error;
pub mod motion;
pub mod onvif;
pub mod presets;
pub mod routes;
pub mod session;
pub mod state;

pub use config::{CameraConfig, CameraRegistry};
pub use error::PtzError;
pub use motion::{MoveCommand, MoveDirection};
pub use onvif::{
    DeviceClient, DeviceConnector, MediaProfile, MockConnector, MockDeviceClient, OnvifConnector,
    Preset, PtzRequest, PtzVelocity,
};
pub use presets::PresetSelector;
pub use session::DeviceSession;
pub use state::AppState;
