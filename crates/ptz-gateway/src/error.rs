use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy for the gateway. Device-reported faults keep the
/// device's own message so operators can diagnose firmware quirks.
#[derive(Debug, Error)]
pub enum PtzError {
    #[error("unknown camera '{0}'")]
    UnknownCamera(String),

    /// Missing host/user/pass in the registry entry. A deployment fault,
    /// not something the caller can correct.
    #[error("incomplete configuration (host/user/pass required) for camera prefix '{0}'")]
    IncompleteConfig(String),

    #[error("device {host} unreachable: {reason}")]
    DeviceUnreachable { host: String, reason: String },

    #[error("preset not found")]
    PresetNotFound,

    #[error("device fault: {0}")]
    Device(String),
}

impl PtzError {
    pub fn status(&self) -> StatusCode {
        match self {
            PtzError::UnknownCamera(_) | PtzError::PresetNotFound => StatusCode::NOT_FOUND,
            PtzError::IncompleteConfig(_)
            | PtzError::DeviceUnreachable { .. }
            | PtzError::Device(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PtzError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
