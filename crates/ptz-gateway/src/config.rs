use crate::error::PtzError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Key-to-prefix mapping used when `PTZ_CAMERAS` is not set. Two friendly
/// names alias each physical camera.
pub const DEFAULT_CAMERA_MAP: &str = "cam1=CAM1,cam2=CAM2,ptz=CAM1,fixed=CAM2";

/// Connection settings for one physical camera, read once at startup from
/// `{PREFIX}_HOST`, `{PREFIX}_PORT`, `{PREFIX}_USER`, `{PREFIX}_PASS` and
/// `{PREFIX}_PROFILE_TOKEN`. Immutable afterwards.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub prefix: String,
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub profile_token: Option<String>,
}

impl CameraConfig {
    pub fn from_env(prefix: &str) -> Self {
        let var = |suffix: &str| {
            std::env::var(format!("{prefix}_{suffix}"))
                .ok()
                .filter(|v| !v.is_empty())
        };
        Self {
            prefix: prefix.to_string(),
            host: var("HOST"),
            port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(80),
            username: var("USER"),
            password: var("PASS"),
            profile_token: var("PROFILE_TOKEN"),
        }
    }

    /// Host, port and credentials, or `IncompleteConfig` when any of
    /// host/user/pass is missing. Checked before any network attempt.
    pub fn endpoint(&self) -> Result<(&str, u16, &str, &str), PtzError> {
        match (
            self.host.as_deref(),
            self.username.as_deref(),
            self.password.as_deref(),
        ) {
            (Some(host), Some(user), Some(pass)) => Ok((host, self.port, user, pass)),
            _ => Err(PtzError::IncompleteConfig(self.prefix.clone())),
        }
    }

    pub fn redacted(&self) -> RedactedCamera {
        RedactedCamera {
            host: self.host.clone(),
            port: self.port,
            profile_token: self.profile_token.clone(),
        }
    }
}

/// What `/config` exposes. Credentials are never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct RedactedCamera {
    pub host: Option<String>,
    pub port: u16,
    pub profile_token: Option<String>,
}

/// Named camera configurations; resolves a logical key to one config.
/// Keys sharing a prefix share the same `Arc<CameraConfig>`.
pub struct CameraRegistry {
    cameras: HashMap<String, Arc<CameraConfig>>,
}

impl CameraRegistry {
    pub fn new(cameras: HashMap<String, Arc<CameraConfig>>) -> Self {
        Self { cameras }
    }

    /// Build the registry from `PTZ_CAMERAS` ("key=PREFIX,key=PREFIX,...")
    /// and the per-prefix environment variables.
    pub fn from_env() -> Self {
        let map = std::env::var("PTZ_CAMERAS").unwrap_or_else(|_| DEFAULT_CAMERA_MAP.to_string());
        Self::parse(&map, CameraConfig::from_env)
    }

    fn parse(map: &str, load: impl Fn(&str) -> CameraConfig) -> Self {
        let mut by_prefix: HashMap<String, Arc<CameraConfig>> = HashMap::new();
        let mut cameras = HashMap::new();
        for entry in map.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let Some((key, prefix)) = entry.split_once('=') else {
                warn!(entry = %entry, "ignoring malformed camera mapping entry");
                continue;
            };
            let config = by_prefix
                .entry(prefix.trim().to_string())
                .or_insert_with(|| Arc::new(load(prefix.trim())))
                .clone();
            cameras.insert(key.trim().to_string(), config);
        }
        Self { cameras }
    }

    pub fn resolve(&self, key: &str) -> Result<Arc<CameraConfig>, PtzError> {
        self.cameras
            .get(key)
            .cloned()
            .ok_or_else(|| PtzError::UnknownCamera(key.to_string()))
    }

    /// Registry contents with secrets redacted, keyed by registry key.
    pub fn redacted(&self) -> HashMap<String, RedactedCamera> {
        self.cameras
            .iter()
            .map(|(key, config)| (key.clone(), config.redacted()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}
