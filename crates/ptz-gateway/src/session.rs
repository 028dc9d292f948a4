use crate::config::CameraConfig;
use crate::error::PtzError;
use crate::onvif::{DeviceClient, DeviceConnector};
use std::sync::Arc;
use tracing::debug;

/// One resolved connection context: a reachable device plus the media
/// profile its commands target. Opened per request and dropped with it;
/// no pooling, no retries.
pub struct DeviceSession {
    pub client: Arc<dyn DeviceClient>,
    pub profile_token: String,
}

impl DeviceSession {
    /// Validate the config, connect, enumerate profiles and pick the
    /// profile token: the configured one if set, else the first the device
    /// reports. Config validation happens before any network attempt.
    pub async fn open(
        connector: &dyn DeviceConnector,
        config: &CameraConfig,
    ) -> Result<Self, PtzError> {
        let (host, port, username, password) = config.endpoint()?;
        let client = connector.connect(host, port, username, password).await?;

        let profiles = client.get_profiles().await?;
        let profile_token = match &config.profile_token {
            Some(token) => token.clone(),
            None => profiles
                .into_iter()
                .next()
                .map(|p| p.token)
                .ok_or_else(|| {
                    PtzError::Device(format!("no media profiles reported by {host}"))
                })?,
        };

        debug!(host, profile_token = %profile_token, "device session opened");
        Ok(Self {
            client,
            profile_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onvif::{MediaProfile, MockConnector, MockDeviceClient};

    fn config(profile_token: Option<&str>) -> CameraConfig {
        CameraConfig {
            prefix: "CAM1".into(),
            host: Some("10.0.0.5".into()),
            port: 80,
            username: Some("admin".into()),
            password: Some("secret".into()),
            profile_token: profile_token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn first_profile_wins_when_none_configured() {
        let client = Arc::new(MockDeviceClient::new().with_profiles(vec![
            MediaProfile {
                token: "MainStream".into(),
            },
            MediaProfile {
                token: "SubStream".into(),
            },
        ]));
        let connector = MockConnector::new(client);

        let session = DeviceSession::open(&connector, &config(None)).await.unwrap();
        assert_eq!(session.profile_token, "MainStream");
    }

    #[tokio::test]
    async fn configured_token_overrides_enumeration() {
        let client = Arc::new(MockDeviceClient::new().with_profiles(vec![MediaProfile {
            token: "MainStream".into(),
        }]));
        let connector = MockConnector::new(client);

        let session = DeviceSession::open(&connector, &config(Some("Fixed_1")))
            .await
            .unwrap();
        assert_eq!(session.profile_token, "Fixed_1");
    }

    #[tokio::test]
    async fn empty_profile_list_is_a_device_fault() {
        let client = Arc::new(MockDeviceClient::new().with_profiles(Vec::new()));
        let connector = MockConnector::new(client);

        match DeviceSession::open(&connector, &config(None)).await {
            Err(PtzError::Device(message)) => assert!(message.contains("no media profiles")),
            other => panic!("expected Device fault, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn missing_password_fails_before_any_connect() {
        let connector = MockConnector::new(Arc::new(MockDeviceClient::new()));
        let mut incomplete = config(None);
        incomplete.password = None;

        match DeviceSession::open(&connector, &incomplete).await {
            Err(PtzError::IncompleteConfig(prefix)) => assert_eq!(prefix, "CAM1"),
            other => panic!("expected IncompleteConfig, got {:?}", other.map(|_| ())),
        }
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn transport_failures_surface_as_unreachable() {
        let connector = MockConnector::failing("timed out");
        match DeviceSession::open(&connector, &config(None)).await {
            Err(PtzError::DeviceUnreachable { host, .. }) => assert_eq!(host, "10.0.0.5"),
            other => panic!("expected DeviceUnreachable, got {:?}", other.map(|_| ())),
        }
    }
}
