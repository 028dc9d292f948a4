use crate::error::PtzError;
use crate::onvif::{PtzRequest, PtzVelocity};
use crate::session::DeviceSession;
use serde::Deserialize;
use std::time::Duration;

pub const SPEED_MIN: f32 = 0.05;
pub const SPEED_MAX: f32 = 1.0;

/// Symbolic move direction. `zin`/`zout` stay accepted for older client
/// integrations and resolve to the zoom variants during deserialization,
/// so nothing past the boundary ever sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
    Left,
    Right,
    #[serde(alias = "zin")]
    ZoomIn,
    #[serde(alias = "zout")]
    ZoomOut,
}

impl MoveDirection {
    /// Map a direction and speed onto the three ONVIF axes. Exactly one
    /// axis comes out non-zero; diagonal moves are never composed here.
    pub fn velocity(self, speed: f32) -> PtzVelocity {
        let mut v = PtzVelocity {
            pan: 0.0,
            tilt: 0.0,
            zoom: 0.0,
        };
        match self {
            MoveDirection::Up => v.tilt = speed,
            MoveDirection::Down => v.tilt = -speed,
            MoveDirection::Left => v.pan = -speed,
            MoveDirection::Right => v.pan = speed,
            MoveDirection::ZoomIn => v.zoom = speed,
            MoveDirection::ZoomOut => v.zoom = -speed,
        }
        v
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MoveCommand {
    pub direction: MoveDirection,
    pub speed: f32,
    /// 0 means move until a separate stop request arrives.
    pub duration_ms: u64,
}

/// Issue a continuous-velocity move and, for finite durations, the
/// follow-up stop.
///
/// Finite moves carry the inline Timeout hint, but firmware support for it
/// is inconsistent, so the explicit Stop goes out unconditionally right
/// after the move call returns.
pub async fn move_camera(session: &DeviceSession, command: &MoveCommand) -> Result<(), PtzError> {
    let timeout = (command.duration_ms > 0).then(|| Duration::from_millis(command.duration_ms));

    session
        .client
        .send(&PtzRequest::ContinuousMove {
            profile_token: session.profile_token.clone(),
            velocity: command.direction.velocity(command.speed),
            timeout,
        })
        .await?;

    if command.duration_ms > 0 {
        stop_camera(session).await?;
    }
    Ok(())
}

/// Stop pan/tilt and zoom together. Stopping a stationary camera is not an
/// error on the device side, so this never needs to check motion state.
pub async fn stop_camera(session: &DeviceSession) -> Result<(), PtzError> {
    session
        .client
        .send(&PtzRequest::Stop {
            profile_token: session.profile_token.clone(),
            pan_tilt: true,
            zoom: true,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onvif::MockDeviceClient;
    use std::sync::Arc;

    fn session(client: Arc<MockDeviceClient>) -> DeviceSession {
        DeviceSession {
            client,
            profile_token: "Profile_1".into(),
        }
    }

    #[test]
    fn velocity_table_drives_one_axis() {
        let cases = [
            (MoveDirection::Up, (0.0, 0.5, 0.0)),
            (MoveDirection::Down, (0.0, -0.5, 0.0)),
            (MoveDirection::Left, (-0.5, 0.0, 0.0)),
            (MoveDirection::Right, (0.5, 0.0, 0.0)),
            (MoveDirection::ZoomIn, (0.0, 0.0, 0.5)),
            (MoveDirection::ZoomOut, (0.0, 0.0, -0.5)),
        ];
        for (direction, (pan, tilt, zoom)) in cases {
            let v = direction.velocity(0.5);
            assert_eq!((v.pan, v.tilt, v.zoom), (pan, tilt, zoom), "{direction:?}");
            let non_zero = [v.pan, v.tilt, v.zoom]
                .iter()
                .filter(|a| **a != 0.0)
                .count();
            assert_eq!(non_zero, 1, "{direction:?} must drive exactly one axis");
        }
    }

    #[test]
    fn zoom_aliases_resolve_to_canonical_directions() {
        let zin: MoveDirection = serde_json::from_str("\"zin\"").unwrap();
        let zout: MoveDirection = serde_json::from_str("\"zout\"").unwrap();
        assert_eq!(zin, MoveDirection::ZoomIn);
        assert_eq!(zout, MoveDirection::ZoomOut);
        assert_eq!(zin.velocity(0.3), MoveDirection::ZoomIn.velocity(0.3));
        assert_eq!(zout.velocity(0.3), MoveDirection::ZoomOut.velocity(0.3));
    }

    #[tokio::test]
    async fn indefinite_move_issues_no_stop() {
        let client = Arc::new(MockDeviceClient::new());
        let session = session(client.clone());

        move_camera(
            &session,
            &MoveCommand {
                direction: MoveDirection::Up,
                speed: 0.5,
                duration_ms: 0,
            },
        )
        .await
        .unwrap();

        let sent = client.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            PtzRequest::ContinuousMove {
                velocity, timeout, ..
            } => {
                assert_eq!((velocity.pan, velocity.tilt, velocity.zoom), (0.0, 0.5, 0.0));
                assert!(timeout.is_none());
            }
            other => panic!("expected ContinuousMove, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn finite_move_is_chased_by_one_stop() {
        let client = Arc::new(MockDeviceClient::new());
        let session = session(client.clone());

        move_camera(
            &session,
            &MoveCommand {
                direction: MoveDirection::Left,
                speed: 0.2,
                duration_ms: 2000,
            },
        )
        .await
        .unwrap();

        let sent = client.sent();
        assert_eq!(sent.len(), 2);
        match &sent[0] {
            PtzRequest::ContinuousMove {
                velocity, timeout, ..
            } => {
                assert_eq!(
                    (velocity.pan, velocity.tilt, velocity.zoom),
                    (-0.2, 0.0, 0.0)
                );
                assert_eq!(*timeout, Some(Duration::from_millis(2000)));
            }
            other => panic!("expected ContinuousMove, got {other:?}"),
        }
        match &sent[1] {
            PtzRequest::Stop { pan_tilt, zoom, .. } => {
                assert!(pan_tilt);
                assert!(zoom);
            }
            other => panic!("expected Stop, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn explicit_stop_halts_both_axes() {
        let client = Arc::new(MockDeviceClient::new());
        let session = session(client.clone());

        stop_camera(&session).await.unwrap();

        assert_eq!(
            client.sent(),
            vec![PtzRequest::Stop {
                profile_token: "Profile_1".into(),
                pan_tilt: true,
                zoom: true,
            }]
        );
    }
}
