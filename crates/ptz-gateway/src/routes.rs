use crate::error::PtzError;
use crate::motion::{self, MoveCommand, MoveDirection, SPEED_MAX, SPEED_MIN};
use crate::presets::{self, PresetSelector};
use crate::session::DeviceSession;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config", get(config))
        .route("/ptz/:cam/move", get(ptz_move))
        .route("/ptz/:cam/stop", get(ptz_stop))
        .route("/ptz/:cam/preset/goto", get(preset_goto))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Allowed origins from `CORS_ORIGINS` (comma list); empty means any.
fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = std::env::var("CORS_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();
    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

async fn config(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "cameras": state.registry.redacted() }))
}

fn default_speed() -> f32 {
    0.3
}

#[derive(Debug, Deserialize)]
struct MoveParams {
    dir: MoveDirection,
    #[serde(default = "default_speed")]
    speed: f32,
    /// Move duration in ms; 0 means indefinite (until /stop).
    #[serde(default)]
    duration: u64,
}

async fn ptz_move(
    State(state): State<AppState>,
    Path(cam): Path<String>,
    Query(params): Query<MoveParams>,
) -> Response {
    if !(SPEED_MIN..=SPEED_MAX).contains(&params.speed) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "detail": format!("speed must be within [{SPEED_MIN}, {SPEED_MAX}]")
            })),
        )
            .into_response();
    }

    let command = MoveCommand {
        direction: params.dir,
        speed: params.speed,
        duration_ms: params.duration,
    };

    match run_move(&state, &cam, &command).await {
        Ok(()) => {
            info!(
                cam = %cam,
                direction = ?command.direction,
                speed = command.speed,
                duration_ms = command.duration_ms,
                "PTZ move command sent"
            );
            Json(json!({"ok": true})).into_response()
        }
        Err(e) => {
            error!(cam = %cam, error = %e, "PTZ move failed");
            e.into_response()
        }
    }
}

async fn run_move(state: &AppState, cam: &str, command: &MoveCommand) -> Result<(), PtzError> {
    let config = state.registry.resolve(cam)?;
    let session = DeviceSession::open(state.connector.as_ref(), &config).await?;
    motion::move_camera(&session, command).await
}

async fn ptz_stop(State(state): State<AppState>, Path(cam): Path<String>) -> Response {
    match run_stop(&state, &cam).await {
        Ok(()) => {
            info!(cam = %cam, "PTZ stop command sent");
            Json(json!({"ok": true})).into_response()
        }
        Err(e) => {
            error!(cam = %cam, error = %e, "PTZ stop failed");
            e.into_response()
        }
    }
}

async fn run_stop(state: &AppState, cam: &str) -> Result<(), PtzError> {
    let config = state.registry.resolve(cam)?;
    let session = DeviceSession::open(state.connector.as_ref(), &config).await?;
    motion::stop_camera(&session).await
}

async fn preset_goto(
    State(state): State<AppState>,
    Path(cam): Path<String>,
    Query(selector): Query<PresetSelector>,
) -> Response {
    match run_goto(&state, &cam, &selector).await {
        Ok(preset) => {
            info!(cam = %cam, token = %preset.token, "PTZ preset recalled");
            Json(json!({
                "ok": true,
                "preset": preset.name,
                "token": preset.token,
            }))
            .into_response()
        }
        Err(e) => {
            error!(cam = %cam, error = %e, "PTZ preset recall failed");
            e.into_response()
        }
    }
}

async fn run_goto(
    state: &AppState,
    cam: &str,
    selector: &PresetSelector,
) -> Result<crate::onvif::Preset, PtzError> {
    let config = state.registry.resolve(cam)?;
    let session = DeviceSession::open(state.connector.as_ref(), &config).await?;
    presets::goto_preset(&session, selector).await
}
