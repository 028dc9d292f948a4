use crate::error::PtzError;
use crate::onvif::{Preset, PtzRequest};
use crate::session::DeviceSession;
use serde::Deserialize;

/// Preset lookup parameters. A token match takes precedence over a name
/// match when both are supplied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetSelector {
    pub token: Option<String>,
    pub name: Option<String>,
}

/// Enumerate the device's stored presets, resolve the selector against
/// them and recall the match. Presets are read fresh per request; the
/// device-side set may change between calls.
///
/// Returns the matched preset so the caller can confirm what was actually
/// recalled (the device may not supply a name).
pub async fn goto_preset(
    session: &DeviceSession,
    selector: &PresetSelector,
) -> Result<Preset, PtzError> {
    let presets = session.client.get_presets(&session.profile_token).await?;
    let matched = resolve(&presets, selector)
        .ok_or(PtzError::PresetNotFound)?
        .clone();

    session
        .client
        .send(&PtzRequest::GotoPreset {
            profile_token: session.profile_token.clone(),
            preset_token: matched.token.clone(),
        })
        .await?;

    Ok(matched)
}

/// Exact token equality first, else exact name equality (case-sensitive,
/// first match wins). An empty selector matches nothing.
fn resolve<'a>(presets: &'a [Preset], selector: &PresetSelector) -> Option<&'a Preset> {
    if let Some(token) = &selector.token {
        return presets.iter().find(|p| &p.token == token);
    }
    if let Some(name) = &selector.name {
        return presets.iter().find(|p| p.name.as_deref() == Some(name.as_str()));
    }
    None
}
