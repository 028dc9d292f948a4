//! ONVIF device-client layer: one typed request per PTZ command kind, the
//! SOAP 1.2 codec that carries them, and profile/preset enumeration.

use crate::error::PtzError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rand::RngCore;
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

const NS_SOAP: &str = "http://www.w3.org/2003/05/soap-envelope";
const NS_MEDIA: &str = "http://www.onvif.org/ver10/media/wsdl";
const NS_PTZ: &str = "http://www.onvif.org/ver20/ptz/wsdl";
const NS_SCHEMA: &str = "http://www.onvif.org/ver10/schema";
const NS_WSSE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const NS_WSU: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const WSSE_PASSWORD_DIGEST: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const WSSE_NONCE_ENCODING: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// Velocity triple for a continuous move. Commands built by the motion
/// translator drive exactly one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PtzVelocity {
    pub pan: f32,
    pub tilt: f32,
    pub zoom: f32,
}

/// Media profile as enumerated by GetProfiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaProfile {
    pub token: String,
}

/// Stored camera position. Enumerated fresh per request; the device-side
/// set may change between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub token: String,
    pub name: Option<String>,
}

/// One request variant per PTZ command kind, each carrying exactly the
/// fields its wire form needs.
#[derive(Debug, Clone, PartialEq)]
pub enum PtzRequest {
    ContinuousMove {
        profile_token: String,
        velocity: PtzVelocity,
        /// Inline move-timeout hint. Firmware support is inconsistent, so
        /// callers requesting a finite move also issue an explicit Stop.
        timeout: Option<Duration>,
    },
    Stop {
        profile_token: String,
        pan_tilt: bool,
        zoom: bool,
    },
    GotoPreset {
        profile_token: String,
        preset_token: String,
    },
}

/// Control connection to one camera.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Enumerate media profiles, in device order.
    async fn get_profiles(&self) -> Result<Vec<MediaProfile>, PtzError>;

    /// Enumerate the presets stored for a profile.
    async fn get_presets(&self, profile_token: &str) -> Result<Vec<Preset>, PtzError>;

    /// Send one PTZ command.
    async fn send(&self, request: &PtzRequest) -> Result<(), PtzError>;
}

/// Opens device control connections. Split from [`DeviceClient`] so the
/// HTTP layer can be exercised against a recording mock.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<Arc<dyn DeviceClient>, PtzError>;
}

/// ONVIF client speaking SOAP 1.2 over HTTP to the device service endpoint.
pub struct OnvifClient {
    endpoint: String,
    host: String,
    username: String,
    password: String,
    http: reqwest::Client,
}

impl OnvifClient {
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, PtzError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PtzError::Device(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: format!("http://{host}:{port}/onvif/device_service"),
            host: host.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            http,
        })
    }

    async fn call(&self, body: &str) -> Result<String, PtzError> {
        let envelope = soap_envelope(&self.username, &self.password, body);
        debug!(endpoint = %self.endpoint, "sending ONVIF request");

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .basic_auth(&self.username, Some(&self.password))
            .body(envelope)
            .send()
            .await
            .map_err(|e| PtzError::DeviceUnreachable {
                host: self.host.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PtzError::DeviceUnreachable {
                host: self.host.clone(),
                reason: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(PtzError::Device(format!("ONVIF HTTP {status}: {text}")));
        }
        Ok(text)
    }
}

#[async_trait]
impl DeviceClient for OnvifClient {
    async fn get_profiles(&self) -> Result<Vec<MediaProfile>, PtzError> {
        let xml = self.call(&format!("<GetProfiles xmlns=\"{NS_MEDIA}\"/>")).await?;
        parse_profiles(&xml)
    }

    async fn get_presets(&self, profile_token: &str) -> Result<Vec<Preset>, PtzError> {
        let body = format!(
            "<GetPresets xmlns=\"{NS_PTZ}\"><ProfileToken>{}</ProfileToken></GetPresets>",
            xml_escape(profile_token)
        );
        let xml = self.call(&body).await?;
        parse_presets(&xml)
    }

    async fn send(&self, request: &PtzRequest) -> Result<(), PtzError> {
        self.call(&soap_body(request)).await.map(|_| ())
    }
}

/// Connector producing [`OnvifClient`]s with a shared request timeout.
pub struct OnvifConnector {
    timeout: Duration,
}

impl OnvifConnector {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl DeviceConnector for OnvifConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<Arc<dyn DeviceClient>, PtzError> {
        let client = OnvifClient::new(host, port, username, password, self.timeout)?;
        Ok(Arc::new(client))
    }
}

/// Render the operation element for one request.
pub fn soap_body(request: &PtzRequest) -> String {
    match request {
        PtzRequest::ContinuousMove {
            profile_token,
            velocity,
            timeout,
        } => {
            let timeout_xml = timeout
                .map(|t| format!("<Timeout>{}</Timeout>", xs_duration(t)))
                .unwrap_or_default();
            format!(
                "<ContinuousMove xmlns=\"{NS_PTZ}\">\
                    <ProfileToken>{token}</ProfileToken>\
                    <Velocity>\
                        <PanTilt xmlns=\"{NS_SCHEMA}\" x=\"{pan:.3}\" y=\"{tilt:.3}\"/>\
                        <Zoom xmlns=\"{NS_SCHEMA}\" x=\"{zoom:.3}\"/>\
                    </Velocity>\
                    {timeout_xml}\
                </ContinuousMove>",
                token = xml_escape(profile_token),
                pan = velocity.pan,
                tilt = velocity.tilt,
                zoom = velocity.zoom,
            )
        }
        PtzRequest::Stop {
            profile_token,
            pan_tilt,
            zoom,
        } => format!(
            "<Stop xmlns=\"{NS_PTZ}\">\
                <ProfileToken>{token}</ProfileToken>\
                <PanTilt>{pan_tilt}</PanTilt>\
                <Zoom>{zoom}</Zoom>\
            </Stop>",
            token = xml_escape(profile_token),
        ),
        PtzRequest::GotoPreset {
            profile_token,
            preset_token,
        } => format!(
            "<GotoPreset xmlns=\"{NS_PTZ}\">\
                <ProfileToken>{token}</ProfileToken>\
                <PresetToken>{preset}</PresetToken>\
            </GotoPreset>",
            token = xml_escape(profile_token),
            preset = xml_escape(preset_token),
        ),
    }
}

/// WS-Security UsernameToken header with PasswordDigest, as ONVIF devices
/// expect. The plaintext password never goes on the wire.
fn soap_envelope(username: &str, password: &str, body: &str) -> String {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    let nonce_b64 = BASE64.encode(nonce);
    let created = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

    let mut sha = Sha1::new();
    sha.update(nonce);
    sha.update(created.as_bytes());
    sha.update(password.as_bytes());
    let digest_b64 = BASE64.encode(sha.finalize());

    format!(
        "<s:Envelope xmlns:s=\"{NS_SOAP}\" xmlns:wsse=\"{NS_WSSE}\" xmlns:wsu=\"{NS_WSU}\">\
            <s:Header>\
                <wsse:Security s:mustUnderstand=\"1\">\
                    <wsse:UsernameToken>\
                        <wsse:Username>{user}</wsse:Username>\
                        <wsse:Password Type=\"{WSSE_PASSWORD_DIGEST}\">{digest}</wsse:Password>\
                        <wsse:Nonce EncodingType=\"{WSSE_NONCE_ENCODING}\">{nonce}</wsse:Nonce>\
                        <wsu:Created>{created}</wsu:Created>\
                    </wsse:UsernameToken>\
                </wsse:Security>\
            </s:Header>\
            <s:Body>{body}</s:Body>\
        </s:Envelope>",
        user = xml_escape(username),
        digest = digest_b64,
        nonce = nonce_b64,
    )
}

/// ONVIF timeouts are xs:duration values, e.g. `PT2.000S`.
fn xs_duration(timeout: Duration) -> String {
    format!("PT{:.3}S", timeout.as_secs_f64())
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Pull profile tokens out of a GetProfilesResponse. Matches by local-name
/// suffix so namespace prefixes don't matter.
pub fn parse_profiles(xml: &str) -> Result<Vec<MediaProfile>, PtzError> {
    let mut reader = Reader::from_str(xml);
    let mut profiles = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.ends_with("Profiles") || name.ends_with("Profile") {
                    if let Some(token) = attr_value(&e, b"token")? {
                        profiles.push(MediaProfile { token });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PtzError::Device(format!("GetProfiles parse error: {e}"))),
            _ => {}
        }
    }
    Ok(profiles)
}

/// Pull `{token, name?}` pairs out of a GetPresetsResponse.
pub fn parse_presets(xml: &str) -> Result<Vec<Preset>, PtzError> {
    let mut reader = Reader::from_str(xml);
    let mut presets = Vec::new();
    let mut current: Option<Preset> = None;
    let mut in_name = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.ends_with("Preset") {
                    current = attr_value(&e, b"token")?.map(|token| Preset { token, name: None });
                } else if current.is_some() && name.ends_with("Name") {
                    in_name = true;
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.ends_with("Preset") {
                    if let Some(token) = attr_value(&e, b"token")? {
                        presets.push(Preset { token, name: None });
                    }
                }
            }
            Ok(Event::Text(t)) if in_name => {
                if let Some(preset) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| PtzError::Device(format!("GetPresets parse error: {e}")))?
                        .trim()
                        .to_string();
                    if !text.is_empty() {
                        preset.name = Some(text);
                    }
                }
                in_name = false;
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.ends_with("Name") {
                    in_name = false;
                } else if name.ends_with("Preset") {
                    if let Some(preset) = current.take() {
                        presets.push(preset);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PtzError::Device(format!("GetPresets parse error: {e}"))),
            _ => {}
        }
    }
    Ok(presets)
}

fn attr_value(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, PtzError> {
    for attr in element.attributes().flatten() {
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| PtzError::Device(format!("attribute decode error: {e}")))?;
            if !value.is_empty() {
                return Ok(Some(value.to_string()));
            }
        }
    }
    Ok(None)
}

/// Recording mock for tests: serves canned profiles/presets and stores
/// every request it is asked to send.
pub struct MockDeviceClient {
    profiles: Vec<MediaProfile>,
    presets: Vec<Preset>,
    send_error: Option<String>,
    sent: Mutex<Vec<PtzRequest>>,
}

impl MockDeviceClient {
    pub fn new() -> Self {
        Self {
            profiles: vec![MediaProfile {
                token: "Profile_1".to_string(),
            }],
            presets: Vec::new(),
            send_error: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_profiles(mut self, profiles: Vec<MediaProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_presets(mut self, presets: Vec<Preset>) -> Self {
        self.presets = presets;
        self
    }

    pub fn with_send_error(mut self, message: &str) -> Self {
        self.send_error = Some(message.to_string());
        self
    }

    pub fn sent(&self) -> Vec<PtzRequest> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MockDeviceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceClient for MockDeviceClient {
    async fn get_profiles(&self) -> Result<Vec<MediaProfile>, PtzError> {
        Ok(self.profiles.clone())
    }

    async fn get_presets(&self, _profile_token: &str) -> Result<Vec<Preset>, PtzError> {
        Ok(self.presets.clone())
    }

    async fn send(&self, request: &PtzRequest) -> Result<(), PtzError> {
        if let Some(message) = &self.send_error {
            return Err(PtzError::Device(message.clone()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        Ok(())
    }
}

/// Connector handing out one shared [`MockDeviceClient`]; counts connection
/// attempts so tests can assert that config validation short-circuits
/// before any network work.
pub struct MockConnector {
    client: Arc<MockDeviceClient>,
    fail_reason: Option<String>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(client: Arc<MockDeviceClient>) -> Self {
        Self {
            client,
            fail_reason: None,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            client: Arc::new(MockDeviceClient::new()),
            fail_reason: Some(reason.to_string()),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceConnector for MockConnector {
    async fn connect(
        &self,
        host: &str,
        _port: u16,
        _username: &str,
        _password: &str,
    ) -> Result<Arc<dyn DeviceClient>, PtzError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.fail_reason {
            return Err(PtzError::DeviceUnreachable {
                host: host.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.client.clone())
    }
}
