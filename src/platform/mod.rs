//! Capability ports.
//!
//! Each panel receives one of these traits instead of reaching for a global
//! platform SDK, so a native bridge, the simulated device, or a test fake can
//! be injected interchangeably. Ports report underlying-call failures as
//! `anyhow` errors; user cancellation is a value, not an error.

pub mod simulated;
mod subscription;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use subscription::{Listener, ListenerHub, Subscription, SubscriptionSet};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

/// Platform family used to pick external targets (e.g. which maps app).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlatformFamily {
    Ios,
    #[default]
    Android,
    Web,
}

impl std::str::FromStr for PlatformFamily {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ios" => Ok(PlatformFamily::Ios),
            "android" => Ok(PlatformFamily::Android),
            "web" => Ok(PlatformFamily::Web),
            other => Err(anyhow::anyhow!("unknown platform '{other}'")),
        }
    }
}

/// Opaque reference to a captured image (a URI on every platform we target).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhotoRef(String);

impl PhotoRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn uri(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    #[default]
    Images,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    pub allows_editing: bool,
    /// Compression hint in `[0, 1]`.
    pub quality: f32,
    pub media: MediaKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureResponse {
    Captured(PhotoRef),
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum NotificationTrigger {
    TimeInterval { seconds: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub trigger: NotificationTrigger,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccelerometerSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BarometerSample {
    /// Hectopascals.
    pub pressure: f64,
    /// Metres; only reported by some platforms.
    pub relative_altitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum BatteryState {
    #[default]
    Unknown,
    Unplugged,
    Charging,
    Full,
}

impl BatteryState {
    pub fn label(self) -> &'static str {
        match self {
            BatteryState::Unplugged => "Unplugged",
            BatteryState::Charging => "Charging",
            BatteryState::Full => "Full",
            BatteryState::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthPrompt {
    pub prompt_message: String,
    pub cancel_label: String,
    pub fallback_label: String,
    pub disable_device_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResponse {
    Success,
    Failure { error: Option<String> },
}

/// Consent check shared by every capability that prompts the user.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn permission_status(&self) -> Result<PermissionStatus>;
    async fn request_permission(&self) -> Result<PermissionStatus>;
}

#[async_trait]
pub trait CameraPort: PermissionGate {
    async fn launch_camera(&self, options: &CaptureOptions) -> Result<CaptureResponse>;
}

#[async_trait]
pub trait SharingPort: Send + Sync {
    async fn is_available(&self) -> Result<bool>;
    async fn share(&self, photo: &PhotoRef) -> Result<()>;
}

#[async_trait]
pub trait LocationPort: PermissionGate {
    async fn current_position(&self) -> Result<Coordinates>;
}

/// Hands a URL to whatever external handler the OS picks. Fire and forget.
pub trait UrlOpener: Send + Sync {
    fn open_url(&self, url: &str) -> Result<()>;
}

#[async_trait]
pub trait NotificationPort: PermissionGate {
    /// Returns the platform's identifier for the scheduled notification.
    async fn schedule(&self, request: &NotificationRequest) -> Result<String>;
}

pub trait AccelerometerPort: Send + Sync {
    fn set_update_interval(&self, interval: Duration);
    fn subscribe(&self, listener: Listener<AccelerometerSample>) -> Result<Subscription>;
}

#[async_trait]
pub trait BarometerPort: Send + Sync {
    async fn is_available(&self) -> Result<bool>;
    fn subscribe(&self, listener: Listener<BarometerSample>) -> Result<Subscription>;
}

#[async_trait]
pub trait BatteryPort: Send + Sync {
    /// Charge in `[0, 1]`; platforms without a battery report `-1`.
    async fn level(&self) -> Result<f64>;
    async fn state(&self) -> Result<BatteryState>;
    async fn low_power_mode(&self) -> Result<bool>;

    fn subscribe_level(&self, listener: Listener<f64>) -> Result<Subscription>;
    fn subscribe_state(&self, listener: Listener<BatteryState>) -> Result<Subscription>;
    fn subscribe_low_power(&self, listener: Listener<bool>) -> Result<Subscription>;
}

#[async_trait]
pub trait BiometricPort: Send + Sync {
    async fn has_hardware(&self) -> Result<bool>;
    async fn is_enrolled(&self) -> Result<bool>;
    async fn authenticate(&self, prompt: &AuthPrompt) -> Result<AuthResponse>;
}

/// Every capability a features screen needs, injected as trait objects.
#[derive(Clone)]
pub struct CapabilityPorts {
    pub camera: Arc<dyn CameraPort>,
    pub sharing: Arc<dyn SharingPort>,
    pub location: Arc<dyn LocationPort>,
    pub urls: Arc<dyn UrlOpener>,
    pub notifications: Arc<dyn NotificationPort>,
    pub accelerometer: Arc<dyn AccelerometerPort>,
    pub barometer: Arc<dyn BarometerPort>,
    pub battery: Arc<dyn BatteryPort>,
    pub biometrics: Arc<dyn BiometricPort>,
}
