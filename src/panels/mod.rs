//! One controller per device capability.
//!
//! One-shot panels (camera, location, notification, biometric) expose async
//! actions that resolve to an [`ActionOutcome`]; failures are recorded as a
//! message in the panel and never escape. Continuous panels (accelerometer,
//! barometer, battery) register listeners on mount and release them on
//! unmount.

pub mod accelerometer;
pub mod barometer;
pub mod battery;
pub mod biometric;
pub mod camera;
pub mod location;
pub mod maps;
pub mod notification;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Capability, CapabilityError};
use crate::lifecycle::MountToken;
use crate::platform::PermissionGate;

pub use accelerometer::{tilt_degrees, AccelerometerPanel};
pub use barometer::BarometerPanel;
pub use battery::{BatteryPanel, BatteryStatus};
pub use biometric::{AuthOutcome, BiometricPanel};
pub use camera::CameraPanel;
pub use location::{LocationPanel, LocationReading};
pub use maps::maps_url;
pub use notification::NotificationPanel;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PanelKind {
    Camera,
    Location,
    Notification,
    Accelerometer,
    Barometer,
    Battery,
    Biometric,
}

/// User-triggerable actions across all panels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureAction {
    Capture,
    Share,
    Locate,
    OpenMaps,
    Notify,
    Authenticate,
}

impl std::str::FromStr for FeatureAction {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "capture" => Ok(FeatureAction::Capture),
            "share" => Ok(FeatureAction::Share),
            "locate" => Ok(FeatureAction::Locate),
            "open-maps" => Ok(FeatureAction::OpenMaps),
            "notify" => Ok(FeatureAction::Notify),
            "authenticate" => Ok(FeatureAction::Authenticate),
            other => Err(anyhow::anyhow!("unknown action '{other}'")),
        }
    }
}

/// How a one-shot action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    /// A precondition was missing (nothing to share, panel not mounted);
    /// no capability was invoked.
    Skipped,
    /// The user backed out; prior state is untouched.
    Cancelled,
    Failed(CapabilityError),
    /// The panel was unmounted while the action was in flight.
    Discarded,
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionOutcome::Completed => f.write_str("completed"),
            ActionOutcome::Skipped => f.write_str("skipped"),
            ActionOutcome::Cancelled => f.write_str("cancelled"),
            ActionOutcome::Failed(err) => write!(f, "failed ({err})"),
            ActionOutcome::Discarded => f.write_str("discarded"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionView {
    pub action: FeatureAction,
    pub label: &'static str,
    pub enabled: bool,
}

/// Render-ready description of a panel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub kind: PanelKind,
    pub title: &'static str,
    pub subtitle: Option<&'static str>,
    pub lines: Vec<String>,
    pub actions: Vec<ActionView>,
    pub caption: &'static str,
}

#[async_trait]
pub trait Panel: Send + Sync {
    fn kind(&self) -> PanelKind;

    /// Starts the panel's lifetime. Fails only if it is already mounted.
    async fn mount(&self) -> Result<()>;

    /// Ends the panel's lifetime; every listener is released before this returns.
    fn unmount(&self);

    fn is_mounted(&self) -> bool;

    fn view(&self) -> PanelView;
}

/// Checks consent and asks for it if needed.
pub(crate) async fn ensure_permission<G>(
    gate: &G,
    capability: Capability,
) -> Result<(), CapabilityError>
where
    G: PermissionGate + ?Sized,
{
    let status = gate
        .permission_status()
        .await
        .map_err(CapabilityError::failed)?;
    if status.is_granted() {
        return Ok(());
    }

    let status = gate
        .request_permission()
        .await
        .map_err(CapabilityError::failed)?;
    if status.is_granted() {
        Ok(())
    } else {
        Err(CapabilityError::PermissionDenied(capability))
    }
}

/// Records `err` through `token` and reports the matching outcome.
pub(crate) fn record_failure(
    token: &MountToken,
    err: CapabilityError,
    write: impl FnOnce(String),
) -> ActionOutcome {
    let message = err.to_string();
    if token.commit(|| write(message)) {
        ActionOutcome::Failed(err)
    } else {
        ActionOutcome::Discarded
    }
}
