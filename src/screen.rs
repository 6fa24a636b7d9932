use anyhow::{anyhow, Result};
use log::{error, info};
use serde::Serialize;

use crate::panels::maps::MapLauncher;
use crate::panels::{
    AccelerometerPanel, ActionOutcome, BarometerPanel, BatteryPanel, BiometricPanel, CameraPanel,
    FeatureAction, LocationPanel, NotificationPanel, Panel, PanelView,
};
use crate::platform::CapabilityPorts;
use crate::settings::FeatureSettings;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScreenSnapshot {
    pub title: &'static str,
    pub tagline: &'static str,
    pub panels: Vec<PanelView>,
}

/// The scrollable features screen: every capability panel, in display order.
#[derive(Clone)]
pub struct FeaturesScreen {
    pub camera: CameraPanel,
    pub location: LocationPanel,
    pub notification: NotificationPanel,
    pub accelerometer: AccelerometerPanel,
    pub barometer: BarometerPanel,
    pub battery: BatteryPanel,
    pub biometric: BiometricPanel,
}

impl FeaturesScreen {
    pub fn new(ports: CapabilityPorts, settings: &FeatureSettings) -> Self {
        Self {
            camera: CameraPanel::new(
                ports.camera,
                ports.sharing,
                settings.camera.capture_options(),
            ),
            location: LocationPanel::new(
                ports.location,
                MapLauncher::new(ports.urls, settings.platform),
            ),
            notification: NotificationPanel::new(
                ports.notifications,
                settings.notification.request(),
            ),
            accelerometer: AccelerometerPanel::new(
                ports.accelerometer,
                settings.accelerometer_interval(),
            ),
            barometer: BarometerPanel::new(ports.barometer),
            battery: BatteryPanel::new(ports.battery),
            biometric: BiometricPanel::new(ports.biometrics, settings.biometric.prompt()),
        }
    }

    pub fn panels(&self) -> [&dyn Panel; 7] {
        [
            &self.camera,
            &self.location,
            &self.notification,
            &self.accelerometer,
            &self.barometer,
            &self.battery,
            &self.biometric,
        ]
    }

    /// Mounts every panel. Platform probes and initial reads carry on in the
    /// background, so this returns even if one of them never answers.
    pub async fn mount(&self) -> Result<()> {
        let results = tokio::join!(
            self.camera.mount(),
            self.location.mount(),
            self.notification.mount(),
            self.accelerometer.mount(),
            self.barometer.mount(),
            self.battery.mount(),
            self.biometric.mount(),
        );
        let results = [
            results.0, results.1, results.2, results.3, results.4, results.5, results.6,
        ];

        let mut failures = Vec::new();
        for (panel, result) in self.panels().iter().zip(results) {
            if let Err(err) = result {
                error!("mounting {:?} failed: {err:#}", panel.kind());
                failures.push(format!("{:?}: {err}", panel.kind()));
            }
        }

        if failures.is_empty() {
            info!("features screen mounted");
            Ok(())
        } else {
            Err(anyhow!("failed to mount {}", failures.join(", ")))
        }
    }

    pub fn unmount(&self) {
        for panel in self.panels() {
            panel.unmount();
        }
        info!("features screen unmounted");
    }

    pub async fn dispatch(&self, action: FeatureAction) -> ActionOutcome {
        let outcome = match action {
            FeatureAction::Capture => self.camera.capture().await,
            FeatureAction::Share => self.camera.share().await,
            FeatureAction::Locate => self.location.locate().await,
            FeatureAction::OpenMaps => self.location.open_in_maps(),
            FeatureAction::Notify => self.notification.schedule().await,
            FeatureAction::Authenticate => self.biometric.authenticate().await,
        };
        info!("{action:?}: {outcome}");
        outcome
    }

    pub fn snapshot(&self) -> ScreenSnapshot {
        ScreenSnapshot {
            title: "Features",
            tagline: "Cross-platform APIs with graceful fallbacks.",
            panels: self.panels().iter().map(|panel| panel.view()).collect(),
        }
    }
}
