use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use super::maps::MapLauncher;
use super::{
    ensure_permission, record_failure, ActionOutcome, ActionView, FeatureAction, Panel,
    PanelKind, PanelView,
};
use crate::error::{Capability, CapabilityError};
use crate::lifecycle::{lock, PanelLifecycle};
use crate::platform::{Coordinates, LocationPort};

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationReading {
    pub coords: Coordinates,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationState {
    pub reading: Option<LocationReading>,
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct LocationPanel {
    location: Arc<dyn LocationPort>,
    maps: MapLauncher,
    state: Arc<Mutex<LocationState>>,
    lifecycle: PanelLifecycle,
}

impl LocationPanel {
    pub fn new(location: Arc<dyn LocationPort>, maps: MapLauncher) -> Self {
        Self {
            location,
            maps,
            state: Arc::new(Mutex::new(LocationState::default())),
            lifecycle: PanelLifecycle::new(),
        }
    }

    pub fn state(&self) -> LocationState {
        lock(&self.state).clone()
    }

    pub fn reading(&self) -> Option<LocationReading> {
        lock(&self.state).reading
    }

    pub async fn locate(&self) -> ActionOutcome {
        let Some(token) = self.lifecycle.token() else {
            warn!("location requested while panel is unmounted");
            return ActionOutcome::Skipped;
        };

        if let Err(err) = ensure_permission(self.location.as_ref(), Capability::Location).await {
            return record_failure(&token, err, |message| self.set_message(message));
        }

        match self.location.current_position().await {
            Ok(coords) => {
                info!("position fix {:.5},{:.5}", coords.latitude, coords.longitude);
                let committed = token.commit(|| {
                    let mut state = lock(&self.state);
                    state.reading = Some(LocationReading {
                        coords,
                        fetched_at: Utc::now(),
                    });
                    state.message = None;
                });
                if committed {
                    ActionOutcome::Completed
                } else {
                    ActionOutcome::Discarded
                }
            }
            Err(err) => {
                warn!("position fix failed: {err:#}");
                record_failure(&token, CapabilityError::failed(err), |message| {
                    self.set_message(message)
                })
            }
        }
    }

    /// Opens the last reading in an external maps app. A no-op without one.
    pub fn open_in_maps(&self) -> ActionOutcome {
        let Some(token) = self.lifecycle.token() else {
            warn!("maps requested while panel is unmounted");
            return ActionOutcome::Skipped;
        };
        let Some(reading) = self.reading() else {
            return ActionOutcome::Skipped;
        };

        match self.maps.open(reading.coords) {
            Ok(url) => {
                info!("opened {url}");
                ActionOutcome::Completed
            }
            Err(err) => {
                warn!("could not open maps: {err:#}");
                record_failure(&token, CapabilityError::failed(err), |message| {
                    self.set_message(message)
                })
            }
        }
    }

    fn set_message(&self, message: String) {
        lock(&self.state).message = Some(message);
    }
}

#[async_trait]
impl Panel for LocationPanel {
    fn kind(&self) -> PanelKind {
        PanelKind::Location
    }

    async fn mount(&self) -> Result<()> {
        self.lifecycle.mount().map(|_| ())
    }

    fn unmount(&self) {
        self.lifecycle.unmount();
    }

    fn is_mounted(&self) -> bool {
        self.lifecycle.is_mounted()
    }

    fn view(&self) -> PanelView {
        let state = self.state();
        let mut lines = vec![match &state.reading {
            Some(reading) => format!(
                "Latitude: {:.5}, Longitude: {:.5}",
                reading.coords.latitude, reading.coords.longitude
            ),
            None => "No location yet".to_string(),
        }];
        if let Some(message) = state.message {
            lines.push(message);
        }

        PanelView {
            kind: PanelKind::Location,
            title: "Find me (Location)",
            subtitle: Some("Get coordinates and open Maps"),
            lines,
            actions: vec![
                ActionView {
                    action: FeatureAction::Locate,
                    label: "Get location",
                    enabled: true,
                },
                ActionView {
                    action: FeatureAction::OpenMaps,
                    label: "Open in Maps",
                    enabled: state.reading.is_some(),
                },
            ],
            caption: "Uses the foreground location service; opens native or Google Maps.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::{SimulatedLocation, SimulatedUrlOpener};
    use crate::platform::PlatformFamily;

    fn panel(
        platform: PlatformFamily,
    ) -> (LocationPanel, Arc<SimulatedLocation>, Arc<SimulatedUrlOpener>) {
        let location = Arc::new(SimulatedLocation::default());
        let urls = Arc::new(SimulatedUrlOpener::default());
        let panel = LocationPanel::new(location.clone(), MapLauncher::new(urls.clone(), platform));
        (panel, location, urls)
    }

    #[tokio::test]
    async fn open_in_maps_without_reading_does_nothing() {
        let (panel, _, urls) = panel(PlatformFamily::Ios);
        panel.mount().await.unwrap();

        assert_eq!(panel.open_in_maps(), ActionOutcome::Skipped);
        assert!(urls.opened().is_empty());
        assert!(!panel.view().actions[1].enabled);
    }

    #[tokio::test]
    async fn locate_then_open_in_maps() {
        let (panel, location, urls) = panel(PlatformFamily::Android);
        location.set_position(Ok(Coordinates {
            latitude: 48.858844,
            longitude: 2.294351,
        }));
        panel.mount().await.unwrap();

        assert_eq!(panel.locate().await, ActionOutcome::Completed);
        assert_eq!(
            panel.view().lines[0],
            "Latitude: 48.85884, Longitude: 2.29435"
        );
        assert_eq!(panel.open_in_maps(), ActionOutcome::Completed);
        assert_eq!(
            urls.opened(),
            vec!["https://www.google.com/maps?q=48.858844,2.294351".to_string()]
        );
    }

    #[tokio::test]
    async fn denied_location_keeps_prior_reading() {
        let (panel, location, _) = panel(PlatformFamily::Ios);
        panel.mount().await.unwrap();
        panel.locate().await;
        let before = panel.reading();

        location.permission.revoke();
        let outcome = panel.locate().await;

        assert_eq!(
            outcome,
            ActionOutcome::Failed(CapabilityError::PermissionDenied(Capability::Location))
        );
        assert_eq!(location.fixes(), 1);
        assert_eq!(panel.reading(), before);
        assert_eq!(
            panel.state().message.as_deref(),
            Some("Location permission is required")
        );
    }

    #[tokio::test]
    async fn fix_failure_is_reported() {
        let (panel, location, _) = panel(PlatformFamily::Web);
        location.set_position(Err("location services disabled".into()));
        panel.mount().await.unwrap();

        assert!(matches!(panel.locate().await, ActionOutcome::Failed(_)));
        assert_eq!(
            panel.view().lines,
            vec![
                "No location yet".to_string(),
                "Failed: location services disabled".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn unmounted_panel_does_not_open_maps() {
        let (panel, _, urls) = panel(PlatformFamily::Ios);
        panel.mount().await.unwrap();
        panel.locate().await;
        panel.unmount();

        assert!(panel.reading().is_some());
        assert_eq!(panel.open_in_maps(), ActionOutcome::Skipped);
        assert!(urls.opened().is_empty());
    }
}
