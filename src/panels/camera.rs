use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use super::{
    ensure_permission, record_failure, ActionOutcome, ActionView, FeatureAction, Panel,
    PanelKind, PanelView,
};
use crate::error::{Capability, CapabilityError};
use crate::lifecycle::{lock, PanelLifecycle};
use crate::platform::{CameraPort, CaptureOptions, CaptureResponse, PhotoRef, SharingPort};

const SHARING_UNAVAILABLE: &str = "Sharing is not available on this platform";

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CameraState {
    pub photo: Option<PhotoRef>,
    pub captured_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

/// Captures a photo and hands it to the share sheet.
#[derive(Clone)]
pub struct CameraPanel {
    camera: Arc<dyn CameraPort>,
    sharing: Arc<dyn SharingPort>,
    options: CaptureOptions,
    state: Arc<Mutex<CameraState>>,
    lifecycle: PanelLifecycle,
}

impl CameraPanel {
    pub fn new(
        camera: Arc<dyn CameraPort>,
        sharing: Arc<dyn SharingPort>,
        options: CaptureOptions,
    ) -> Self {
        Self {
            camera,
            sharing,
            options,
            state: Arc::new(Mutex::new(CameraState::default())),
            lifecycle: PanelLifecycle::new(),
        }
    }

    pub fn state(&self) -> CameraState {
        lock(&self.state).clone()
    }

    pub fn photo(&self) -> Option<PhotoRef> {
        lock(&self.state).photo.clone()
    }

    pub async fn capture(&self) -> ActionOutcome {
        let Some(token) = self.lifecycle.token() else {
            warn!("capture requested while camera panel is unmounted");
            return ActionOutcome::Skipped;
        };

        if let Err(err) = ensure_permission(self.camera.as_ref(), Capability::Camera).await {
            return record_failure(&token, err, |message| self.set_message(message));
        }

        match self.camera.launch_camera(&self.options).await {
            Ok(CaptureResponse::Captured(photo)) => {
                info!("captured {}", photo.uri());
                let committed = token.commit(|| {
                    let mut state = lock(&self.state);
                    state.photo = Some(photo);
                    state.captured_at = Some(Utc::now());
                    state.message = None;
                });
                if committed {
                    ActionOutcome::Completed
                } else {
                    ActionOutcome::Discarded
                }
            }
            Ok(CaptureResponse::Cancelled) => {
                info!("capture cancelled by user");
                ActionOutcome::Cancelled
            }
            Err(err) => {
                warn!("camera launch failed: {err:#}");
                record_failure(&token, CapabilityError::failed(err), |message| {
                    self.set_message(message)
                })
            }
        }
    }

    /// Shares the last captured photo. A no-op until something was captured.
    pub async fn share(&self) -> ActionOutcome {
        let Some(token) = self.lifecycle.token() else {
            return ActionOutcome::Skipped;
        };
        let Some(photo) = self.photo() else {
            return ActionOutcome::Skipped;
        };

        match self.sharing.is_available().await {
            Ok(true) => {}
            Ok(false) => {
                return record_failure(
                    &token,
                    CapabilityError::Unavailable(SHARING_UNAVAILABLE.into()),
                    |message| self.set_message(message),
                );
            }
            Err(err) => {
                return record_failure(&token, CapabilityError::failed(err), |message| {
                    self.set_message(message)
                });
            }
        }

        match self.sharing.share(&photo).await {
            Ok(()) => ActionOutcome::Completed,
            Err(err) => {
                warn!("share failed: {err:#}");
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
impl Panel for CameraPanel {
    fn kind(&self) -> PanelKind {
        PanelKind::Camera
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
        let mut lines = Vec::new();
        if let Some(photo) = &state.photo {
            lines.push(format!("Photo: {}", photo.uri()));
        }
        if let Some(message) = &state.message {
            lines.push(message.clone());
        }

        PanelView {
            kind: PanelKind::Camera,
            title: "Camera + Share",
            subtitle: Some("Capture a photo and share it"),
            lines,
            actions: vec![
                ActionView {
                    action: FeatureAction::Capture,
                    label: "Capture photo",
                    enabled: true,
                },
                ActionView {
                    action: FeatureAction::Share,
                    label: "Share",
                    enabled: state.photo.is_some(),
                },
            ],
            caption: "Uses the camera and the system share sheet. Sharing may be unavailable on web.",
        }
    }
}
