use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;

use super::{Panel, PanelKind, PanelView};
use crate::lifecycle::{lock, MountToken, PanelLifecycle};
use crate::platform::{BarometerPort, BarometerSample, SubscriptionSet};

const ENABLE_LOGS: bool = false;

use crate::log_debug;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BarometerState {
    /// `None` until the mount-time probe answers.
    pub available: Option<bool>,
    pub sample: Option<BarometerSample>,
}

#[derive(Clone)]
pub struct BarometerPanel {
    barometer: Arc<dyn BarometerPort>,
    state: Arc<Mutex<BarometerState>>,
    subscriptions: Arc<Mutex<SubscriptionSet>>,
    lifecycle: PanelLifecycle,
}

impl BarometerPanel {
    pub fn new(barometer: Arc<dyn BarometerPort>) -> Self {
        Self {
            barometer,
            state: Arc::new(Mutex::new(BarometerState::default())),
            subscriptions: Arc::new(Mutex::new(SubscriptionSet::new())),
            lifecycle: PanelLifecycle::new(),
        }
    }

    pub fn state(&self) -> BarometerState {
        *lock(&self.state)
    }

    pub fn active_subscriptions(&self) -> usize {
        lock(&self.subscriptions).len()
    }

    async fn probe_and_subscribe(&self, token: &MountToken) {
        let available = self.barometer.is_available().await.unwrap_or_else(|err| {
            warn!("barometer probe failed, treating as absent: {err:#}");
            false
        });
        if !available {
            info!("barometer not present");
            token.commit(|| lock(&self.state).available = Some(false));
            return;
        }

        let state = Arc::clone(&self.state);
        let listener_token = token.clone();
        // Subscribing under the commit keeps registration atomic with unmount.
        token.commit(|| {
            let registered = self.barometer.subscribe(Box::new(move |sample| {
                listener_token.commit(|| {
                    log_debug!("barometer {:?}", sample);
                    lock(&state).sample = Some(sample);
                });
            }));
            match registered {
                Ok(subscription) => {
                    lock(&self.state).available = Some(true);
                    lock(&self.subscriptions).push(subscription);
                }
                Err(err) => {
                    warn!("barometer subscription failed: {err:#}");
                    lock(&self.state).available = Some(false);
                }
            }
        });
    }
}

#[async_trait]
impl Panel for BarometerPanel {
    fn kind(&self) -> PanelKind {
        PanelKind::Barometer
    }

    async fn mount(&self) -> Result<()> {
        let token = self.lifecycle.mount()?;
        let panel = self.clone();
        let probe_token = token.clone();
        token.spawn(async move { panel.probe_and_subscribe(&probe_token).await });
        Ok(())
    }

    fn unmount(&self) {
        if !self.lifecycle.unmount() {
            return;
        }
        let released = lock(&self.subscriptions).release_all();
        lock(&self.state).sample = None;
        info!("barometer panel unmounted, released {released} listener(s)");
    }

    fn is_mounted(&self) -> bool {
        self.lifecycle.is_mounted()
    }

    fn view(&self) -> PanelView {
        let state = self.state();
        let mut lines = vec![match (state.available, state.sample) {
            (Some(false), _) => "Barometer not available on this device".to_string(),
            (_, Some(sample)) => format!("Pressure: {:.1} hPa", sample.pressure),
            (_, None) => "Waiting for data...".to_string(),
        }];
        if let Some(altitude) = state
            .sample
            .and_then(|sample| sample.relative_altitude)
            .filter(|altitude| *altitude != 0.0)
        {
            lines.push(format!("Relative altitude: {altitude:.2} m"));
        }

        PanelView {
            kind: PanelKind::Barometer,
            title: "Air pressure (Barometer)",
            subtitle: None,
            lines,
            actions: Vec::new(),
            caption: "No special permissions required.",
        }
    }
}
