use std::{
    future::Future,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;

use super::{Panel, PanelKind, PanelView};
use crate::lifecycle::{lock, MountToken, PanelLifecycle};
use crate::platform::{BatteryPort, BatteryState, Subscription, SubscriptionSet};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatteryStatus {
    /// Charge in `[0, 1]`.
    pub level: Option<f64>,
    pub state: BatteryState,
    pub low_power_mode: Option<bool>,
    /// Fields already updated by a push listener; the mount-time reads must
    /// not overwrite these with older values.
    #[serde(skip)]
    pushed: Pushed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Pushed {
    level: bool,
    state: bool,
    low_power_mode: bool,
}

impl BatteryStatus {
    pub fn percentage(&self) -> Option<u8> {
        self.level.map(|level| (level * 100.0).round() as u8)
    }
}

/// Platforms without a battery report a negative level.
fn normalize_level(level: f64) -> Option<f64> {
    if level.is_nan() || level < 0.0 {
        None
    } else {
        Some(level.min(1.0))
    }
}

#[derive(Clone)]
pub struct BatteryPanel {
    battery: Arc<dyn BatteryPort>,
    status: Arc<Mutex<BatteryStatus>>,
    subscriptions: Arc<Mutex<SubscriptionSet>>,
    lifecycle: PanelLifecycle,
}

impl BatteryPanel {
    pub fn new(battery: Arc<dyn BatteryPort>) -> Self {
        Self {
            battery,
            status: Arc::new(Mutex::new(BatteryStatus::default())),
            subscriptions: Arc::new(Mutex::new(SubscriptionSet::new())),
            lifecycle: PanelLifecycle::new(),
        }
    }

    pub fn status(&self) -> BatteryStatus {
        *lock(&self.status)
    }

    pub fn active_subscriptions(&self) -> usize {
        lock(&self.subscriptions).len()
    }

    fn keep(&self, token: &MountToken, registered: Result<Subscription>) {
        match registered {
            Ok(subscription) => {
                log_info!("battery: registered {} listener", subscription.label());
                token.commit(|| lock(&self.subscriptions).push(subscription));
            }
            Err(err) => log_warn!("battery listener registration failed: {err:#}"),
        }
    }

    fn register_listeners(&self, token: &MountToken) {
        let status = Arc::clone(&self.status);
        let writer = token.clone();
        let registered = self.battery.subscribe_level(Box::new(move |level| {
            writer.commit(|| {
                let mut status = lock(&status);
                status.level = normalize_level(level);
                status.pushed.level = true;
            });
        }));
        self.keep(token, registered);

        let status = Arc::clone(&self.status);
        let writer = token.clone();
        let registered = self.battery.subscribe_state(Box::new(move |state| {
            writer.commit(|| {
                let mut status = lock(&status);
                status.state = state;
                status.pushed.state = true;
            });
        }));
        self.keep(token, registered);

        let status = Arc::clone(&self.status);
        let writer = token.clone();
        let registered = self.battery.subscribe_low_power(Box::new(move |enabled| {
            writer.commit(|| {
                let mut status = lock(&status);
                status.low_power_mode = Some(enabled);
                status.pushed.low_power_mode = true;
            });
        }));
        self.keep(token, registered);
    }

    /// One read per field; each commits on its own.
    fn spawn_initial_reads(&self, token: &MountToken) {
        let battery = Arc::clone(&self.battery);
        self.read_in_background(
            token,
            "level",
            async move { battery.level().await },
            |status, level| {
                if !status.pushed.level {
                    status.level = normalize_level(level);
                }
            },
        );

        let battery = Arc::clone(&self.battery);
        self.read_in_background(
            token,
            "state",
            async move { battery.state().await },
            |status, state| {
                if !status.pushed.state {
                    status.state = state;
                }
            },
        );

        let battery = Arc::clone(&self.battery);
        self.read_in_background(
            token,
            "low power mode",
            async move { battery.low_power_mode().await },
            |status, enabled| {
                if !status.pushed.low_power_mode {
                    status.low_power_mode = Some(enabled);
                }
            },
        );
    }

    fn read_in_background<T: Send + 'static>(
        &self,
        token: &MountToken,
        field: &'static str,
        read: impl Future<Output = Result<T>> + Send + 'static,
        apply: fn(&mut BatteryStatus, T),
    ) {
        let status = Arc::clone(&self.status);
        let writer = token.clone();
        token.spawn(async move {
            match read.await {
                Ok(value) => {
                    writer.commit(|| apply(&mut lock(&status), value));
                }
                Err(err) => warn!("battery {field} read failed: {err:#}"),
            }
        });
    }
}

#[async_trait]
impl Panel for BatteryPanel {
    fn kind(&self) -> PanelKind {
        PanelKind::Battery
    }

    async fn mount(&self) -> Result<()> {
        let token = self.lifecycle.mount()?;
        self.register_listeners(&token);
        self.spawn_initial_reads(&token);
        Ok(())
    }

    fn unmount(&self) {
        if !self.lifecycle.unmount() {
            return;
        }
        let released = lock(&self.subscriptions).release_all();
        *lock(&self.status) = BatteryStatus::default();
        info!("battery panel unmounted, released {released} listener(s)");
    }

    fn is_mounted(&self) -> bool {
        self.lifecycle.is_mounted()
    }

    fn view(&self) -> PanelView {
        let status = self.status();
        let mut lines = vec![
            match status.percentage() {
                Some(percent) => format!("Level: {percent}%"),
                None => "Level: ...".to_string(),
            },
            format!("State: {}", status.state.label()),
        ];
        if let Some(enabled) = status.low_power_mode {
            lines.push(format!(
                "Low Power Mode: {}",
                if enabled { "On" } else { "Off" }
            ));
        }

        PanelView {
            kind: PanelKind::Battery,
            title: "Battery",
            subtitle: None,
            lines,
            actions: Vec::new(),
            caption: "No permissions required.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::settle;
    use crate::platform::simulated::SimulatedBattery;

    #[tokio::test]
    async fn initial_reads_fill_the_panel() {
        let device = Arc::new(SimulatedBattery::default());
        let panel = BatteryPanel::new(device.clone());

        panel.mount().await.unwrap();
        settle().await;

        assert_eq!(
            panel.view().lines,
            vec![
                "Level: 80%".to_string(),
                "State: Unplugged".to_string(),
                "Low Power Mode: Off".to_string(),
            ]
        );
        assert_eq!(device.listener_count(), 3);
    }

    #[tokio::test]
    async fn level_listener_drives_percentage() {
        let device = Arc::new(SimulatedBattery::default());
        let panel = BatteryPanel::new(device.clone());
        panel.mount().await.unwrap();

        device.set_level(0.42);

        assert_eq!(panel.view().lines[0], "Level: 42%");
    }

    #[tokio::test]
    async fn latest_push_wins_per_field() {
        let device = Arc::new(SimulatedBattery::default());
        let panel = BatteryPanel::new(device.clone());
        panel.mount().await.unwrap();

        device.set_state(BatteryState::Charging);
        device.set_level(0.5);
        device.set_state(BatteryState::Full);
        device.set_low_power(true);
        device.set_level(0.97);

        let status = panel.status();
        assert_eq!(status.percentage(), Some(97));
        assert_eq!(status.state, BatteryState::Full);
        assert_eq!(status.low_power_mode, Some(true));
    }

    #[tokio::test]
    async fn negative_level_means_unknown() {
        let device = Arc::new(SimulatedBattery::default());
        device.set_level(-1.0);
        let panel = BatteryPanel::new(device.clone());
        panel.mount().await.unwrap();
        settle().await;

        assert_eq!(panel.view().lines[0], "Level: ...");
    }

    #[tokio::test]
    async fn partial_registration_still_releases_everything() {
        let device = Arc::new(SimulatedBattery::default());
        device.refuse_state_listener(true);
        let panel = BatteryPanel::new(device.clone());

        panel.mount().await.unwrap();
        assert_eq!(panel.active_subscriptions(), 2);
        assert_eq!(device.listener_count(), 2);

        panel.unmount();
        assert_eq!(device.listener_count(), 0);
        assert_eq!(panel.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn no_updates_after_unmount() {
        let device = Arc::new(SimulatedBattery::default());
        let panel = BatteryPanel::new(device.clone());
        panel.mount().await.unwrap();
        panel.unmount();

        device.set_level(0.1);
        device.set_low_power(true);

        assert_eq!(panel.status(), BatteryStatus::default());
    }

    #[tokio::test]
    async fn stalled_level_read_leaves_other_fields_filled() {
        let device = Arc::new(SimulatedBattery::default());
        device.stall_level_read(true);
        device.set_state(BatteryState::Charging);
        device.set_low_power(true);
        let panel = BatteryPanel::new(device.clone());

        panel.mount().await.unwrap();
        settle().await;

        assert_eq!(
            panel.view().lines,
            vec![
                "Level: ...".to_string(),
                "State: Charging".to_string(),
                "Low Power Mode: On".to_string(),
            ]
        );

        device.set_level(0.3);
        assert_eq!(panel.view().lines[0], "Level: 30%");
    }
}
