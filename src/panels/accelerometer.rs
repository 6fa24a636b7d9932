use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};

use super::{Panel, PanelKind, PanelView};
use crate::lifecycle::{lock, PanelLifecycle};
use crate::platform::{AccelerometerPort, AccelerometerSample, SubscriptionSet};

// Samples arrive every interval; keep per-sample logging off by default.
const ENABLE_LOGS: bool = false;

use crate::log_debug;

const MAX_TILT_DEGREES: f64 = 45.0;

/// Maps the x axis to a hand rotation: clamped to `[-1, 1]`, scaled to
/// `±45°`, rounded to whole degrees.
pub fn tilt_degrees(x: f64) -> i32 {
    if x.is_nan() {
        return 0;
    }
    (x.clamp(-1.0, 1.0) * MAX_TILT_DEGREES).round() as i32
}

/// Live x/y/z readings plus a tilt angle derived from x.
#[derive(Clone)]
pub struct AccelerometerPanel {
    accelerometer: Arc<dyn AccelerometerPort>,
    interval: Duration,
    sample: Arc<Mutex<Option<AccelerometerSample>>>,
    subscriptions: Arc<Mutex<SubscriptionSet>>,
    message: Arc<Mutex<Option<String>>>,
    lifecycle: PanelLifecycle,
}

impl AccelerometerPanel {
    pub fn new(accelerometer: Arc<dyn AccelerometerPort>, interval: Duration) -> Self {
        Self {
            accelerometer,
            interval,
            sample: Arc::new(Mutex::new(None)),
            subscriptions: Arc::new(Mutex::new(SubscriptionSet::new())),
            message: Arc::new(Mutex::new(None)),
            lifecycle: PanelLifecycle::new(),
        }
    }

    pub fn sample(&self) -> Option<AccelerometerSample> {
        *lock(&self.sample)
    }

    /// Recomputed from the current sample on every call.
    pub fn tilt(&self) -> i32 {
        tilt_degrees(self.sample().unwrap_or_default().x)
    }

    pub fn tilt_label(&self) -> String {
        format!("{}deg", self.tilt())
    }

    pub fn active_subscriptions(&self) -> usize {
        lock(&self.subscriptions).len()
    }
}

#[async_trait]
impl Panel for AccelerometerPanel {
    fn kind(&self) -> PanelKind {
        PanelKind::Accelerometer
    }

    async fn mount(&self) -> Result<()> {
        let token = self.lifecycle.mount()?;
        self.accelerometer.set_update_interval(self.interval);

        let sample = Arc::clone(&self.sample);
        let listener_token = token.clone();
        let registered = self.accelerometer.subscribe(Box::new(move |reading| {
            listener_token.commit(|| {
                log_debug!("accelerometer {:?}", reading);
                *lock(&sample) = Some(reading);
            });
        }));

        match registered {
            Ok(subscription) => {
                token.commit(|| lock(&self.subscriptions).push(subscription));
                info!("accelerometer listening every {:?}", self.interval);
            }
            Err(err) => {
                warn!("accelerometer subscription failed: {err:#}");
                token.commit(|| {
                    *lock(&self.message) = Some(format!("Accelerometer unavailable: {err}"))
                });
            }
        }
        Ok(())
    }

    fn unmount(&self) {
        if !self.lifecycle.unmount() {
            return;
        }
        let released = lock(&self.subscriptions).release_all();
        *lock(&self.sample) = None;
        info!("accelerometer panel unmounted, released {released} listener(s)");
    }

    fn is_mounted(&self) -> bool {
        self.lifecycle.is_mounted()
    }

    fn view(&self) -> PanelView {
        let sample = self.sample().unwrap_or_default();
        let mut lines = vec![
            format!("x: {:.2}", sample.x),
            format!("y: {:.2}", sample.y),
            format!("z: {:.2}", sample.z),
            format!("Hand rotation: {}", self.tilt_label()),
        ];
        if let Some(message) = lock(&self.message).clone() {
            lines.push(message);
        }

        PanelView {
            kind: PanelKind::Accelerometer,
            title: "Shake/Wave (Accelerometer)",
            subtitle: Some("Live sensor readings"),
            lines,
            actions: Vec::new(),
            caption: "Tilt your device to rotate the hand.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::SimulatedAccelerometer;

    fn sample(x: f64) -> AccelerometerSample {
        AccelerometerSample { x, y: 0.1, z: -1.0 }
    }

    #[test]
    fn tilt_is_clamped_and_linear() {
        assert_eq!(tilt_degrees(-3.0), -45);
        assert_eq!(tilt_degrees(-1.0), -45);
        assert_eq!(tilt_degrees(0.0), 0);
        assert_eq!(tilt_degrees(0.5), 23);
        assert_eq!(tilt_degrees(1.0), 45);
        assert_eq!(tilt_degrees(7.5), 45);
        assert_eq!(tilt_degrees(f64::NAN), 0);
    }

    #[test]
    fn tilt_is_monotonic() {
        let mut previous = tilt_degrees(-1.5);
        for step in 0..=300 {
            let current = tilt_degrees(-1.5 + step as f64 * 0.01);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[tokio::test]
    async fn configures_interval_before_subscribing() {
        let device = Arc::new(SimulatedAccelerometer::default());
        let panel = AccelerometerPanel::new(device.clone(), Duration::from_millis(100));

        panel.mount().await.unwrap();

        assert_eq!(device.update_interval(), Some(Duration::from_millis(100)));
        assert_eq!(device.listener_count(), 1);
        assert_eq!(panel.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn shows_the_latest_sample() {
        let device = Arc::new(SimulatedAccelerometer::default());
        let panel = AccelerometerPanel::new(device.clone(), Duration::from_millis(100));
        panel.mount().await.unwrap();

        for x in [0.1, -0.4, 0.5] {
            device.emit(sample(x));
        }

        assert_eq!(panel.sample(), Some(sample(0.5)));
        assert_eq!(panel.tilt_label(), "23deg");
        assert_eq!(panel.view().lines[0], "x: 0.50");
    }

    #[tokio::test]
    async fn unmount_stops_updates_and_resets() {
        let device = Arc::new(SimulatedAccelerometer::default());
        let panel = AccelerometerPanel::new(device.clone(), Duration::from_millis(100));
        panel.mount().await.unwrap();
        device.emit(sample(0.2));

        panel.unmount();
        device.emit(sample(0.9));

        assert_eq!(device.listener_count(), 0);
        assert_eq!(panel.sample(), None);
        assert_eq!(panel.tilt(), 0);
    }

    #[tokio::test]
    async fn remount_registers_exactly_one_listener() {
        let device = Arc::new(SimulatedAccelerometer::default());
        let panel = AccelerometerPanel::new(device.clone(), Duration::from_millis(100));

        panel.mount().await.unwrap();
        assert!(panel.mount().await.is_err());
        panel.unmount();
        panel.mount().await.unwrap();

        assert_eq!(device.listener_count(), 1);
        device.emit(sample(-1.0));
        assert_eq!(panel.tilt(), -45);
    }
}
