//! In-process stand-in for every capability.
//!
//! Backs the demo binary and the tests. Each simulated capability keeps call
//! counters and lets the caller script permission answers, hardware presence
//! and failures.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use log::info;
use rand::Rng;
use tokio::{sync::oneshot, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    AccelerometerPort, AccelerometerSample, AuthPrompt, AuthResponse, BarometerPort,
    BarometerSample, BatteryPort, BatteryState, BiometricPort, CameraPort, CaptureOptions,
    CaptureResponse, Coordinates, Listener, ListenerHub, LocationPort, NotificationPort,
    NotificationRequest, PermissionGate, PermissionStatus, PhotoRef, SharingPort, Subscription,
    UrlOpener,
};
use crate::lifecycle::lock;

/// Scriptable consent state.
pub struct SimulatedPermission {
    status: Mutex<PermissionStatus>,
    answer: Mutex<PermissionStatus>,
    requests: AtomicUsize,
}

impl SimulatedPermission {
    /// `answer` is what the user picks when prompted.
    pub fn new(status: PermissionStatus, answer: PermissionStatus) -> Self {
        Self {
            status: Mutex::new(status),
            answer: Mutex::new(answer),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn set_answer(&self, answer: PermissionStatus) {
        *lock(&self.answer) = answer;
    }

    /// Withdraws consent as if from system settings; later prompts are denied too.
    pub fn revoke(&self) {
        *lock(&self.status) = PermissionStatus::Denied;
        *lock(&self.answer) = PermissionStatus::Denied;
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn status(&self) -> PermissionStatus {
        *lock(&self.status)
    }

    fn request(&self) -> PermissionStatus {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let answer = *lock(&self.answer);
        *lock(&self.status) = answer;
        answer
    }
}

impl Default for SimulatedPermission {
    fn default() -> Self {
        Self::new(PermissionStatus::Undetermined, PermissionStatus::Granted)
    }
}

macro_rules! simulated_gate {
    ($ty:ty) => {
        #[async_trait]
        impl PermissionGate for $ty {
            async fn permission_status(&self) -> Result<PermissionStatus> {
                Ok(self.permission.status())
            }

            async fn request_permission(&self) -> Result<PermissionStatus> {
                Ok(self.permission.request())
            }
        }
    };
}

#[derive(Default)]
pub struct SimulatedCamera {
    pub permission: SimulatedPermission,
    scripted: Mutex<VecDeque<Result<CaptureResponse, String>>>,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
    launches: AtomicUsize,
}

impl SimulatedCamera {
    /// Queues the response for the next launch; unscripted launches capture a fresh photo.
    pub fn script(&self, response: Result<CaptureResponse, String>) {
        lock(&self.scripted).push_back(response);
    }

    /// Blocks the next launch until the returned sender fires (or is dropped).
    pub fn hold_next_launch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *lock(&self.hold) = Some(rx);
        tx
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

simulated_gate!(SimulatedCamera);

#[async_trait]
impl CameraPort for SimulatedCamera {
    async fn launch_camera(&self, options: &CaptureOptions) -> Result<CaptureResponse> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let hold = lock(&self.hold).take();
        if let Some(rx) = hold {
            let _ = rx.await;
        }

        match lock(&self.scripted).pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(anyhow!(reason)),
            None => {
                let ext = if options.quality < 1.0 { "jpg" } else { "png" };
                Ok(CaptureResponse::Captured(PhotoRef::new(format!(
                    "file:///simulated/camera/{}.{ext}",
                    Uuid::new_v4()
                ))))
            }
        }
    }
}

pub struct SimulatedSharing {
    available: AtomicBool,
    shared: Mutex<Vec<PhotoRef>>,
}

impl Default for SimulatedSharing {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            shared: Mutex::new(Vec::new()),
        }
    }
}

impl SimulatedSharing {
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn shared(&self) -> Vec<PhotoRef> {
        lock(&self.shared).clone()
    }
}

#[async_trait]
impl SharingPort for SimulatedSharing {
    async fn is_available(&self) -> Result<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn share(&self, photo: &PhotoRef) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            bail!("share sheet unavailable");
        }
        lock(&self.shared).push(photo.clone());
        Ok(())
    }
}

pub struct SimulatedLocation {
    pub permission: SimulatedPermission,
    position: Mutex<Result<Coordinates, String>>,
    fixes: AtomicUsize,
}

impl Default for SimulatedLocation {
    fn default() -> Self {
        Self {
            permission: SimulatedPermission::default(),
            position: Mutex::new(Ok(Coordinates {
                latitude: 37.33182,
                longitude: -122.03118,
            })),
            fixes: AtomicUsize::new(0),
        }
    }
}

impl SimulatedLocation {
    pub fn set_position(&self, position: Result<Coordinates, String>) {
        *lock(&self.position) = position;
    }

    pub fn fixes(&self) -> usize {
        self.fixes.load(Ordering::SeqCst)
    }
}

simulated_gate!(SimulatedLocation);

#[async_trait]
impl LocationPort for SimulatedLocation {
    async fn current_position(&self) -> Result<Coordinates> {
        self.fixes.fetch_add(1, Ordering::SeqCst);
        lock(&self.position).clone().map_err(|reason| anyhow!(reason))
    }
}

#[derive(Default)]
pub struct SimulatedUrlOpener {
    opened: Mutex<Vec<String>>,
}

impl SimulatedUrlOpener {
    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }
}

impl UrlOpener for SimulatedUrlOpener {
    fn open_url(&self, url: &str) -> Result<()> {
        info!("simulated open: {url}");
        lock(&self.opened).push(url.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct SimulatedNotifications {
    pub permission: SimulatedPermission,
    scheduled: Mutex<Vec<NotificationRequest>>,
}

impl SimulatedNotifications {
    pub fn scheduled(&self) -> Vec<NotificationRequest> {
        lock(&self.scheduled).clone()
    }
}

simulated_gate!(SimulatedNotifications);

#[async_trait]
impl NotificationPort for SimulatedNotifications {
    async fn schedule(&self, request: &NotificationRequest) -> Result<String> {
        lock(&self.scheduled).push(request.clone());
        Ok(Uuid::new_v4().to_string())
    }
}

pub struct SimulatedAccelerometer {
    hub: ListenerHub<AccelerometerSample>,
    interval: Mutex<Option<Duration>>,
}

impl Default for SimulatedAccelerometer {
    fn default() -> Self {
        Self {
            hub: ListenerHub::new("accelerometer"),
            interval: Mutex::new(None),
        }
    }
}

impl SimulatedAccelerometer {
    pub fn emit(&self, sample: AccelerometerSample) {
        self.hub.emit(sample);
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    pub fn update_interval(&self) -> Option<Duration> {
        *lock(&self.interval)
    }
}

impl AccelerometerPort for SimulatedAccelerometer {
    fn set_update_interval(&self, interval: Duration) {
        *lock(&self.interval) = Some(interval);
    }

    fn subscribe(&self, listener: Listener<AccelerometerSample>) -> Result<Subscription> {
        Ok(self.hub.subscribe(listener))
    }
}

pub struct SimulatedBarometer {
    available: AtomicBool,
    hub: ListenerHub<BarometerSample>,
    probes: AtomicUsize,
    stall_probe: AtomicBool,
}

impl Default for SimulatedBarometer {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            hub: ListenerHub::new("barometer"),
            probes: AtomicUsize::new(0),
            stall_probe: AtomicBool::new(false),
        }
    }
}

impl SimulatedBarometer {
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn emit(&self, sample: BarometerSample) {
        self.hub.emit(sample);
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Makes the availability probe never answer.
    pub fn stall_probe(&self, stall: bool) {
        self.stall_probe.store(stall, Ordering::SeqCst);
    }
}

#[async_trait]
impl BarometerPort for SimulatedBarometer {
    async fn is_available(&self) -> Result<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.stall_probe.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.available.load(Ordering::SeqCst))
    }

    fn subscribe(&self, listener: Listener<BarometerSample>) -> Result<Subscription> {
        Ok(self.hub.subscribe(listener))
    }
}

pub struct SimulatedBattery {
    level: Mutex<f64>,
    state: Mutex<BatteryState>,
    low_power: AtomicBool,
    level_hub: ListenerHub<f64>,
    state_hub: ListenerHub<BatteryState>,
    low_power_hub: ListenerHub<bool>,
    refuse_state_listener: AtomicBool,
    stall_level_read: AtomicBool,
}

impl Default for SimulatedBattery {
    fn default() -> Self {
        Self {
            level: Mutex::new(0.8),
            state: Mutex::new(BatteryState::Unplugged),
            low_power: AtomicBool::new(false),
            level_hub: ListenerHub::new("battery level"),
            state_hub: ListenerHub::new("battery state"),
            low_power_hub: ListenerHub::new("low power mode"),
            refuse_state_listener: AtomicBool::new(false),
            stall_level_read: AtomicBool::new(false),
        }
    }
}

impl SimulatedBattery {
    pub fn set_level(&self, level: f64) {
        *lock(&self.level) = level;
        self.level_hub.emit(level);
    }

    pub fn set_state(&self, state: BatteryState) {
        *lock(&self.state) = state;
        self.state_hub.emit(state);
    }

    pub fn set_low_power(&self, enabled: bool) {
        self.low_power.store(enabled, Ordering::SeqCst);
        self.low_power_hub.emit(enabled);
    }

    /// Makes the state listener registration fail, leaving the others working.
    pub fn refuse_state_listener(&self, refuse: bool) {
        self.refuse_state_listener.store(refuse, Ordering::SeqCst);
    }

    /// Makes the one-shot level read never answer.
    pub fn stall_level_read(&self, stall: bool) {
        self.stall_level_read.store(stall, Ordering::SeqCst);
    }

    pub fn listener_count(&self) -> usize {
        self.level_hub.listener_count()
            + self.state_hub.listener_count()
            + self.low_power_hub.listener_count()
    }
}

#[async_trait]
impl BatteryPort for SimulatedBattery {
    async fn level(&self) -> Result<f64> {
        if self.stall_level_read.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(*lock(&self.level))
    }

    async fn state(&self) -> Result<BatteryState> {
        Ok(*lock(&self.state))
    }

    async fn low_power_mode(&self) -> Result<bool> {
        Ok(self.low_power.load(Ordering::SeqCst))
    }

    fn subscribe_level(&self, listener: Listener<f64>) -> Result<Subscription> {
        Ok(self.level_hub.subscribe(listener))
    }

    fn subscribe_state(&self, listener: Listener<BatteryState>) -> Result<Subscription> {
        if self.refuse_state_listener.load(Ordering::SeqCst) {
            bail!("battery state events not supported");
        }
        Ok(self.state_hub.subscribe(listener))
    }

    fn subscribe_low_power(&self, listener: Listener<bool>) -> Result<Subscription> {
        Ok(self.low_power_hub.subscribe(listener))
    }
}

pub struct SimulatedBiometrics {
    has_hardware: AtomicBool,
    enrolled: AtomicBool,
    response: Mutex<AuthResponse>,
    prompts: AtomicUsize,
}

impl Default for SimulatedBiometrics {
    fn default() -> Self {
        Self {
            has_hardware: AtomicBool::new(true),
            enrolled: AtomicBool::new(true),
            response: Mutex::new(AuthResponse::Success),
            prompts: AtomicUsize::new(0),
        }
    }
}

impl SimulatedBiometrics {
    pub fn set_hardware(&self, present: bool) {
        self.has_hardware.store(present, Ordering::SeqCst);
    }

    pub fn set_enrolled(&self, enrolled: bool) {
        self.enrolled.store(enrolled, Ordering::SeqCst);
    }

    pub fn set_response(&self, response: AuthResponse) {
        *lock(&self.response) = response;
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricPort for SimulatedBiometrics {
    async fn has_hardware(&self) -> Result<bool> {
        Ok(self.has_hardware.load(Ordering::SeqCst))
    }

    async fn is_enrolled(&self) -> Result<bool> {
        Ok(self.enrolled.load(Ordering::SeqCst))
    }

    async fn authenticate(&self, _prompt: &AuthPrompt) -> Result<AuthResponse> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.response).clone())
    }
}

/// A whole simulated handset.
#[derive(Clone, Default)]
pub struct SimulatedDevice {
    pub camera: Arc<SimulatedCamera>,
    pub sharing: Arc<SimulatedSharing>,
    pub location: Arc<SimulatedLocation>,
    pub urls: Arc<SimulatedUrlOpener>,
    pub notifications: Arc<SimulatedNotifications>,
    pub accelerometer: Arc<SimulatedAccelerometer>,
    pub barometer: Arc<SimulatedBarometer>,
    pub battery: Arc<SimulatedBattery>,
    pub biometrics: Arc<SimulatedBiometrics>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ports(&self) -> super::CapabilityPorts {
        super::CapabilityPorts {
            camera: self.camera.clone(),
            sharing: self.sharing.clone(),
            location: self.location.clone(),
            urls: self.urls.clone(),
            notifications: self.notifications.clone(),
            accelerometer: self.accelerometer.clone(),
            barometer: self.barometer.clone(),
            battery: self.battery.clone(),
            biometrics: self.biometrics.clone(),
        }
    }

    /// Total listeners still registered across every continuous capability.
    pub fn active_listeners(&self) -> usize {
        self.accelerometer.listener_count()
            + self.barometer.listener_count()
            + self.battery.listener_count()
    }

    /// Emits jittery sensor data until `cancel` fires. The accelerometer
    /// ticks at whatever interval the panel configured.
    pub fn drive(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let device = self.clone();
        tokio::spawn(async move {
            let period = device
                .accelerometer
                .update_interval()
                .unwrap_or(Duration::from_millis(100));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks: u64 = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        ticks += 1;
                        device.emit_noise(ticks);
                    }
                    _ = cancel.cancelled() => {
                        info!("simulated sensors stopped after {ticks} ticks");
                        break;
                    }
                }
            }
        })
    }

    fn emit_noise(&self, tick: u64) {
        let mut rng = rand::thread_rng();
        self.accelerometer.emit(AccelerometerSample {
            x: rng.gen_range(-1.2..1.2),
            y: rng.gen_range(-1.0..1.0),
            z: rng.gen_range(-1.05..-0.95),
        });

        if tick % 10 == 0 {
            self.barometer.emit(BarometerSample {
                pressure: 1013.25 + rng.gen_range(-0.5..0.5),
                relative_altitude: Some(rng.gen_range(-0.3..0.3)),
            });
        }

        if tick % 50 == 0 {
            let level = (*lock(&self.battery.level) - 0.01).max(0.0);
            self.battery.set_level(level);
        }
    }
}
