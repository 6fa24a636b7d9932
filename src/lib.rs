mod utils;

pub mod error;
pub mod lifecycle;
pub mod panels;
pub mod platform;
pub mod screen;
pub mod settings;

use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Result};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

pub use error::{Capability, CapabilityError};
pub use panels::{ActionOutcome, FeatureAction, Panel, PanelView};
pub use platform::{CapabilityPorts, PlatformFamily};
pub use screen::{FeaturesScreen, ScreenSnapshot};
pub use settings::{FeatureSettings, SettingsStore};

use platform::simulated::SimulatedDevice;

/// Environment variable naming the settings file when `--settings` is absent.
pub const SETTINGS_ENV: &str = "FEATUREBOARD_SETTINGS";

/// Options for a demo session on the simulated device.
#[derive(Debug, Clone, Default)]
pub struct DemoOptions {
    pub settings_path: Option<PathBuf>,
    pub platform: Option<PlatformFamily>,
    pub run_for: Duration,
    pub actions: Vec<FeatureAction>,
}

pub fn init_logging() {
    // Reads RUST_LOG; falls back to info.
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

fn load_settings(options: &DemoOptions) -> Result<FeatureSettings> {
    let path = options
        .settings_path
        .clone()
        .or_else(|| std::env::var_os(SETTINGS_ENV).map(PathBuf::from));

    let mut settings = match path {
        Some(path) => SettingsStore::new(path)?.current(),
        None => FeatureSettings::default(),
    };
    if let Some(platform) = options.platform {
        settings.platform = platform;
    }
    Ok(settings)
}

/// Mounts the features screen on a simulated device, lets the sensors run,
/// performs the requested actions and returns the final snapshot.
pub async fn run_demo(options: DemoOptions) -> Result<ScreenSnapshot> {
    let settings = load_settings(&options)?;
    info!("featureboard starting up on {:?}", settings.platform);

    let device = SimulatedDevice::new();
    let screen = FeaturesScreen::new(device.ports(), &settings);
    screen.mount().await?;

    let stop_sensors = CancellationToken::new();
    let driver = device.drive(stop_sensors.clone());

    for action in &options.actions {
        if let ActionOutcome::Failed(err) = screen.dispatch(*action).await {
            warn!("{action:?} failed: {err}");
        }
    }

    tokio::time::sleep(options.run_for).await;
    let snapshot = screen.snapshot();

    screen.unmount();
    stop_sensors.cancel();
    driver.await?;

    let leaked = device.active_listeners();
    if leaked != 0 {
        bail!("{leaked} listener(s) still registered after unmount");
    }
    Ok(snapshot)
}
