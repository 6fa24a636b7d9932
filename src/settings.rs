use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::platform::{
    AuthPrompt, CaptureOptions, MediaKind, NotificationRequest, NotificationTrigger,
    PlatformFamily,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraSettings {
    pub allows_editing: bool,
    pub quality: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            allows_editing: true,
            quality: 0.8,
        }
    }
}

impl CameraSettings {
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            allows_editing: self.allows_editing,
            quality: self.quality.clamp(0.0, 1.0),
            media: MediaKind::Images,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub title: String,
    pub body: String,
    pub delay_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            title: "⏰ Reminder".into(),
            body: "This is your 5s reminder!".into(),
            delay_secs: 5,
        }
    }
}

impl NotificationSettings {
    pub fn request(&self) -> NotificationRequest {
        NotificationRequest {
            title: self.title.clone(),
            body: self.body.clone(),
            trigger: NotificationTrigger::TimeInterval {
                seconds: self.delay_secs,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct BiometricSettings {
    pub prompt_message: String,
    pub cancel_label: String,
    pub fallback_label: String,
    pub disable_device_fallback: bool,
}

impl Default for BiometricSettings {
    fn default() -> Self {
        Self {
            prompt_message: "Authenticate".into(),
            cancel_label: "Cancel".into(),
            fallback_label: "Use Passcode".into(),
            disable_device_fallback: false,
        }
    }
}

impl BiometricSettings {
    pub fn prompt(&self) -> AuthPrompt {
        AuthPrompt {
            prompt_message: self.prompt_message.clone(),
            cancel_label: self.cancel_label.clone(),
            fallback_label: self.fallback_label.clone(),
            disable_device_fallback: self.disable_device_fallback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureSettings {
    pub platform: PlatformFamily,
    pub accelerometer_interval_ms: u64,
    pub camera: CameraSettings,
    pub notification: NotificationSettings,
    pub biometric: BiometricSettings,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            platform: PlatformFamily::default(),
            accelerometer_interval_ms: 100,
            camera: CameraSettings::default(),
            notification: NotificationSettings::default(),
            biometric: BiometricSettings::default(),
        }
    }
}

impl FeatureSettings {
    pub fn accelerometer_interval(&self) -> Duration {
        Duration::from_millis(self.accelerometer_interval_ms.max(1))
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<FeatureSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings in {}: {err}", path.display());
                FeatureSettings::default()
            })
        } else {
            FeatureSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> FeatureSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: FeatureSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &FeatureSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
