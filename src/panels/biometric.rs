use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;

use super::{ActionOutcome, ActionView, FeatureAction, Panel, PanelKind, PanelView};
use crate::error::CapabilityError;
use crate::lifecycle::{lock, PanelLifecycle};
use crate::platform::{AuthPrompt, AuthResponse, BiometricPort};

const NO_BIOMETRICS: &str = "No biometric hardware or no biometrics enrolled";

/// Result of the latest authentication attempt.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "outcome", content = "reason")]
pub enum AuthOutcome {
    Success,
    Failed(String),
    Unavailable(String),
}

impl AuthOutcome {
    pub fn message(&self) -> String {
        match self {
            AuthOutcome::Success => "Authenticated ✅".to_string(),
            AuthOutcome::Failed(reason) => CapabilityError::Failed(reason.clone()).to_string(),
            AuthOutcome::Unavailable(reason) => reason.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BiometricPanel {
    biometrics: Arc<dyn BiometricPort>,
    prompt: AuthPrompt,
    outcome: Arc<Mutex<Option<AuthOutcome>>>,
    lifecycle: PanelLifecycle,
}

impl BiometricPanel {
    pub fn new(biometrics: Arc<dyn BiometricPort>, prompt: AuthPrompt) -> Self {
        Self {
            biometrics,
            prompt,
            outcome: Arc::new(Mutex::new(None)),
            lifecycle: PanelLifecycle::new(),
        }
    }

    pub fn outcome(&self) -> Option<AuthOutcome> {
        lock(&self.outcome).clone()
    }

    /// Prompts for Face ID / Touch ID / fingerprint, if the device can.
    pub async fn authenticate(&self) -> ActionOutcome {
        let Some(token) = self.lifecycle.token() else {
            return ActionOutcome::Skipped;
        };

        let (outcome, result) = match self.usable().await {
            Err(err) => (
                AuthOutcome::Failed(reason_of(&err)),
                ActionOutcome::Failed(err),
            ),
            Ok(false) => (
                AuthOutcome::Unavailable(NO_BIOMETRICS.into()),
                ActionOutcome::Failed(CapabilityError::Unavailable(NO_BIOMETRICS.into())),
            ),
            Ok(true) => match self.biometrics.authenticate(&self.prompt).await {
                Ok(AuthResponse::Success) => (AuthOutcome::Success, ActionOutcome::Completed),
                Ok(AuthResponse::Failure { error }) => {
                    let reason = error
                        .filter(|reason| !reason.trim().is_empty())
                        .unwrap_or_else(|| "Unknown error".into());
                    (
                        AuthOutcome::Failed(reason.clone()),
                        ActionOutcome::Failed(CapabilityError::Failed(reason)),
                    )
                }
                Err(err) => {
                    warn!("biometric prompt errored: {err:#}");
                    let err = CapabilityError::failed(err);
                    (AuthOutcome::Failed(reason_of(&err)), ActionOutcome::Failed(err))
                }
            },
        };

        info!("authentication: {}", outcome.message());
        if token.commit(|| *lock(&self.outcome) = Some(outcome)) {
            result
        } else {
            ActionOutcome::Discarded
        }
    }

    async fn usable(&self) -> Result<bool, CapabilityError> {
        let has_hardware = self
            .biometrics
            .has_hardware()
            .await
            .map_err(CapabilityError::failed)?;
        let enrolled = self
            .biometrics
            .is_enrolled()
            .await
            .map_err(CapabilityError::failed)?;
        Ok(has_hardware && enrolled)
    }
}

fn reason_of(err: &CapabilityError) -> String {
    match err {
        CapabilityError::Failed(reason) => reason.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Panel for BiometricPanel {
    fn kind(&self) -> PanelKind {
        PanelKind::Biometric
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
        PanelView {
            kind: PanelKind::Biometric,
            title: "Authenticate (Biometrics)",
            subtitle: None,
            lines: self.outcome().map(|o| o.message()).into_iter().collect(),
            actions: vec![ActionView {
                action: FeatureAction::Authenticate,
                label: "Authenticate",
                enabled: true,
            }],
            caption: "Uses Face ID / Touch ID / Android biometrics.",
        }
    }
}
