use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;

use super::{
    ensure_permission, record_failure, ActionOutcome, ActionView, FeatureAction, Panel,
    PanelKind, PanelView,
};
use crate::error::{Capability, CapabilityError};
use crate::lifecycle::{lock, PanelLifecycle};
use crate::platform::{NotificationPort, NotificationRequest, NotificationTrigger};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationState {
    pub last_scheduled_id: Option<String>,
    pub message: Option<String>,
}

/// Schedules a local reminder a fixed number of seconds out.
#[derive(Clone)]
pub struct NotificationPanel {
    notifications: Arc<dyn NotificationPort>,
    request: NotificationRequest,
    state: Arc<Mutex<NotificationState>>,
    lifecycle: PanelLifecycle,
}

impl NotificationPanel {
    pub fn new(notifications: Arc<dyn NotificationPort>, request: NotificationRequest) -> Self {
        Self {
            notifications,
            request,
            state: Arc::new(Mutex::new(NotificationState::default())),
            lifecycle: PanelLifecycle::new(),
        }
    }

    pub fn state(&self) -> NotificationState {
        lock(&self.state).clone()
    }

    pub async fn schedule(&self) -> ActionOutcome {
        let Some(token) = self.lifecycle.token() else {
            return ActionOutcome::Skipped;
        };

        if let Err(err) =
            ensure_permission(self.notifications.as_ref(), Capability::Notification).await
        {
            return record_failure(&token, err, |message| self.set_message(message));
        }

        match self.notifications.schedule(&self.request).await {
            Ok(id) => {
                info!("scheduled notification {id}");
                let message = confirmation(&self.request.trigger);
                let committed = token.commit(|| {
                    let mut state = lock(&self.state);
                    state.last_scheduled_id = Some(id);
                    state.message = Some(message);
                });
                if committed {
                    ActionOutcome::Completed
                } else {
                    ActionOutcome::Discarded
                }
            }
            Err(err) => {
                warn!("scheduling failed: {err:#}");
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

fn confirmation(trigger: &NotificationTrigger) -> String {
    match trigger {
        NotificationTrigger::TimeInterval { seconds } => {
            format!("Scheduled a local notification for {seconds} seconds from now")
        }
    }
}

#[async_trait]
impl Panel for NotificationPanel {
    fn kind(&self) -> PanelKind {
        PanelKind::Notification
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
            kind: PanelKind::Notification,
            title: "Remind me later",
            subtitle: None,
            lines: self.state().message.into_iter().collect(),
            actions: vec![ActionView {
                action: FeatureAction::Notify,
                label: "Schedule notification",
                enabled: true,
            }],
            caption: "Uses local notifications; permissions prompted as needed.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::SimulatedNotifications;
    use crate::platform::PermissionStatus;
    use crate::settings::NotificationSettings;

    fn panel() -> (NotificationPanel, Arc<SimulatedNotifications>) {
        let notifications = Arc::new(SimulatedNotifications::default());
        let panel =
            NotificationPanel::new(notifications.clone(), NotificationSettings::default().request());
        (panel, notifications)
    }

    #[tokio::test]
    async fn schedules_after_permission_is_granted() {
        let (panel, notifications) = panel();
        panel.mount().await.unwrap();

        assert_eq!(panel.schedule().await, ActionOutcome::Completed);

        assert_eq!(notifications.permission.requests(), 1);
        let scheduled = notifications.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(
            scheduled[0].trigger,
            NotificationTrigger::TimeInterval { seconds: 5 }
        );
        let state = panel.state();
        assert!(state.last_scheduled_id.is_some());
        assert_eq!(
            state.message.as_deref(),
            Some("Scheduled a local notification for 5 seconds from now")
        );
    }

    #[tokio::test]
    async fn denial_schedules_nothing() {
        let (panel, notifications) = panel();
        notifications.permission.set_answer(PermissionStatus::Denied);
        panel.mount().await.unwrap();

        let outcome = panel.schedule().await;

        assert_eq!(
            outcome,
            ActionOutcome::Failed(CapabilityError::PermissionDenied(Capability::Notification))
        );
        assert!(notifications.scheduled().is_empty());
        assert_eq!(
            panel.view().lines,
            vec!["Notification permission is required".to_string()]
        );
    }

    #[tokio::test]
    async fn unmounted_panel_does_not_prompt() {
        let (panel, notifications) = panel();

        assert_eq!(panel.schedule().await, ActionOutcome::Skipped);
        assert_eq!(notifications.permission.requests(), 0);
    }
}
