use serde::Serialize;
use thiserror::Error;

/// Capabilities that sit behind an explicit user-consent prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Camera,
    Location,
    Notification,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::Camera => "Camera",
            Capability::Location => "Location",
            Capability::Notification => "Notification",
        };
        f.write_str(name)
    }
}

/// Every way a panel action can end without producing a result.
///
/// The `Display` text is exactly what the owning panel shows to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("{0} permission is required")]
    PermissionDenied(Capability),

    #[error("{0}")]
    Unavailable(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Failed: {0}")]
    Failed(String),
}

impl CapabilityError {
    /// Wraps a platform error, keeping only its top-level message.
    pub fn failed(err: impl std::fmt::Display) -> Self {
        let reason = err.to_string();
        if reason.trim().is_empty() {
            CapabilityError::Failed("Unknown error".into())
        } else {
            CapabilityError::Failed(reason)
        }
    }
}
