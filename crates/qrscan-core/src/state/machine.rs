//! State machine for the scanning session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::CameraDescriptor;
use crate::error::ErrorKind;

/// Session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SessionStatus {
    /// Nothing bound.
    #[default]
    Idle,
    /// Waiting for the user to answer the camera prompt.
    RequestingPermission,
    /// Enumerating cameras.
    ListingDevices,
    /// A camera is bound and streaming to the decoder.
    CameraActive,
    /// The decoder is bound to a still image.
    ImageScanning,
    /// Releasing the decoder.
    Stopping,
    /// Fatal for camera mode until the user retries.
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "Idle"),
            SessionStatus::RequestingPermission => write!(f, "Requesting Permission"),
            SessionStatus::ListingDevices => write!(f, "Listing Devices"),
            SessionStatus::CameraActive => write!(f, "Camera Active"),
            SessionStatus::ImageScanning => write!(f, "Image Scanning"),
            SessionStatus::Stopping => write!(f, "Stopping"),
            SessionStatus::Error => write!(f, "Error"),
        }
    }
}

impl SessionStatus {
    /// Whether the decoder may be live in this status.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::CameraActive | SessionStatus::ImageScanning)
    }

    /// Whether moving to `next` follows the session's state graph.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;

        if next == Error {
            return true;
        }
        match self {
            Idle => matches!(next, RequestingPermission | CameraActive | ImageScanning),
            RequestingPermission => matches!(next, ListingDevices | Idle),
            ListingDevices => matches!(next, CameraActive | Idle),
            CameraActive => matches!(next, Stopping),
            ImageScanning => matches!(next, Stopping | CameraActive | Idle),
            Stopping => matches!(next, Idle),
            Error => matches!(
                next,
                Idle | RequestingPermission | CameraActive | ImageScanning | Stopping
            ),
        }
    }
}

/// What the decoder binding is currently bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundMode {
    Camera(String),
    Image,
}

/// A mutating operation about to run through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    /// Bind a camera. `force` restarts it even if it is already active.
    Start { device_id: &'a str, force: bool },
    Stop,
    ScanImage,
    Teardown,
}

/// The minimal stop/release sequence an operation needs first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionGuard {
    /// Nothing to do: the requested state already holds.
    pub skip: bool,
    /// Release the live binding before proceeding.
    pub release_first: bool,
    /// Camera to rebind once the operation completes.
    pub resume_device: Option<String>,
}

/// State machine context holding all session state.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Current status.
    pub status: SessionStatus,
    /// Camera currently bound.
    pub active_device_id: Option<String>,
    /// Cameras found at the last permission grant.
    pub devices: Vec<CameraDescriptor>,
    /// Live binding, if any. Source of truth for the transition guard.
    pub bound: Option<BoundMode>,
    /// Kind of the most recent surfaced error.
    pub last_error: Option<ErrorKind>,
    /// Set once the session is torn down.
    pub closed: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition to a new status. Returns the previous one.
    pub fn goto_status(&mut self, next: SessionStatus) -> SessionStatus {
        let prev = self.status;
        if prev == next {
            return prev;
        }
        if !prev.can_transition_to(next) {
            tracing::warn!(from = %prev, to = %next, "Unexpected status transition");
        }
        tracing::info!(from = %prev, to = %next, "Status transition");
        self.status = next;
        prev
    }

    pub fn knows_device(&self, device_id: &str) -> bool {
        self.devices.iter().any(|d| d.id == device_id)
    }

    pub fn device_index(&self, device_id: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.id == device_id)
    }

    /// Camera currently streaming, if the binding is in camera mode.
    pub fn live_camera(&self) -> Option<&str> {
        match &self.bound {
            Some(BoundMode::Camera(id)) => Some(id),
            _ => None,
        }
    }

    /// Compute what must be released before `op` can run.
    pub fn guard(&self, op: Operation<'_>) -> TransitionGuard {
        let release_first = self.bound.is_some();
        match op {
            Operation::Start { device_id, force } => {
                let already_active = self.live_camera() == Some(device_id)
                    && self.status == SessionStatus::CameraActive;
                TransitionGuard {
                    skip: already_active && !force,
                    release_first,
                    resume_device: None,
                }
            }
            Operation::Stop => TransitionGuard {
                skip: !release_first,
                release_first,
                resume_device: None,
            },
            Operation::ScanImage => TransitionGuard {
                skip: false,
                release_first,
                resume_device: self.live_camera().map(str::to_string),
            },
            Operation::Teardown => TransitionGuard {
                skip: false,
                release_first,
                resume_device: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_state(id: &str) -> SessionState {
        SessionState {
            status: SessionStatus::CameraActive,
            active_device_id: Some(id.to_string()),
            devices: vec![
                CameraDescriptor::new("a", "Front"),
                CameraDescriptor::new("b", "Back"),
            ],
            bound: Some(BoundMode::Camera(id.to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn test_any_state_can_fail() {
        for status in [
            SessionStatus::Idle,
            SessionStatus::RequestingPermission,
            SessionStatus::ListingDevices,
            SessionStatus::CameraActive,
            SessionStatus::ImageScanning,
            SessionStatus::Stopping,
        ] {
            assert!(status.can_transition_to(SessionStatus::Error));
        }
    }

    #[test]
    fn test_stopping_only_returns_to_idle() {
        assert!(SessionStatus::Stopping.can_transition_to(SessionStatus::Idle));
        assert!(!SessionStatus::Stopping.can_transition_to(SessionStatus::CameraActive));
        assert!(!SessionStatus::CameraActive.can_transition_to(SessionStatus::Idle));
    }

    #[test]
    fn test_start_same_device_is_skipped() {
        let state = camera_state("a");
        let guard = state.guard(Operation::Start {
            device_id: "a",
            force: false,
        });
        assert!(guard.skip);
    }

    #[test]
    fn test_forced_start_same_device_releases() {
        let state = camera_state("a");
        let guard = state.guard(Operation::Start {
            device_id: "a",
            force: true,
        });
        assert!(!guard.skip);
        assert!(guard.release_first);
    }

    #[test]
    fn test_start_other_device_releases_first() {
        let state = camera_state("a");
        let guard = state.guard(Operation::Start {
            device_id: "b",
            force: false,
        });
        assert!(!guard.skip);
        assert!(guard.release_first);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let guard = SessionState::new().guard(Operation::Stop);
        assert!(guard.skip);
        assert!(!guard.release_first);
    }

    #[test]
    fn test_scan_image_resumes_live_camera() {
        let guard = camera_state("b").guard(Operation::ScanImage);
        assert!(guard.release_first);
        assert_eq!(guard.resume_device.as_deref(), Some("b"));

        let guard = SessionState::new().guard(Operation::ScanImage);
        assert!(!guard.release_first);
        assert_eq!(guard.resume_device, None);
    }

    #[test]
    fn test_goto_status_returns_previous() {
        let mut state = SessionState::new();
        assert_eq!(
            state.goto_status(SessionStatus::RequestingPermission),
            SessionStatus::Idle
        );
        assert_eq!(state.status, SessionStatus::RequestingPermission);
    }
}
