//! Camera device directory.
//!
//! Wraps a [`CameraPlatform`] with the permission-before-enumeration rule
//! and the default camera heuristic.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::ScanError;
use crate::platform::CameraPlatform;

/// Label fragments that identify a rear-facing camera.
const BACK_CAMERA_HINTS: &[&str] = &["back", "rear", "environment"];

/// A discovered camera.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraDescriptor {
    /// Opaque id used to (re)bind the camera.
    pub id: String,
    /// Human label. May be empty when the platform withholds it.
    pub label: String,
}

impl CameraDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Label for display, falling back to "Camera N" (1-based).
    pub fn display_label(&self, index: usize) -> String {
        if self.label.is_empty() {
            format!("Camera {}", index + 1)
        } else {
            self.label.clone()
        }
    }

    /// Whether the label suggests a rear-facing camera.
    pub fn looks_rear_facing(&self) -> bool {
        let label = self.label.to_lowercase();
        BACK_CAMERA_HINTS.iter().any(|hint| label.contains(hint))
    }
}

impl fmt::Display for CameraDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.label, self.id)
        }
    }
}

/// Pick the default camera: the first rear-facing one in enumeration
/// order, else the first device.
pub fn pick_default(devices: &[CameraDescriptor]) -> Option<&CameraDescriptor> {
    devices
        .iter()
        .find(|d| d.looks_rear_facing())
        .or_else(|| devices.first())
}

/// Index after `current` when cycling through `len` devices, wrapping to
/// the first after the last. With no current selection the first device
/// is next.
pub fn next_index(current: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match current {
        Some(i) => (i + 1) % len,
        None => 0,
    })
}

/// Queries cameras through the platform.
pub struct DeviceDirectory<P: CameraPlatform> {
    platform: P,
    granted: AtomicBool,
}

impl<P: CameraPlatform> DeviceDirectory<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            granted: AtomicBool::new(false),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn permission_granted(&self) -> bool {
        self.granted.load(Ordering::Acquire)
    }

    /// Ask the platform for camera access.
    #[instrument(skip(self))]
    pub async fn request_permission(&self) -> Result<(), ScanError> {
        match self.platform.request_permission().await {
            Ok(()) => {
                self.granted.store(true, Ordering::Release);
                info!("Camera permission granted");
                Ok(())
            }
            Err(e) => {
                self.granted.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// List cameras. Requires a prior successful permission request.
    #[instrument(skip(self))]
    pub async fn list_cameras(&self) -> Result<Vec<CameraDescriptor>, ScanError> {
        if !self.permission_granted() {
            return Err(ScanError::PermissionDenied);
        }

        let devices = self.platform.enumerate().await?;
        if devices.is_empty() {
            return Err(ScanError::NoDevicesFound);
        }

        debug!(count = devices.len(), "Cameras listed");
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockPlatform;

    fn cams(pairs: &[(&str, &str)]) -> Vec<CameraDescriptor> {
        pairs
            .iter()
            .map(|(id, label)| CameraDescriptor::new(*id, *label))
            .collect()
    }

    #[test]
    fn test_pick_default_prefers_back_camera() {
        let devices = cams(&[("1", "Front"), ("2", "Back Camera")]);
        assert_eq!(pick_default(&devices).map(|d| d.id.as_str()), Some("2"));
    }

    #[test]
    fn test_pick_default_single_device() {
        let devices = cams(&[("1", "Camera 1")]);
        assert_eq!(pick_default(&devices).map(|d| d.id.as_str()), Some("1"));
    }

    #[test]
    fn test_pick_default_first_rear_match_wins() {
        let devices = cams(&[
            ("1", "Front"),
            ("2", "camera2 1, facing environment"),
            ("3", "Rear Wide"),
        ]);
        assert_eq!(pick_default(&devices).map(|d| d.id.as_str()), Some("2"));
    }

    #[test]
    fn test_pick_default_empty() {
        assert!(pick_default(&[]).is_none());
    }

    #[test]
    fn test_next_index_wraps() {
        assert_eq!(next_index(Some(2), 3), Some(0));
        assert_eq!(next_index(Some(0), 3), Some(1));
        assert_eq!(next_index(None, 3), Some(0));
        assert_eq!(next_index(Some(0), 1), Some(0));
        assert_eq!(next_index(None, 0), None);
    }

    #[test]
    fn test_display_label_fallback() {
        assert_eq!(CameraDescriptor::new("x", "").display_label(1), "Camera 2");
        assert_eq!(CameraDescriptor::new("x", "USB").display_label(1), "USB");
    }

    #[tokio::test]
    async fn test_list_requires_permission() {
        let directory = DeviceDirectory::new(MockPlatform::with_cameras(&[("1", "Front")]));
        assert_eq!(
            directory.list_cameras().await,
            Err(ScanError::PermissionDenied)
        );
        assert_eq!(directory.platform().enumerations(), 0);

        directory.request_permission().await.unwrap();
        assert_eq!(directory.list_cameras().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_empty_is_no_devices() {
        let directory = DeviceDirectory::new(MockPlatform::with_devices(Vec::new()));
        directory.request_permission().await.unwrap();
        assert_eq!(
            directory.list_cameras().await,
            Err(ScanError::NoDevicesFound)
        );
    }

    #[tokio::test]
    async fn test_denied_permission() {
        let platform = MockPlatform::with_cameras(&[("1", "Front")]);
        platform.deny_permission();
        let directory = DeviceDirectory::new(platform);

        assert_eq!(
            directory.request_permission().await,
            Err(ScanError::PermissionDenied)
        );
        assert!(!directory.permission_granted());
    }
}
