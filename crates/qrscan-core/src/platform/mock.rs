//! Mock camera platform for testing.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::traits::{CameraPlatform, PlatformError};
use crate::device::CameraDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermissionAnswer {
    Grant,
    Deny,
    Unavailable,
}

struct MockState {
    answer: PermissionAnswer,
    devices: Vec<CameraDescriptor>,
    permission_requests: usize,
    enumerations: usize,
}

/// Scriptable platform. Clones share state.
#[derive(Clone)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
    latency: Duration,
}

impl MockPlatform {
    /// A platform that grants permission and reports `devices`.
    pub fn with_devices(devices: Vec<CameraDescriptor>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                answer: PermissionAnswer::Grant,
                devices,
                permission_requests: 0,
                enumerations: 0,
            })),
            latency: Duration::ZERO,
        }
    }

    /// Convenience constructor from `(id, label)` pairs.
    pub fn with_cameras(cameras: &[(&str, &str)]) -> Self {
        Self::with_devices(
            cameras
                .iter()
                .map(|(id, label)| CameraDescriptor::new(*id, *label))
                .collect(),
        )
    }

    /// Delay every platform call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn deny_permission(&self) {
        self.lock().answer = PermissionAnswer::Deny;
    }

    pub fn grant_permission(&self) {
        self.lock().answer = PermissionAnswer::Grant;
    }

    /// Simulate a context without any camera API.
    pub fn make_unavailable(&self) {
        self.lock().answer = PermissionAnswer::Unavailable;
    }

    pub fn set_devices(&self, devices: Vec<CameraDescriptor>) {
        self.lock().devices = devices;
    }

    pub fn permission_requests(&self) -> usize {
        self.lock().permission_requests
    }

    pub fn enumerations(&self) -> usize {
        self.lock().enumerations
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl CameraPlatform for MockPlatform {
    async fn request_permission(&self) -> Result<(), PlatformError> {
        self.simulate_latency().await;

        let mut state = self.lock();
        state.permission_requests += 1;
        match state.answer {
            PermissionAnswer::Grant => Ok(()),
            PermissionAnswer::Deny => Err(PlatformError::PermissionDenied),
            PermissionAnswer::Unavailable => Err(PlatformError::Unavailable(
                "Camera API not available in this context".into(),
            )),
        }
    }

    async fn enumerate(&self) -> Result<Vec<CameraDescriptor>, PlatformError> {
        self.simulate_latency().await;

        let mut state = self.lock();
        state.enumerations += 1;
        Ok(state.devices.clone())
    }
}
