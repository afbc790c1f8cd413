//! Camera platform abstraction.
//!
//! The platform owns the permission prompt and raw device enumeration.
//! Enumeration before a granted permission may withhold labels, so
//! callers go through [`crate::device::DeviceDirectory`].

use std::future::Future;

use thiserror::Error;

use crate::device::CameraDescriptor;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Camera access was refused")]
    PermissionDenied,

    #[error("Camera API not available: {0}")]
    Unavailable(String),

    #[error("Enumeration failed: {0}")]
    EnumerationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract camera platform.
pub trait CameraPlatform: Send + Sync + 'static {
    /// Prompt for camera access. Stays pending until the user answers.
    fn request_permission(&self) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// List camera devices in platform order.
    fn enumerate(&self) -> impl Future<Output = Result<Vec<CameraDescriptor>, PlatformError>> + Send;
}
