//! Error taxonomy for the scanning session.
//!
//! Every failure coming out of the platform or the decoder binding is
//! classified into a [`ScanError`] at the session boundary. The coarse
//! [`ErrorKind`] is what the UI keys off (retry affordances, severity).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binding::BindingError;
use crate::platform::PlatformError;

/// Coarse classification of a surfaced error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    PermissionDenied,
    NoDevicesFound,
    NoFileSelected,
    EmptyDecodeResult,
    UnsupportedDecoderCapability,
    BindingError,
    UnknownDevice,
    SessionClosed,
}

impl ErrorKind {
    /// Informational conditions that do not interrupt scanning.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::NoFileSelected | ErrorKind::EmptyDecodeResult)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::PermissionDenied => write!(f, "Permission Denied"),
            ErrorKind::NoDevicesFound => write!(f, "No Devices Found"),
            ErrorKind::NoFileSelected => write!(f, "No File Selected"),
            ErrorKind::EmptyDecodeResult => write!(f, "Empty Decode Result"),
            ErrorKind::UnsupportedDecoderCapability => write!(f, "Unsupported Decoder Capability"),
            ErrorKind::BindingError => write!(f, "Binding Error"),
            ErrorKind::UnknownDevice => write!(f, "Unknown Device"),
            ErrorKind::SessionClosed => write!(f, "Session Closed"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("camera access is blocked")]
    PermissionDenied,

    #[error("no cameras found")]
    NoDevicesFound,

    #[error("no file selected")]
    NoFileSelected,

    #[error("no QR code found in image (or empty result)")]
    EmptyDecodeResult,

    #[error("{0}")]
    UnsupportedDecoderCapability(String),

    #[error("{0}")]
    Binding(String),

    #[error("unknown camera: {0}")]
    UnknownDevice(String),

    #[error("scanning session has been torn down")]
    SessionClosed,
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::PermissionDenied => ErrorKind::PermissionDenied,
            ScanError::NoDevicesFound => ErrorKind::NoDevicesFound,
            ScanError::NoFileSelected => ErrorKind::NoFileSelected,
            ScanError::EmptyDecodeResult => ErrorKind::EmptyDecodeResult,
            ScanError::UnsupportedDecoderCapability(_) => ErrorKind::UnsupportedDecoderCapability,
            ScanError::Binding(_) => ErrorKind::BindingError,
            ScanError::UnknownDevice(_) => ErrorKind::UnknownDevice,
            ScanError::SessionClosed => ErrorKind::SessionClosed,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }
}

impl From<BindingError> for ScanError {
    fn from(err: BindingError) -> Self {
        match err {
            BindingError::Unsupported(what) => ScanError::UnsupportedDecoderCapability(what),
            other => ScanError::Binding(other.to_string()),
        }
    }
}

impl From<PlatformError> for ScanError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::PermissionDenied => ScanError::PermissionDenied,
            other => ScanError::Binding(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(ScanError::NoFileSelected.is_recoverable());
        assert!(ScanError::EmptyDecodeResult.is_recoverable());
        assert!(!ScanError::PermissionDenied.is_recoverable());
        assert!(!ScanError::Binding("boom".into()).is_recoverable());
    }

    #[test]
    fn test_binding_error_classification() {
        let unsupported: ScanError = BindingError::Unsupported("image scanning".into()).into();
        assert_eq!(unsupported.kind(), ErrorKind::UnsupportedDecoderCapability);
        assert_eq!(unsupported.to_string(), "image scanning");

        let failed: ScanError = BindingError::StartFailed("device busy".into()).into();
        assert_eq!(failed.kind(), ErrorKind::BindingError);
        assert!(failed.to_string().contains("device busy"));
    }

    #[test]
    fn test_platform_error_classification() {
        let denied: ScanError = PlatformError::PermissionDenied.into();
        assert_eq!(denied, ScanError::PermissionDenied);

        let missing: ScanError = PlatformError::Unavailable("no camera API".into()).into();
        assert_eq!(missing.kind(), ErrorKind::BindingError);
    }
}
