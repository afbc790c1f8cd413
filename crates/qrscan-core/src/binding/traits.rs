//! Decoder binding abstraction.
//!
//! Defines the `DecoderBinding` trait for the decoding engine,
//! allowing different implementations (rqrr, mock, etc.).

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::config::ScanRegion;

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("Decoder does not support {0}")]
    Unsupported(String),

    #[error("Camera not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to start camera: {0}")]
    StartFailed(String),

    #[error("Decoder is already bound; release it first")]
    AlreadyBound,

    #[error("Image decode failed: {0}")]
    DecodeFailed(String),

    #[error("Failed to release decoder: {0}")]
    ReleaseFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-bind settings for camera mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConfig {
    /// Decode attempts per second.
    pub fps: u32,
    /// Bounding box handed to the decoder to limit the scan area.
    pub scan_region: Option<ScanRegion>,
}

/// A still image picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read an image file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Receives decode callbacks while a camera binding is live.
///
/// Camera mode fires these once per decode attempt, so `on_miss` is
/// expected to be called continuously while nothing is in frame.
pub trait DecodeHandler: Send + Sync {
    fn on_decode(&self, text: &str);

    fn on_miss(&self, message: &str);
}

/// Abstract decoding engine bound to one input source at a time.
///
/// Camera mode and image mode are mutually exclusive: a binding must be
/// released before it can be bound again.
pub trait DecoderBinding: Send + Sync + 'static {
    /// Bind to a camera and keep invoking `handler` until released.
    fn bind(
        &self,
        device_id: &str,
        config: &CameraConfig,
        handler: Arc<dyn DecodeHandler>,
    ) -> impl Future<Output = Result<(), BindingError>> + Send;

    /// Decode a single still image. `Ok(None)` means no code was found.
    fn bind_to_image(
        &self,
        file: &ImageFile,
    ) -> impl Future<Output = Result<Option<String>, BindingError>> + Send;

    /// Stop any camera stream and free the instance. Idempotent.
    fn release(&self) -> impl Future<Output = Result<(), BindingError>> + Send;

    /// Whether this engine can scan still images.
    fn supports_image_mode(&self) -> bool {
        true
    }
}

/// Lazily constructs the session's single binding instance.
pub type BindingFactory<B> = Box<dyn Fn() -> Result<B, BindingError> + Send + Sync>;
