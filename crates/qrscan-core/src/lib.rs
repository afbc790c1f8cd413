//! QRScan-Core: scanning session controller for QR codes.
//!
//! This crate drives a QR decoding engine against live cameras and still
//! images, with every camera transition serialized so a decoder is never
//! bound twice.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Binding**: Decoder engine abstraction (rqrr over file-backed cameras, mock)
//! - **Platform**: Camera permission and enumeration (directory, mock)
//! - **Device**: Device directory and default camera selection
//! - **State**: Session status graph and transition guard
//! - **Sink**: Per-session dedupe of decoded payloads
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: Serialized orchestrator
//! - **Host**: Widget lifecycle and UI event routing
//!
//! # Example
//!
//! ```no_run
//! use qrscan_core::{BindingFactory, DirectoryPlatform, RqrrBinding, ScanSession, SessionConfig};
//!
//! # async fn run() {
//! let factory: BindingFactory<RqrrBinding> = Box::new(|| Ok(RqrrBinding::new("cameras")));
//! let session = ScanSession::new(
//!     SessionConfig::default(),
//!     DirectoryPlatform::new("cameras"),
//!     factory,
//! );
//!
//! let snapshot = session.initialize().await;
//! println!("status: {}", snapshot.status);
//! session.teardown().await;
//! # }
//! ```

pub mod audio;
pub mod binding;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod host;
pub mod platform;
pub mod session;
pub mod sink;
pub mod state;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use audio::{AudioCue, CountingCue, Silent};
pub use binding::{
    BindingError, BindingFactory, CameraConfig, DecodeHandler, DecoderBinding, ImageFile,
    MockBinding, RqrrBinding,
};
pub use config::{ScanRegion, SessionConfig};
pub use device::{CameraDescriptor, DeviceDirectory, next_index, pick_default};
pub use error::{ErrorKind, ScanError};
pub use events::{LogLevel, NullObserver, RecordingObserver, ScanEvent, ScanObserver, TracingObserver};
pub use host::{HostAction, ScannerWidget, UiEvent};
pub use platform::{CameraPlatform, DirectoryPlatform, MockPlatform, PlatformError};
pub use session::{ScanSession, SessionSnapshot, SurfacedError};
pub use sink::{DecodedResult, ScanEventSink};
pub use state::SessionStatus;
