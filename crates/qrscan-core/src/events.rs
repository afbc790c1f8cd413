//! Event system for UI decoupling.
//!
//! Allows CLI/TUI hosts to subscribe to session events without
//! tight coupling to the core logic. `Decoded` and `DecodeMiss` are the
//! outbound success/failure notifications.

use crate::device::CameraDescriptor;
use crate::error::ErrorKind;
use crate::sink::DecodedResult;
use crate::state::SessionStatus;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Events emitted by the scanning session.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Status changed.
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// Cameras listed after a permission grant.
    DevicesListed {
        devices: Vec<CameraDescriptor>,
        selected: String,
    },
    /// Camera bound and streaming.
    CameraStarted { device_id: String },
    /// Camera released.
    CameraStopped { device_id: String },
    /// New payload decoded (outbound success).
    Decoded(DecodedResult),
    /// Decode attempt without a result (outbound failure, low severity).
    DecodeMiss { message: String },
    /// Log message.
    Log { level: LogLevel, message: String },
    /// Error surfaced to the user; replaces any earlier one.
    Error { kind: ErrorKind, message: String },
    /// User interaction cleared the error slot.
    ErrorCleared,
}

/// Observer trait for receiving session events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait ScanObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &ScanEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl ScanObserver for NullObserver {
    fn on_event(&self, _event: &ScanEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl ScanObserver for TracingObserver {
    fn on_event(&self, event: &ScanEvent) {
        match event {
            ScanEvent::StatusChanged { from, to } => {
                tracing::debug!(from = %from, to = %to, "Status changed");
            }
            ScanEvent::DevicesListed { devices, selected } => {
                tracing::info!(count = devices.len(), selected = %selected, "Cameras listed");
            }
            ScanEvent::CameraStarted { device_id } => {
                tracing::info!(device = %device_id, "Camera started");
            }
            ScanEvent::CameraStopped { device_id } => {
                tracing::info!(device = %device_id, "Camera stopped");
            }
            ScanEvent::Decoded(result) => {
                tracing::info!(text = %result.text, "QR decoded");
            }
            ScanEvent::DecodeMiss { message } => {
                tracing::trace!(reason = %message, "Decode miss");
            }
            ScanEvent::Log { level, message } => match level {
                LogLevel::Trace => tracing::trace!("{}", message),
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            ScanEvent::Error { kind, message } => {
                if kind.is_recoverable() {
                    tracing::info!(kind = %kind, "{}", message);
                } else {
                    tracing::error!(kind = %kind, "Error: {}", message);
                }
            }
            ScanEvent::ErrorCleared => {}
        }
    }
}

/// Collects events in memory. Used by tests and polling hosts.
#[derive(Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<ScanEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ScanEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take all events recorded so far.
    pub fn drain(&self) -> Vec<ScanEvent> {
        self.lock().drain(..).collect()
    }

    pub fn events(&self) -> Vec<ScanEvent> {
        self.lock().clone()
    }

    /// Payloads delivered as outbound success notifications, in order.
    pub fn decoded_texts(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Decoded(result) => Some(result.text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Kinds of surfaced errors, in order.
    pub fn error_kinds(&self) -> Vec<ErrorKind> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Error { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }
}

impl ScanObserver for RecordingObserver {
    fn on_event(&self, event: &ScanEvent) {
        self.lock().push(event.clone());
    }
}
