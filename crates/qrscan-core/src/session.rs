//! Scanning session - serialized controller for the camera and decoder.
//!
//! Every mutating operation runs under one FIFO lock (the transition
//! pipeline), so an operation only starts once the previous one has fully
//! settled, including permission prompts, binds and releases. Decode
//! callbacks never touch that lock; they go through the scan event sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, trace, warn};

use crate::audio::{AudioCue, Silent};
use crate::binding::{BindingFactory, DecodeHandler, DecoderBinding, ImageFile};
use crate::config::SessionConfig;
use crate::device::{CameraDescriptor, DeviceDirectory, next_index, pick_default};
use crate::error::{ErrorKind, ScanError};
use crate::events::{LogLevel, ScanEvent, ScanObserver, TracingObserver};
use crate::platform::CameraPlatform;
use crate::sink::{DecodedResult, ScanEventSink};
use crate::state::{BoundMode, Operation, SessionState, SessionStatus};

/// Error shown in the user-visible error slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfacedError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Read-only view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub active_device_id: Option<String>,
    pub devices: Vec<CameraDescriptor>,
    pub last_error: Option<ErrorKind>,
    pub seen_payloads: usize,
    pub closed: bool,
}

/// State guarded by the transition pipeline.
struct Pipeline<B> {
    state: SessionState,
    /// Created lazily on first use, then reused across modes.
    binding: Option<B>,
}

struct Shared<B: DecoderBinding, P: CameraPlatform, O: ScanObserver> {
    config: SessionConfig,
    directory: DeviceDirectory<P>,
    factory: BindingFactory<B>,
    observer: Arc<O>,
    audio: Mutex<Arc<dyn AudioCue>>,
    pipeline: AsyncMutex<Pipeline<B>>,
    sink: Mutex<ScanEventSink>,
    error_slot: Mutex<Option<SurfacedError>>,
    /// Generation of the registered decode handler. Bumped on every
    /// release so callbacks from a released binding are dropped.
    generation: AtomicU64,
}

/// Scanning session controller. Cheap to clone; clones share the session.
pub struct ScanSession<B: DecoderBinding, P: CameraPlatform, O: ScanObserver + 'static> {
    shared: Arc<Shared<B, P, O>>,
}

impl<B: DecoderBinding, P: CameraPlatform, O: ScanObserver + 'static> Clone
    for ScanSession<B, P, O>
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: DecoderBinding, P: CameraPlatform> ScanSession<B, P, TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(config: SessionConfig, platform: P, factory: BindingFactory<B>) -> Self {
        Self::with_observer(config, platform, factory, Arc::new(TracingObserver))
    }
}

impl<B: DecoderBinding, P: CameraPlatform, O: ScanObserver + 'static> ScanSession<B, P, O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(
        config: SessionConfig,
        platform: P,
        factory: BindingFactory<B>,
        observer: Arc<O>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                directory: DeviceDirectory::new(platform),
                factory,
                observer,
                audio: Mutex::new(Arc::new(Silent)),
                pipeline: AsyncMutex::new(Pipeline {
                    state: SessionState::new(),
                    binding: None,
                }),
                sink: Mutex::new(ScanEventSink::new()),
                error_slot: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Replace the sound played for new payloads.
    pub fn set_audio_cue(&self, cue: Arc<dyn AudioCue>) {
        *self.shared.audio.lock().unwrap_or_else(|e| e.into_inner()) = cue;
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn platform(&self) -> &P {
        self.shared.directory.platform()
    }

    /// Request permission, list cameras, pick a default and start it.
    ///
    /// Failures are surfaced through the error slot and leave the session
    /// in `Error`; calling this again retries.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SessionSnapshot {
        let mut p = self.shared.pipeline.lock().await;
        if p.state.closed {
            return self.shared.snapshot_of(&p.state);
        }

        if let Err(e) = self.shared.initialize_locked(&mut p).await {
            self.shared.fail(&mut p.state, &e);
        }
        self.shared.snapshot_of(&p.state)
    }

    /// Bind `device_id`. A no-op if that camera is already active.
    #[instrument(skip(self))]
    pub async fn start_camera(&self, device_id: &str) -> Result<(), ScanError> {
        self.run_start(device_id, false).await
    }

    /// Same as [`Self::start_camera`]; used by the dedicated switch control.
    #[instrument(skip(self))]
    pub async fn switch_camera(&self, device_id: &str) -> Result<(), ScanError> {
        self.run_start(device_id, false).await
    }

    /// Device picker path: always a full restart, even for the active
    /// camera, so a stuck binding can be recovered.
    #[instrument(skip(self))]
    pub async fn select_device(&self, device_id: &str) -> Result<(), ScanError> {
        self.run_start(device_id, true).await
    }

    /// Restart on the camera after the active one, wrapping to the first.
    ///
    /// Returns the camera that was selected.
    #[instrument(skip(self))]
    pub async fn switch_to_next(&self) -> Result<Option<String>, ScanError> {
        let mut p = self.shared.pipeline.lock().await;
        if p.state.closed {
            return Err(ScanError::SessionClosed);
        }

        let current = p
            .state
            .active_device_id
            .as_deref()
            .and_then(|id| p.state.device_index(id));
        let Some(next) = next_index(current, p.state.devices.len()) else {
            debug!("No cameras to switch to");
            return Ok(None);
        };
        let device_id = p.state.devices[next].id.clone();
        self.shared.log(LogLevel::Info, format!("Switching camera to: {device_id}"));

        match self.shared.start_locked(&mut p, &device_id, true).await {
            Ok(()) => Ok(Some(device_id)),
            Err(e) => {
                self.shared.fail(&mut p.state, &e);
                Err(e)
            }
        }
    }

    async fn run_start(&self, device_id: &str, force: bool) -> Result<(), ScanError> {
        let mut p = self.shared.pipeline.lock().await;
        if p.state.closed {
            return Err(ScanError::SessionClosed);
        }

        let result = self.shared.start_locked(&mut p, device_id, force).await;
        if let Err(e) = &result {
            self.shared.fail(&mut p.state, e);
        }
        result
    }

    /// Release the camera. Safe to call when already stopped.
    #[instrument(skip(self))]
    pub async fn stop_camera(&self) -> Result<(), ScanError> {
        let mut p = self.shared.pipeline.lock().await;
        if p.state.closed {
            return Ok(());
        }

        if p.state.guard(Operation::Stop).skip {
            debug!("Already stopped");
            return Ok(());
        }

        let result = self.shared.release_locked(&mut p).await;
        if let Err(e) = &result {
            self.shared.fail(&mut p.state, e);
        }
        result
    }

    /// Scan a still image, pausing and then resuming any active camera.
    #[instrument(skip(self, file), fields(file = file.as_ref().map(|f| f.name.as_str())))]
    pub async fn scan_image(&self, file: Option<ImageFile>) -> Result<DecodedResult, ScanError> {
        let mut p = self.shared.pipeline.lock().await;
        if p.state.closed {
            return Err(ScanError::SessionClosed);
        }

        self.shared.scan_image_locked(&mut p, file).await
    }

    /// Wait for any in-flight operation, release everything and close the
    /// session. Idempotent.
    #[instrument(skip(self))]
    pub async fn teardown(&self) {
        let mut p = self.shared.pipeline.lock().await;
        if p.state.closed {
            return;
        }

        self.shared.retire_handlers();
        let was_bound = p.state.bound.is_some();
        let camera = p.state.live_camera().map(str::to_string);
        if was_bound {
            self.shared.goto(&mut p.state, SessionStatus::Stopping);
        }
        if let Some(binding) = p.binding.take() {
            if let Err(e) = binding.release().await {
                warn!(error = %e, "Release failed during teardown");
            }
        }
        if let Some(device_id) = camera {
            self.shared.emit(ScanEvent::CameraStopped { device_id });
        }

        p.state.bound = None;
        p.state.active_device_id = None;
        self.shared.goto(&mut p.state, SessionStatus::Idle);
        p.state.closed = true;
        self.shared.lock_sink().clear();
        info!("Session torn down");
    }

    /// Current state, once the in-flight operation (if any) has settled.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let p = self.shared.pipeline.lock().await;
        self.shared.snapshot_of(&p.state)
    }

    /// Content of the error slot.
    pub fn error(&self) -> Option<SurfacedError> {
        self.shared.lock_slot().clone()
    }

    /// Message shown in the error slot, if any.
    pub fn error_message(&self) -> Option<String> {
        self.shared.lock_slot().as_ref().map(|e| e.message.clone())
    }

    /// Clear the error slot (on user interaction).
    pub fn clear_error(&self) {
        let cleared = self.shared.lock_slot().take().is_some();
        if cleared {
            self.shared.emit(ScanEvent::ErrorCleared);
        }
    }
}

impl<B: DecoderBinding, P: CameraPlatform, O: ScanObserver + 'static> Shared<B, P, O> {
    fn emit(&self, event: ScanEvent) {
        self.observer.on_event(&event);
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(ScanEvent::Log {
            level,
            message: message.into(),
        });
    }

    fn goto(&self, state: &mut SessionState, next: SessionStatus) {
        let from = state.goto_status(next);
        if from != next {
            self.emit(ScanEvent::StatusChanged { from, to: next });
        }
    }

    fn lock_sink(&self) -> MutexGuard<'_, ScanEventSink> {
        self.sink.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<SurfacedError>> {
        self.error_slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn audio(&self) -> Arc<dyn AudioCue> {
        Arc::clone(&self.audio.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn snapshot_of(&self, state: &SessionState) -> SessionSnapshot {
        SessionSnapshot {
            status: state.status,
            active_device_id: state.active_device_id.clone(),
            devices: state.devices.clone(),
            last_error: state.last_error,
            seen_payloads: self.lock_sink().len(),
            closed: state.closed,
        }
    }

    /// Register a new decode handler generation.
    fn next_generation(&self) -> u64 {
        let _sink = self.lock_sink();
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Deregister the current decode handler. Once this returns no
    /// callback of the old generation is running or will run.
    fn retire_handlers(&self) {
        let _sink = self.lock_sink();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Classify, log and surface an error, and settle the status.
    fn fail(&self, state: &mut SessionState, err: &ScanError) {
        let kind = err.kind();
        match kind {
            ErrorKind::PermissionDenied
            | ErrorKind::NoDevicesFound
            | ErrorKind::UnsupportedDecoderCapability => {
                if state.bound.is_none() {
                    self.goto(state, SessionStatus::Error);
                }
            }
            ErrorKind::BindingError => {
                if state.bound.is_none() {
                    self.goto(state, SessionStatus::Idle);
                }
            }
            _ => {}
        }
        state.last_error = Some(kind);

        let message = format!("Error: {err}");
        if kind.is_recoverable() {
            info!(kind = %kind, "{}", err);
        } else {
            warn!(kind = %kind, "{}", err);
        }
        *self.lock_slot() = Some(SurfacedError {
            kind,
            message: message.clone(),
        });
        self.emit(ScanEvent::Error { kind, message });
    }

    fn ensure_binding<'a>(
        factory: &BindingFactory<B>,
        slot: &'a mut Option<B>,
    ) -> Result<&'a B, ScanError> {
        if slot.is_none() {
            debug!("Creating decoder binding");
            *slot = Some(factory()?);
        }
        slot.as_ref()
            .ok_or_else(|| ScanError::Binding("decoder binding unavailable".into()))
    }

    async fn initialize_locked(self: &Arc<Self>, p: &mut Pipeline<B>) -> Result<(), ScanError> {
        if p.state.bound.is_some() {
            self.release_locked(p).await?;
        }

        self.goto(&mut p.state, SessionStatus::RequestingPermission);
        self.log(LogLevel::Info, "Requesting camera permission...");
        self.directory.request_permission().await?;

        self.goto(&mut p.state, SessionStatus::ListingDevices);
        self.log(
            LogLevel::Info,
            "Permission granted (or already granted). Listing cameras...",
        );
        let devices = self.directory.list_cameras().await?;
        let selected = pick_default(&devices)
            .map(|d| d.id.clone())
            .ok_or(ScanError::NoDevicesFound)?;
        p.state.devices = devices.clone();

        self.emit(ScanEvent::DevicesListed {
            devices,
            selected: selected.clone(),
        });
        self.log(
            LogLevel::Info,
            format!("Selected back camera (best guess): {selected}"),
        );

        self.start_locked(p, &selected, false).await
    }

    async fn start_locked(
        self: &Arc<Self>,
        p: &mut Pipeline<B>,
        device_id: &str,
        force: bool,
    ) -> Result<(), ScanError> {
        if !p.state.knows_device(device_id) {
            return Err(ScanError::UnknownDevice(device_id.to_string()));
        }

        let guard = p.state.guard(Operation::Start { device_id, force });
        if guard.skip {
            debug!(device = %device_id, "Camera already active");
            return Ok(());
        }
        if guard.release_first {
            self.release_locked(p).await?;
        }

        let Pipeline { state, binding } = p;
        let binding = Self::ensure_binding(&self.factory, binding)?;

        let handler: Arc<dyn DecodeHandler> = Arc::new(SessionHandler {
            generation: self.next_generation(),
            shared: Arc::downgrade(self),
        });
        let config = self.config.camera_config();

        match binding.bind(device_id, &config, handler).await {
            Ok(()) => {
                state.bound = Some(BoundMode::Camera(device_id.to_string()));
                state.active_device_id = Some(device_id.to_string());
                self.goto(state, SessionStatus::CameraActive);
                self.log(LogLevel::Info, format!("Started with camera: {device_id}"));
                self.emit(ScanEvent::CameraStarted {
                    device_id: device_id.to_string(),
                });
                Ok(())
            }
            Err(e) => {
                self.retire_handlers();
                if let Err(release_err) = binding.release().await {
                    warn!(error = %release_err, "Release after failed bind also failed");
                }
                state.bound = None;
                state.active_device_id = None;
                Err(e.into())
            }
        }
    }

    async fn release_locked(&self, p: &mut Pipeline<B>) -> Result<(), ScanError> {
        self.retire_handlers();

        let was_bound = p.state.bound.is_some();
        let camera = p.state.live_camera().map(str::to_string);
        if was_bound {
            self.goto(&mut p.state, SessionStatus::Stopping);
        }

        let result = match &p.binding {
            Some(binding) => binding.release().await,
            None => Ok(()),
        };

        p.state.bound = None;
        p.state.active_device_id = None;
        if let Some(device_id) = camera {
            self.log(LogLevel::Info, format!("Stopped camera: {device_id}"));
            self.emit(ScanEvent::CameraStopped { device_id });
        }
        if was_bound {
            self.goto(&mut p.state, SessionStatus::Idle);
        }

        result.map_err(ScanError::from)
    }

    /// Surfaces its own errors: the decode outcome first, then any resume
    /// failure, so the slot ends up describing the session's final state.
    async fn scan_image_locked(
        self: &Arc<Self>,
        p: &mut Pipeline<B>,
        file: Option<ImageFile>,
    ) -> Result<DecodedResult, ScanError> {
        let file = match self.check_image_scan(p, file) {
            Ok(file) => file,
            Err(e) => {
                self.fail(&mut p.state, &e);
                return Err(e);
            }
        };

        let guard = p.state.guard(Operation::ScanImage);
        let outcome = self.decode_still(p, &file, guard.release_first).await;
        if let Err(e) = &outcome {
            self.fail(&mut p.state, e);
        }

        // Resume whatever camera was live before, whatever the outcome.
        match guard.resume_device {
            Some(device_id) => {
                self.log(LogLevel::Info, "Resuming camera...");
                if let Err(e) = self.start_locked(p, &device_id, true).await {
                    self.fail(&mut p.state, &e);
                }
            }
            None => {
                self.goto(&mut p.state, SessionStatus::Idle);
            }
        }

        outcome
    }

    fn check_image_scan(
        &self,
        p: &mut Pipeline<B>,
        file: Option<ImageFile>,
    ) -> Result<ImageFile, ScanError> {
        let file = match file {
            Some(file) if !file.is_empty() => file,
            _ => return Err(ScanError::NoFileSelected),
        };

        let supported = Self::ensure_binding(&self.factory, &mut p.binding)?.supports_image_mode();
        if !supported {
            return Err(ScanError::UnsupportedDecoderCapability(
                "This decoder does not support image scanning.".into(),
            ));
        }
        Ok(file)
    }

    async fn decode_still(
        &self,
        p: &mut Pipeline<B>,
        file: &ImageFile,
        release_first: bool,
    ) -> Result<DecodedResult, ScanError> {
        if release_first {
            self.log(LogLevel::Info, "Pausing camera to scan image...");
            self.release_locked(p).await?;
        }

        let Pipeline { state, binding } = p;
        let binding = Self::ensure_binding(&self.factory, binding)?;

        self.goto(state, SessionStatus::ImageScanning);
        state.bound = Some(BoundMode::Image);
        self.log(LogLevel::Info, format!("Scanning image: {}", file.name));

        let decoded = binding.bind_to_image(file).await;
        if let Err(e) = binding.release().await {
            warn!(error = %e, "Release after image scan failed");
        }
        state.bound = None;

        match decoded? {
            Some(text) => {
                let result = DecodedResult::new(text);
                self.log(LogLevel::Info, format!("Image QR: {}", result.text));
                self.emit(ScanEvent::Decoded(result.clone()));
                Ok(result)
            }
            None => Err(ScanError::EmptyDecodeResult),
        }
    }

    fn on_decode_success(&self, generation: u64, text: &str) {
        // The sink lock also fences handler retirement.
        let mut sink = self.lock_sink();
        if self.generation.load(Ordering::SeqCst) != generation {
            trace!("Dropping callback from released binding");
            return;
        }
        if !sink.record(text) {
            return;
        }

        let result = DecodedResult::new(text);
        self.log(LogLevel::Info, format!("QR: {}", result.text));
        self.audio().play();
        self.emit(ScanEvent::Decoded(result));
    }

    fn on_decode_failure(&self, generation: u64, message: &str) {
        let _sink = self.lock_sink();
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        trace!(reason = %message, "Decode miss");
        self.emit(ScanEvent::DecodeMiss {
            message: message.to_string(),
        });
    }
}

impl<B: DecoderBinding, P: CameraPlatform, O: ScanObserver> Drop for Shared<B, P, O> {
    fn drop(&mut self) {
        if self.pipeline.get_mut().state.bound.is_some() {
            warn!("Scanning session dropped without teardown; decoder still bound");
        }
    }
}

/// Decode handler registered with the binding for one bind.
struct SessionHandler<B: DecoderBinding, P: CameraPlatform, O: ScanObserver + 'static> {
    generation: u64,
    shared: Weak<Shared<B, P, O>>,
}

impl<B: DecoderBinding, P: CameraPlatform, O: ScanObserver + 'static> DecodeHandler
    for SessionHandler<B, P, O>
{
    fn on_decode(&self, text: &str) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_decode_success(self.generation, text);
        }
    }

    fn on_miss(&self, message: &str) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_decode_failure(self.generation, message);
        }
    }
}
