//! Mock decoder binding for testing.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::traits::{BindingError, CameraConfig, DecodeHandler, DecoderBinding, ImageFile};

/// Calls observed by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Bind(String),
    BindImage(String),
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LiveMode {
    Camera(String),
    Image,
}

struct MockState {
    live: Option<LiveMode>,
    calls: Vec<MockCall>,
    /// Handler of the current camera binding.
    handler: Option<Arc<dyn DecodeHandler>>,
    /// Most recent handler, kept after release to simulate late callbacks.
    last_handler: Option<Arc<dyn DecodeHandler>>,
    /// Bind attempts made while another bind was still live.
    overlapping_binds: usize,
    image_results: VecDeque<Result<Option<String>, String>>,
    failing_devices: HashSet<String>,
    fail_release: bool,
    last_config: Option<CameraConfig>,
}

/// Mock binding for unit testing session logic.
///
/// Clones share state, so a test can keep one handle while the session
/// owns another.
#[derive(Clone)]
pub struct MockBinding {
    state: Arc<Mutex<MockState>>,
    /// Simulated latency for bind/release to widen race windows.
    latency: Duration,
    image_mode: bool,
}

impl MockBinding {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                live: None,
                calls: Vec::new(),
                handler: None,
                last_handler: None,
                overlapping_binds: 0,
                image_results: VecDeque::new(),
                failing_devices: HashSet::new(),
                fail_release: false,
                last_config: None,
            })),
            latency: Duration::ZERO,
            image_mode: true,
        }
    }

    /// Add artificial latency to every bind and release.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Build a binding that lacks still-image support.
    pub fn without_image_mode(mut self) -> Self {
        self.image_mode = false;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the result of the next image decode.
    pub fn queue_image_result(&self, text: Option<&str>) {
        self.lock()
            .image_results
            .push_back(Ok(text.map(str::to_string)));
    }

    /// Queue an image decode failure.
    pub fn queue_image_error(&self, message: &str) {
        self.lock()
            .image_results
            .push_back(Err(message.to_string()));
    }

    /// Make binds to `device_id` fail.
    pub fn fail_device(&self, device_id: &str) {
        self.lock().failing_devices.insert(device_id.to_string());
    }

    /// Make the next releases fail (the stream is still torn down).
    pub fn fail_release(&self, fail: bool) {
        self.lock().fail_release = fail;
    }

    /// Simulate a decoded frame on the live camera binding.
    pub fn emit_decode(&self, text: &str) {
        let handler = self.lock().handler.clone();
        if let Some(handler) = handler {
            handler.on_decode(text);
        }
    }

    /// Simulate a decode miss on the live camera binding.
    pub fn emit_miss(&self, message: &str) {
        let handler = self.lock().handler.clone();
        if let Some(handler) = handler {
            handler.on_miss(message);
        }
    }

    /// Simulate a callback that arrives after the binding was released.
    pub fn emit_late_decode(&self, text: &str) {
        let handler = self.lock().last_handler.clone();
        if let Some(handler) = handler {
            handler.on_decode(text);
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Camera currently bound, if any.
    pub fn live_camera(&self) -> Option<String> {
        match &self.lock().live {
            Some(LiveMode::Camera(id)) => Some(id.clone()),
            _ => None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.lock().live.is_some()
    }

    pub fn overlapping_binds(&self) -> usize {
        self.lock().overlapping_binds
    }

    pub fn last_config(&self) -> Option<CameraConfig> {
        self.lock().last_config
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}

impl Default for MockBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderBinding for MockBinding {
    async fn bind(
        &self,
        device_id: &str,
        config: &CameraConfig,
        handler: Arc<dyn DecodeHandler>,
    ) -> Result<(), BindingError> {
        {
            let mut state = self.lock();
            state.calls.push(MockCall::Bind(device_id.to_string()));
            if state.live.is_some() {
                state.overlapping_binds += 1;
                return Err(BindingError::AlreadyBound);
            }
            if state.failing_devices.contains(device_id) {
                return Err(BindingError::StartFailed(format!(
                    "could not start video source {device_id}"
                )));
            }
            state.live = Some(LiveMode::Camera(device_id.to_string()));
            state.last_config = Some(*config);
        }

        self.simulate_latency().await;

        let mut state = self.lock();
        state.handler = Some(Arc::clone(&handler));
        state.last_handler = Some(handler);
        Ok(())
    }

    async fn bind_to_image(&self, file: &ImageFile) -> Result<Option<String>, BindingError> {
        {
            let mut state = self.lock();
            state.calls.push(MockCall::BindImage(file.name.clone()));
            if !self.image_mode {
                return Err(BindingError::Unsupported("image scanning".into()));
            }
            if state.live.is_some() {
                state.overlapping_binds += 1;
                return Err(BindingError::AlreadyBound);
            }
            state.live = Some(LiveMode::Image);
        }

        self.simulate_latency().await;

        match self.lock().image_results.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(BindingError::DecodeFailed(message)),
            None => Ok(None),
        }
    }

    async fn release(&self) -> Result<(), BindingError> {
        self.simulate_latency().await;

        let mut state = self.lock();
        state.calls.push(MockCall::Release);
        state.live = None;
        state.handler = None;
        if state.fail_release {
            return Err(BindingError::ReleaseFailed("track stop failed".into()));
        }
        Ok(())
    }

    fn supports_image_mode(&self) -> bool {
        self.image_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        decodes: AtomicUsize,
        misses: AtomicUsize,
    }

    impl DecodeHandler for CountingHandler {
        fn on_decode(&self, _text: &str) {
            self.decodes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_miss(&self, _message: &str) {
            self.misses.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config() -> CameraConfig {
        CameraConfig {
            fps: 5,
            scan_region: None,
        }
    }

    #[tokio::test]
    async fn test_mock_rejects_overlapping_bind() {
        let mock = MockBinding::new();
        let handler = Arc::new(CountingHandler::default());

        mock.bind("cam-1", &config(), handler.clone()).await.unwrap();
        assert!(matches!(
            mock.bind("cam-2", &config(), handler).await,
            Err(BindingError::AlreadyBound)
        ));
        assert_eq!(mock.overlapping_binds(), 1);
        assert_eq!(mock.live_camera().as_deref(), Some("cam-1"));
    }

    #[tokio::test]
    async fn test_mock_release_drops_handler() {
        let mock = MockBinding::new();
        let handler = Arc::new(CountingHandler::default());

        mock.bind("cam-1", &config(), handler.clone()).await.unwrap();
        mock.emit_decode("hello");
        mock.emit_miss("nothing in frame");
        mock.release().await.unwrap();
        mock.emit_decode("hello");

        assert_eq!(handler.decodes.load(Ordering::SeqCst), 1);
        assert_eq!(handler.misses.load(Ordering::SeqCst), 1);
        assert!(!mock.is_live());

        // Release stays idempotent
        mock.release().await.unwrap();
        assert_eq!(
            mock.calls(),
            vec![
                MockCall::Bind("cam-1".into()),
                MockCall::Release,
                MockCall::Release
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_image_results_in_order() {
        let mock = MockBinding::new();
        mock.queue_image_result(Some("first"));
        mock.queue_image_result(None);

        let file = ImageFile::new("a.png", vec![1, 2, 3]);
        assert_eq!(
            mock.bind_to_image(&file).await.unwrap().as_deref(),
            Some("first")
        );
        mock.release().await.unwrap();
        assert_eq!(mock.bind_to_image(&file).await.unwrap(), None);
    }
}
