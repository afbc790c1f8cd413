//! Host adapter - the embeddable scanner widget.
//!
//! Maps the widget lifecycle and UI events onto session operations and
//! keeps track of the device picker selection.

use tracing::debug;

use crate::binding::{DecoderBinding, ImageFile};
use crate::device::next_index;
use crate::error::ScanError;
use crate::events::ScanObserver;
use crate::platform::CameraPlatform;
use crate::session::{ScanSession, SessionSnapshot};

/// Inbound UI events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    StartClicked,
    StopClicked,
    /// A device was picked in the selector.
    DeviceSelected(String),
    /// The "switch camera" button.
    SwitchClicked,
    ScanImageClicked,
    /// Result of the file picker. `None` when the user cancelled.
    FileSelected(Option<ImageFile>),
}

/// Something the host has to do on the widget's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    /// Show a file picker, then dispatch [`UiEvent::FileSelected`].
    OpenFilePicker,
}

pub struct ScannerWidget<B: DecoderBinding, P: CameraPlatform, O: ScanObserver + 'static> {
    session: ScanSession<B, P, O>,
    selected: Option<String>,
}

impl<B: DecoderBinding, P: CameraPlatform, O: ScanObserver + 'static> ScannerWidget<B, P, O> {
    pub fn new(session: ScanSession<B, P, O>) -> Self {
        Self {
            session,
            selected: None,
        }
    }

    pub fn session(&self) -> &ScanSession<B, P, O> {
        &self.session
    }

    /// Device currently selected in the picker.
    pub fn selected_device(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Widget became visible: request permission and start scanning.
    pub async fn on_mount(&mut self) -> SessionSnapshot {
        let snapshot = self.session.initialize().await;
        if snapshot.active_device_id.is_some() {
            self.selected = snapshot.active_device_id.clone();
        }
        snapshot
    }

    /// Widget is going away: release everything.
    pub async fn on_unmount(&mut self) {
        self.session.teardown().await;
    }

    /// Route a UI event. Failures are already surfaced through the
    /// session's error slot.
    pub async fn dispatch(&mut self, event: UiEvent) -> Option<HostAction> {
        self.session.clear_error();

        match event {
            UiEvent::StartClicked => match self.selected.clone() {
                Some(device_id) => settle(self.session.start_camera(&device_id).await),
                None => {
                    self.on_mount().await;
                }
            },
            UiEvent::StopClicked => settle(self.session.stop_camera().await),
            UiEvent::DeviceSelected(device_id) => {
                self.selected = Some(device_id.clone());
                settle(self.session.select_device(&device_id).await);
            }
            UiEvent::SwitchClicked => {
                let snapshot = self.session.snapshot().await;
                let current = self
                    .selected
                    .as_deref()
                    .and_then(|id| snapshot.devices.iter().position(|d| d.id == id));
                match next_index(current, snapshot.devices.len()) {
                    Some(next) => {
                        let device_id = snapshot.devices[next].id.clone();
                        self.selected = Some(device_id.clone());
                        settle(self.session.select_device(&device_id).await);
                    }
                    None => debug!("No cameras to switch between"),
                }
            }
            UiEvent::ScanImageClicked => return Some(HostAction::OpenFilePicker),
            UiEvent::FileSelected(file) => settle(self.session.scan_image(file).await),
        }

        None
    }
}

fn settle<T>(result: Result<T, ScanError>) {
    if let Err(e) = result {
        debug!(error = %e, "Dispatched operation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingFactory, MockBinding, MockCall};
    use crate::config::SessionConfig;
    use crate::error::ErrorKind;
    use crate::events::RecordingObserver;
    use crate::platform::MockPlatform;
    use crate::state::SessionStatus;
    use std::sync::Arc;

    fn widget(
        cameras: &[(&str, &str)],
    ) -> (
        ScannerWidget<MockBinding, MockPlatform, RecordingObserver>,
        MockBinding,
        MockPlatform,
    ) {
        let binding = MockBinding::new();
        let platform = MockPlatform::with_cameras(cameras);
        let factory_binding = binding.clone();
        let factory: BindingFactory<MockBinding> = Box::new(move || Ok(factory_binding.clone()));
        let session = ScanSession::with_observer(
            SessionConfig::default(),
            platform.clone(),
            factory,
            Arc::new(RecordingObserver::new()),
        );
        (ScannerWidget::new(session), binding, platform)
    }

    #[tokio::test]
    async fn test_mount_selects_started_camera() {
        let (mut w, binding, _) = widget(&[("f", "Front"), ("r", "Rear")]);

        let snapshot = w.on_mount().await;

        assert_eq!(snapshot.status, SessionStatus::CameraActive);
        assert_eq!(w.selected_device(), Some("r"));
        assert_eq!(binding.live_camera().as_deref(), Some("r"));
    }

    #[tokio::test]
    async fn test_start_without_selection_retries_permission() {
        let (mut w, binding, platform) = widget(&[("f", "Front")]);
        platform.deny_permission();
        w.on_mount().await;
        assert_eq!(w.selected_device(), None);

        platform.grant_permission();
        w.dispatch(UiEvent::StartClicked).await;

        assert_eq!(w.selected_device(), Some("f"));
        assert!(binding.is_live());
        assert!(w.session().error().is_none());
    }

    #[tokio::test]
    async fn test_stop_then_start_selected() {
        let (mut w, binding, _) = widget(&[("f", "Front")]);
        w.on_mount().await;

        w.dispatch(UiEvent::StopClicked).await;
        assert!(!binding.is_live());

        w.dispatch(UiEvent::StartClicked).await;
        assert_eq!(binding.live_camera().as_deref(), Some("f"));
    }

    #[tokio::test]
    async fn test_device_selected_restarts() {
        let (mut w, binding, _) = widget(&[("f", "Front"), ("r", "Rear")]);
        w.on_mount().await;
        binding.clear_calls();

        w.dispatch(UiEvent::DeviceSelected("r".into())).await;

        assert_eq!(
            binding.calls(),
            vec![MockCall::Release, MockCall::Bind("r".into())]
        );
    }

    #[tokio::test]
    async fn test_switch_wraps_to_first() {
        let (mut w, binding, _) = widget(&[("a", "Front"), ("b", "Wide"), ("c", "Back")]);
        w.on_mount().await;
        assert_eq!(w.selected_device(), Some("c"));

        w.dispatch(UiEvent::SwitchClicked).await;
        assert_eq!(w.selected_device(), Some("a"));
        assert_eq!(binding.live_camera().as_deref(), Some("a"));

        w.dispatch(UiEvent::SwitchClicked).await;
        assert_eq!(w.selected_device(), Some("b"));
    }

    #[tokio::test]
    async fn test_scan_image_asks_for_file() {
        let (mut w, binding, _) = widget(&[("a", "Back")]);
        w.on_mount().await;
        binding.clear_calls();

        let action = w.dispatch(UiEvent::ScanImageClicked).await;

        assert_eq!(action, Some(HostAction::OpenFilePicker));
        assert!(binding.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_picker_is_cleared_on_next_interaction() {
        let (mut w, _, _) = widget(&[("a", "Back")]);
        w.on_mount().await;

        w.dispatch(UiEvent::FileSelected(None)).await;
        assert_eq!(
            w.session().error().map(|e| e.kind),
            Some(ErrorKind::NoFileSelected)
        );

        w.dispatch(UiEvent::StopClicked).await;
        assert!(w.session().error().is_none());
    }

    #[tokio::test]
    async fn test_file_selected_scans_and_resumes() {
        let (mut w, binding, _) = widget(&[("a", "Back")]);
        w.on_mount().await;
        binding.queue_image_result(Some("from file"));

        let file = ImageFile::new("code.png", vec![1, 2, 3]);
        w.dispatch(UiEvent::FileSelected(Some(file))).await;

        assert_eq!(binding.live_camera().as_deref(), Some("a"));
        assert!(w.session().error().is_none());
    }

    #[tokio::test]
    async fn test_unmount_releases() {
        let (mut w, binding, _) = widget(&[("a", "Back")]);
        w.on_mount().await;

        w.on_unmount().await;

        assert!(!binding.is_live());
        assert!(w.session().snapshot().await.closed);
    }
}
