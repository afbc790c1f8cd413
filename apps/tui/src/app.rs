//! Application state and logic.
//!
//! Contains the app state (Model), input handling (Controller).

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use qrscan_core::{
    CameraDescriptor, HostAction, ImageFile, LogLevel, ScanEvent, ScanObserver, SessionStatus,
    UiEvent,
};
use tokio::sync::mpsc::UnboundedSender;

/// Maximum log entries to keep.
const MAX_LOG_ENTRIES: usize = 1000;

/// Maximum decoded results to keep.
const MAX_RESULTS: usize = 200;

/// Maximum buffered session events between ticks.
const MAX_PENDING_EVENTS: usize = 256;

/// Application state.
pub struct App {
    /// Whether to quit the application.
    pub should_quit: bool,
    /// Current view/tab.
    pub current_tab: Tab,
    /// What keys currently do.
    pub mode: InputMode,
    /// Session status as last reported.
    pub status: SessionStatus,
    /// Cameras found at the last permission grant.
    pub devices: Vec<CameraDescriptor>,
    /// Highlighted row in the device list.
    pub device_cursor: usize,
    /// Camera currently streaming.
    pub active_device: Option<String>,
    /// The single error slot.
    pub error: Option<String>,
    /// Decoded payloads, newest last.
    pub results: VecDeque<ResultEntry>,
    /// Frames decoded without a code.
    pub misses: u64,
    /// Log entries.
    pub logs: VecDeque<LogEntry>,
    /// Log scroll position.
    pub log_scroll: usize,
    /// Shared observer for receiving events from the session.
    pub observer: Arc<TuiObserver>,
    commands: UnboundedSender<UiEvent>,
    actions: Receiver<HostAction>,
}

/// Tab/view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Main,
    Logs,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing the path of an image to scan.
    PathPrompt(String),
}

/// Log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct ResultEntry {
    pub text: String,
    pub timestamp: String,
}

/// TUI observer that collects events for display.
pub struct TuiObserver {
    events: Mutex<VecDeque<ScanEvent>>,
}

impl TuiObserver {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(MAX_PENDING_EVENTS)),
        }
    }

    pub fn drain_events(&self) -> Vec<ScanEvent> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.drain(..).collect()
    }
}

impl Default for TuiObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanObserver for TuiObserver {
    fn on_event(&self, event: &ScanEvent) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        // Misses arrive every frame; never let them push out real events.
        if events.len() >= MAX_PENDING_EVENTS {
            if matches!(event, ScanEvent::DecodeMiss { .. }) {
                return;
            }
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

impl App {
    pub fn new(
        observer: Arc<TuiObserver>,
        commands: UnboundedSender<UiEvent>,
        actions: Receiver<HostAction>,
    ) -> Self {
        Self {
            should_quit: false,
            current_tab: Tab::Main,
            mode: InputMode::Normal,
            status: SessionStatus::Idle,
            devices: Vec::new(),
            device_cursor: 0,
            active_device: None,
            error: None,
            results: VecDeque::with_capacity(MAX_RESULTS),
            misses: 0,
            logs: VecDeque::with_capacity(MAX_LOG_ENTRIES),
            log_scroll: 0,
            observer,
            commands,
            actions,
        }
    }

    /// Handle keyboard input. Returns true if app should quit.
    pub fn on_key(&mut self, key: KeyEvent) -> bool {
        if let InputMode::PathPrompt(_) = self.mode {
            self.handle_prompt_key(key);
            return false;
        }

        // Global shortcuts
        match key.code {
            KeyCode::Char('q') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                return true;
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                return true;
            }
            KeyCode::Esc => {
                if self.current_tab != Tab::Main {
                    self.current_tab = Tab::Main;
                    return false;
                }
                self.should_quit = true;
                return true;
            }
            KeyCode::F(1) => {
                self.current_tab = Tab::Help;
                return false;
            }
            KeyCode::F(2) => {
                self.current_tab = Tab::Logs;
                return false;
            }
            _ => {}
        }

        match self.current_tab {
            Tab::Main => self.handle_main_key(key),
            Tab::Logs => self.handle_logs_key(key),
            Tab::Help => {
                // Any key returns to main
                self.current_tab = Tab::Main;
            }
        }

        false
    }

    fn handle_main_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('s') => self.send(UiEvent::StartClicked),
            KeyCode::Char('x') => self.send(UiEvent::StopClicked),
            KeyCode::Char('n') => self.send(UiEvent::SwitchClicked),
            KeyCode::Char('i') => self.send(UiEvent::ScanImageClicked),
            KeyCode::Up | KeyCode::Char('k') => {
                self.device_cursor = self.device_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.device_cursor + 1 < self.devices.len() {
                    self.device_cursor += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(device) = self.devices.get(self.device_cursor) {
                    let id = device.id.clone();
                    self.send(UiEvent::DeviceSelected(id));
                }
            }
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let InputMode::PathPrompt(path) = &mut self.mode else {
            return;
        };
        match key.code {
            KeyCode::Char(c) => path.push(c),
            KeyCode::Backspace => {
                path.pop();
            }
            KeyCode::Esc => {
                self.mode = InputMode::Normal;
                self.send(UiEvent::FileSelected(None));
            }
            KeyCode::Enter => {
                let path = PathBuf::from(path.trim());
                self.mode = InputMode::Normal;
                let file = if path.as_os_str().is_empty() {
                    None
                } else {
                    match ImageFile::load(&path) {
                        Ok(file) => Some(file),
                        Err(e) => {
                            self.add_log(
                                LogLevel::Warn,
                                format!("Cannot read {}: {}", path.display(), e),
                            );
                            None
                        }
                    }
                };
                self.send(UiEvent::FileSelected(file));
            }
            _ => {}
        }
    }

    fn handle_logs_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.log_scroll = self.log_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.log_scroll < self.logs.len().saturating_sub(1) {
                    self.log_scroll += 1;
                }
            }
            KeyCode::PageUp => {
                self.log_scroll = self.log_scroll.saturating_sub(10);
            }
            KeyCode::PageDown => {
                self.log_scroll = (self.log_scroll + 10).min(self.logs.len().saturating_sub(1));
            }
            KeyCode::Home => {
                self.log_scroll = 0;
            }
            KeyCode::End => {
                self.log_scroll = self.logs.len().saturating_sub(1);
            }
            _ => {}
        }
    }

    fn send(&mut self, event: UiEvent) {
        if self.commands.send(event).is_err() {
            self.add_log(LogLevel::Error, "Scanner task has stopped");
        }
    }

    /// Called on each tick - process observer events and host actions.
    pub fn on_tick(&mut self) {
        for event in self.observer.drain_events() {
            self.process_scan_event(event);
        }
        while let Ok(action) = self.actions.try_recv() {
            match action {
                HostAction::OpenFilePicker => {
                    self.mode = InputMode::PathPrompt(String::new());
                }
            }
        }
    }

    fn process_scan_event(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::StatusChanged { to, .. } => {
                self.status = to;
            }
            ScanEvent::DevicesListed { devices, selected } => {
                self.device_cursor = devices.iter().position(|d| d.id == selected).unwrap_or(0);
                self.devices = devices;
            }
            ScanEvent::CameraStarted { device_id } => {
                if let Some(index) = self.devices.iter().position(|d| d.id == device_id) {
                    self.device_cursor = index;
                }
                self.active_device = Some(device_id);
            }
            ScanEvent::CameraStopped { .. } => {
                self.active_device = None;
            }
            ScanEvent::Decoded(result) => {
                if self.results.len() >= MAX_RESULTS {
                    self.results.pop_front();
                }
                self.results.push_back(ResultEntry {
                    text: result.text,
                    timestamp: result
                        .timestamp
                        .with_timezone(&chrono::Local)
                        .format("%H:%M:%S")
                        .to_string(),
                });
            }
            ScanEvent::DecodeMiss { .. } => {
                self.misses += 1;
            }
            ScanEvent::Log { level, message } => {
                self.add_log(level, message);
            }
            ScanEvent::Error { message, .. } => {
                self.add_log(LogLevel::Error, message.clone());
                self.error = Some(message);
            }
            ScanEvent::ErrorCleared => {
                self.error = None;
            }
        }
    }

    fn add_log(&mut self, level: LogLevel, message: impl Into<String>) {
        let now = chrono::Local::now();
        let entry = LogEntry {
            level,
            message: message.into(),
            timestamp: now.format("%H:%M:%S").to_string(),
        };

        if self.logs.len() >= MAX_LOG_ENTRIES {
            self.logs.pop_front();
        }
        self.logs.push_back(entry);

        // Auto-scroll to bottom
        self.log_scroll = self.logs.len().saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrscan_core::{DecodedResult, ErrorKind};
    use std::sync::mpsc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn app() -> (App, UnboundedReceiver<UiEvent>, mpsc::Sender<HostAction>) {
        let (commands, rx) = tokio::sync::mpsc::unbounded_channel();
        let (actions_tx, actions) = mpsc::channel();
        (
            App::new(Arc::new(TuiObserver::new()), commands, actions),
            rx,
            actions_tx,
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn listed(app: &App) {
        app.observer.on_event(&ScanEvent::DevicesListed {
            devices: vec![
                CameraDescriptor::new("front", "Front"),
                CameraDescriptor::new("back", "Back"),
            ],
            selected: "back".into(),
        });
    }

    #[test]
    fn test_devices_listed_moves_cursor_to_selection() {
        let (mut app, _rx, _actions) = app();
        listed(&app);
        app.on_tick();

        assert_eq!(app.devices.len(), 2);
        assert_eq!(app.device_cursor, 1);
    }

    #[test]
    fn test_enter_selects_highlighted_device() {
        let (mut app, mut rx, _actions) = app();
        listed(&app);
        app.on_tick();

        app.on_key(key(KeyCode::Up));
        app.on_key(key(KeyCode::Enter));

        assert_eq!(
            rx.try_recv().ok(),
            Some(UiEvent::DeviceSelected("front".into()))
        );
    }

    #[test]
    fn test_file_picker_prompt_flow() {
        let (mut app, mut rx, actions) = app();
        app.on_key(key(KeyCode::Char('i')));
        assert_eq!(rx.try_recv().ok(), Some(UiEvent::ScanImageClicked));

        actions.send(HostAction::OpenFilePicker).unwrap();
        app.on_tick();
        assert_eq!(app.mode, InputMode::PathPrompt(String::new()));

        app.on_key(key(KeyCode::Esc));
        assert_eq!(app.mode, InputMode::Normal);
        assert_eq!(rx.try_recv().ok(), Some(UiEvent::FileSelected(None)));
        assert!(!app.should_quit);
    }

    #[test]
    fn test_error_slot_follows_events() {
        let (mut app, _rx, _actions) = app();
        app.observer.on_event(&ScanEvent::Error {
            kind: ErrorKind::PermissionDenied,
            message: "Error: camera access is blocked".into(),
        });
        app.on_tick();
        assert_eq!(app.error.as_deref(), Some("Error: camera access is blocked"));

        app.observer.on_event(&ScanEvent::ErrorCleared);
        app.on_tick();
        assert!(app.error.is_none());
    }

    #[test]
    fn test_results_and_misses() {
        let (mut app, _rx, _actions) = app();
        app.observer
            .on_event(&ScanEvent::Decoded(DecodedResult::new("hello")));
        app.observer.on_event(&ScanEvent::DecodeMiss {
            message: "No QR code found in frame".into(),
        });
        app.on_tick();

        assert_eq!(app.results.len(), 1);
        assert_eq!(app.results[0].text, "hello");
        assert_eq!(app.misses, 1);
    }

    #[test]
    fn test_observer_drops_misses_when_full() {
        let observer = TuiObserver::new();
        for _ in 0..MAX_PENDING_EVENTS {
            observer.on_event(&ScanEvent::ErrorCleared);
        }
        observer.on_event(&ScanEvent::DecodeMiss {
            message: "miss".into(),
        });

        let events = observer.drain_events();
        assert_eq!(events.len(), MAX_PENDING_EVENTS);
        assert!(
            events
                .iter()
                .all(|e| matches!(e, ScanEvent::ErrorCleared))
        );
    }
}
