//! QRScan TUI - terminal host for the scanner widget.
//!
//! Runs the scanning session on a tokio runtime and renders its events
//! with a device list, error slot, results and log panes.

mod app;
mod audio;
mod event;
mod ui;

use std::io;
use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, mpsc};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use qrscan_core::{
    BindingFactory, DirectoryPlatform, HostAction, RqrrBinding, ScanSession, ScannerWidget,
    SessionConfig, UiEvent,
};
use ratatui::prelude::*;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing_subscriber::prelude::*;

use app::{App, TuiObserver};
use audio::RodioCue;
use event::{Event, EventSource};

const LOG_FILE: &str = "qrscan-tui.log";

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal QR scanner", long_about = None)]
struct Args {
    /// Path to a TOML session config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory with one sub-directory per camera
    #[arg(long)]
    camera_root: Option<PathBuf>,

    /// Sound file played for each new code
    #[arg(long)]
    audio: Option<PathBuf>,
}

type TuiWidget = ScannerWidget<RqrrBinding, DirectoryPlatform, TuiObserver>;

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup panic hook to restore terminal on crash
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));

    // Log to a file, the terminal belongs to the UI
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE)
        .with_context(|| format!("failed to open {LOG_FILE}"))?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let base = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    let config = base.merge(None, None, args.camera_root, args.audio);
    let root = config
        .camera_root
        .clone()
        .unwrap_or_else(|| PathBuf::from("cameras"));

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;

    let observer = Arc::new(TuiObserver::new());
    let platform = DirectoryPlatform::new(&root);
    let factory: BindingFactory<RqrrBinding> =
        Box::new(move || Ok(RqrrBinding::new(root.clone())));
    let session = ScanSession::with_observer(config.clone(), platform, factory, observer.clone());
    session.set_audio_cue(Arc::new(RodioCue::new(config.audio_path.clone())));

    let (commands, command_rx) = unbounded_channel();
    let (actions_tx, actions) = mpsc::channel();
    let widget_task = runtime.spawn(run_widget(
        ScannerWidget::new(session),
        command_rx,
        actions_tx,
    ));

    let terminal = setup_terminal()?;
    let mut app = App::new(observer, commands, actions);
    let result = run_app(terminal, &mut app);
    restore_terminal()?;

    // Dropping the app closes the command channel, which unmounts the widget.
    drop(app);
    if let Err(e) = runtime.block_on(widget_task) {
        tracing::error!(error = %e, "Scanner task failed");
    }

    result
}

/// Owns the widget: mounts it, routes UI events, unmounts on shutdown.
async fn run_widget(
    mut widget: TuiWidget,
    mut events: UnboundedReceiver<UiEvent>,
    actions: mpsc::Sender<HostAction>,
) {
    widget.on_mount().await;
    while let Some(event) = events.recv().await {
        if let Some(action) = widget.dispatch(event).await {
            if actions.send(action).is_err() {
                break;
            }
        }
    }
    widget.on_unmount().await;
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

fn run_app(mut terminal: Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let mut events = EventSource::new(100);

    loop {
        terminal.draw(|frame| ui::draw(frame, app))?;

        match events.next()? {
            Event::Tick => app.on_tick(),
            Event::Key(key) => {
                if app.on_key(key) {
                    break;
                }
            }
        }
    }

    Ok(())
}
