//! Scan cue playback.
//!
//! rodio output streams are not `Send`, so playback lives on its own
//! thread and the cue only posts requests to it.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use qrscan_core::AudioCue;
use rodio::source::{SineWave, Source};
use rodio::{Decoder, OutputStream, Sink};

/// Length of the fallback beep.
const BEEP_MS: u64 = 120;

/// Plays the configured sound file, or a short beep, on every new scan.
pub struct RodioCue {
    tx: Mutex<Option<Sender<()>>>,
    path: Option<PathBuf>,
}

impl RodioCue {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            tx: Mutex::new(None),
            path,
        }
    }

    fn ensure_thread(&self) -> Result<Sender<()>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<()>();
        let path = self.path.clone();

        thread::Builder::new()
            .name("scan-cue".to_string())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(output) => output,
                    Err(e) => {
                        tracing::warn!(error = %e, "No audio output, scan cue disabled");
                        return;
                    }
                };
                let sink = match Sink::try_new(&handle) {
                    Ok(sink) => sink,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to create audio sink");
                        return;
                    }
                };

                while rx.recv().is_ok() {
                    append_cue(&sink, path.as_ref());
                }
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

fn append_cue(sink: &Sink, path: Option<&PathBuf>) {
    if let Some(path) = path {
        match File::open(path).map(BufReader::new).map(Decoder::new) {
            Ok(Ok(source)) => {
                sink.append(source);
                return;
            }
            Ok(Err(e)) => tracing::debug!(error = %e, "Cannot decode scan sound, beeping"),
            Err(e) => tracing::debug!(error = %e, "Cannot open scan sound, beeping"),
        }
    }
    sink.append(
        SineWave::new(880.0)
            .take_duration(Duration::from_millis(BEEP_MS))
            .amplify(0.2),
    );
}

impl AudioCue for RodioCue {
    fn play(&self) {
        let sent = self
            .ensure_thread()
            .and_then(|tx| tx.send(()).map_err(|e| e.to_string()));
        if let Err(e) = sent {
            tracing::debug!(error = %e, "Scan cue not played");
        }
    }
}
