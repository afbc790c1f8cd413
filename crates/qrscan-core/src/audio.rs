//! Audio cue played when a new code is scanned.
//!
//! Playback belongs to the host; the session only needs a fire-and-forget
//! trigger.

use std::sync::atomic::{AtomicUsize, Ordering};

pub trait AudioCue: Send + Sync {
    /// Play the "scanned" sound. Must not block.
    fn play(&self);
}

/// Plays nothing.
pub struct Silent;

impl AudioCue for Silent {
    fn play(&self) {}
}

/// Counts plays. Useful for tests and headless hosts.
#[derive(Default)]
pub struct CountingCue {
    plays: AtomicUsize,
}

impl CountingCue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl AudioCue for CountingCue {
    fn play(&self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }
}
