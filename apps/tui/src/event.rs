//! Terminal input, interleaved with a fixed redraw tick.

use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, KeyEvent, KeyEventKind};

#[derive(Debug, Clone)]
pub enum Event {
    /// Time to drain session events and redraw.
    Tick,
    Key(KeyEvent),
}

pub struct EventSource {
    tick_rate: Duration,
    last_tick: Instant,
}

impl EventSource {
    pub fn new(tick_rate_ms: u64) -> Self {
        Self {
            tick_rate: Duration::from_millis(tick_rate_ms),
            last_tick: Instant::now(),
        }
    }

    /// Block until a key press or the next tick, whichever comes first.
    pub fn next(&mut self) -> Result<Event> {
        loop {
            let timeout = self.tick_rate.saturating_sub(self.last_tick.elapsed());
            if event::poll(timeout)? {
                // Release/repeat events show up on some platforms; only presses count.
                if let event::Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        return Ok(Event::Key(key));
                    }
                }
                continue;
            }
            self.last_tick = Instant::now();
            return Ok(Event::Tick);
        }
    }
}
