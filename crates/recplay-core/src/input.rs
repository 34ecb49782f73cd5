//! Debounced digital input.
//!
//! Converts a noisy raw line into clean `Pressed`/`Released` edges. The
//! channel is a pure function of the sampled level and the sample time: it
//! never blocks and never fails.

use embassy_time::{Duration, Instant};

use crate::clock::elapsed;

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(30);

/// A committed logical transition of a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Pressed,
    Released,
}

/// Electrical level that means "pressed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Polarity {
    /// Pull-up wiring: the line reads low while the button is held.
    #[default]
    ActiveLow,
    ActiveHigh,
}

impl Polarity {
    /// The level the line rests at when nobody is touching the button.
    pub const fn idle_level(self) -> bool {
        match self {
            Polarity::ActiveLow => true,
            Polarity::ActiveHigh => false,
        }
    }

    fn edge_for(self, level: bool) -> Edge {
        if level == self.idle_level() {
            Edge::Released
        } else {
            Edge::Pressed
        }
    }
}

/// One physical button.
///
/// `stable_level` only moves to a new value once the raw level has held that
/// value for longer than the debounce delay.
#[derive(Debug, Clone)]
pub struct ButtonChannel {
    polarity: Polarity,
    debounce: Duration,
    stable_level: bool,
    last_raw_level: bool,
    last_edge: Instant,
}

impl ButtonChannel {
    pub const fn new(polarity: Polarity, debounce: Duration) -> Self {
        let idle = polarity.idle_level();
        Self {
            polarity,
            debounce,
            stable_level: idle,
            last_raw_level: idle,
            last_edge: Instant::from_ticks(0),
        }
    }

    /// Feed one raw sample taken at `now`.
    pub fn poll(&mut self, raw_level: bool, now: Instant) -> Option<Edge> {
        if raw_level != self.last_raw_level {
            self.last_edge = now;
            self.last_raw_level = raw_level;
        }

        if elapsed(now, self.last_edge) > self.debounce
            && raw_level != self.stable_level
        {
            self.stable_level = raw_level;
            return Some(self.polarity.edge_for(raw_level));
        }
        None
    }

    pub fn stable_level(&self) -> bool {
        self.stable_level
    }

    pub fn is_pressed(&self) -> bool {
        self.stable_level != self.polarity.idle_level()
    }

    pub(crate) fn polarity_idle(&self) -> bool {
        self.polarity.idle_level()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}
