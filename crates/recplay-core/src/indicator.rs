//! Timed activity indicator.
//!
//! The timer is the only path by which a mode ends without user action. The
//! LED side mirrors `indicator_on` onto GPIO outputs.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;

use crate::arbiter::ModeState;
use crate::clock::{elapsed, elapsed_secs};
use crate::mode::{ModeFlags, ModeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityTimer {
    timeout: Duration,
}

impl ActivityTimer {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run once per poll cycle. Returns true if the mode was switched off.
    pub fn tick(
        &self,
        mode: ModeId,
        state: &mut ModeState,
        flags: &ModeFlags,
        now: Instant,
    ) -> bool {
        if !flags.is_active(mode) {
            return false;
        }
        if elapsed(now, state.activated_at) < self.timeout {
            return false;
        }
        flags.cancel(mode);
        state.indicator_on = false;
        info!(
            "{} turned OFF after {} seconds",
            mode.label(),
            elapsed_secs(now, state.activated_at)
        );
        true
    }
}

/// Drives the Record and Play LEDs. Pins are only written on change.
pub struct IndicatorLeds<R, P> {
    record: R,
    play: P,
    lit: [Option<bool>; 2],
}

impl<R: OutputPin, P: OutputPin> IndicatorLeds<R, P> {
    pub fn new(record: R, play: P) -> Self {
        Self { record, play, lit: [None, None] }
    }

    /// Bring both pins to the requested state.
    pub fn show(&mut self, mode: ModeId, on: bool) {
        let slot = &mut self.lit[mode.index()];
        if *slot == Some(on) {
            return;
        }
        let result = match mode {
            ModeId::Recording => set_pin(&mut self.record, on),
            ModeId::Playing => set_pin(&mut self.play, on),
        };
        match result {
            Ok(()) => *slot = Some(on),
            Err(()) => warn!("Failed to drive {} LED", mode.label()),
        }
    }

    pub fn is_lit(&self, mode: ModeId) -> bool {
        self.lit[mode.index()] == Some(true)
    }

    pub fn release(self) -> (R, P) {
        (self.record, self.play)
    }
}

fn set_pin<O: OutputPin>(pin: &mut O, on: bool) -> Result<(), ()> {
    let result = if on { pin.set_high() } else { pin.set_low() };
    result.map_err(|_| ())
}
