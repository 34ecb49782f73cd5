//! Buttons driven by a timed script instead of fingers.
//!
//! A script is a comma separated list of presses, each `<button>@<ms>` with
//! an optional `+<hold ms>`, for example `record@500,play@12000+300`. Times
//! are relative to the start of the simulation.

use std::convert::Infallible;
use std::str::FromStr;

use embassy_time::{Duration, Instant};
use embedded_hal::digital::{ErrorType, InputPin};
use recplay_core::{ModeId, Polarity};

use crate::error::Error;

const DEFAULT_HOLD: Duration = Duration::from_millis(120);
/// Contacts chatter every this many ms right after each transition.
const CHATTER_PERIOD_MS: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Press {
    pub mode: ModeId,
    pub at: Duration,
    pub hold: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonScript {
    presses: Vec<Press>,
}

impl ButtonScript {
    pub fn presses(&self) -> &[Press] {
        &self.presses
    }

    /// When the last press has been released.
    pub fn end(&self) -> Duration {
        self.presses
            .iter()
            .map(|p| p.at + p.hold)
            .max()
            .unwrap_or(Duration::from_ticks(0))
    }

    /// A pin replaying this script's presses of `mode`.
    pub fn pin(
        &self,
        mode: ModeId,
        polarity: Polarity,
        start: Instant,
        bounce: Duration,
    ) -> ScriptedButton {
        let windows = self
            .presses
            .iter()
            .filter(|p| p.mode == mode)
            .map(|p| (p.at, p.at + p.hold))
            .collect();
        ScriptedButton { windows, polarity, start, bounce }
    }
}

fn parse_ms(field: &str, what: &str) -> Result<Duration, Error> {
    field
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| Error::Script(format!("{} {:?} is not a number of ms", what, field)))
}

impl FromStr for ButtonScript {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut presses = Vec::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (button, timing) = entry
                .split_once('@')
                .ok_or_else(|| Error::Script(format!("{:?} is missing '@'", entry)))?;
            let mode = match button.trim() {
                "record" | "rec" | "r" => ModeId::Recording,
                "play" | "p" => ModeId::Playing,
                other => return Err(Error::Script(format!("unknown button {:?}", other))),
            };
            let (at, hold) = match timing.split_once('+') {
                Some((at, hold)) => (parse_ms(at, "time")?, parse_ms(hold, "hold")?),
                None => (parse_ms(timing, "time")?, DEFAULT_HOLD),
            };
            presses.push(Press { mode, at, hold });
        }
        presses.sort_by_key(|p| p.at);
        Ok(Self { presses })
    }
}

/// Replays press windows against the embassy clock.
#[derive(Debug, Clone)]
pub struct ScriptedButton {
    windows: Vec<(Duration, Duration)>,
    polarity: Polarity,
    start: Instant,
    /// How long the contacts chatter after each transition.
    bounce: Duration,
}

impl ScriptedButton {
    fn pressed_at(&self, t: Duration) -> bool {
        let mut pressed = false;
        for &(down, up) in &self.windows {
            for (edge, level) in [(down, true), (up, false)] {
                if t >= edge && t < edge + self.bounce {
                    // Chatter: alternate, starting on the new level.
                    let phase = (t - edge).as_millis() / CHATTER_PERIOD_MS;
                    return if phase % 2 == 0 { level } else { !level };
                }
            }
            pressed |= t >= down && t < up;
        }
        pressed
    }

    /// Electrical level `t` after the start of the script.
    pub fn level_at(&self, t: Duration) -> bool {
        let idle = self.polarity.idle_level();
        if self.pressed_at(t) {
            !idle
        } else {
            idle
        }
    }

    fn now(&self) -> Duration {
        Instant::now()
            .checked_duration_since(self.start)
            .unwrap_or(Duration::from_ticks(0))
    }
}

impl ErrorType for ScriptedButton {
    type Error = Infallible;
}

impl InputPin for ScriptedButton {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.level_at(self.now()))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}
