//! The poll-loop state: both button channels, the arbiter and the activity
//! timers, advanced together one cycle at a time.

use embassy_time::Instant;
use embedded_hal::digital::InputPin;
use heapless::Vec;

use crate::arbiter::{Arbiter, Decision};
use crate::clock::elapsed_secs;
use crate::config::RecPlayConfig;
use crate::indicator::{ActivityTimer, IndicatorLeds};
use crate::input::{ButtonChannel, Edge};
use crate::mode::{ModeFlags, ModeId, SessionToken};

/// Raw line levels sampled this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonLevels {
    pub record: bool,
    pub play: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndCause {
    Timeout,
    /// Forced off by the opposing mode starting.
    Preempted,
    /// The session finished by itself (storage full, exhausted, failed).
    SessionEnded,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollOutcome {
    pub started: Option<SessionToken>,
    pub stopped: Vec<(ModeId, EndCause), 2>,
}

impl PollOutcome {
    // A cycle stops each mode at most once. A preempt only happens when the
    // other mode just started, and a fresh start can neither time out nor
    // settle in the same cycle, so two entries always suffice.
    fn stop(&mut self, mode: ModeId, cause: EndCause) {
        let pushed = self.stopped.push((mode, cause)).is_ok();
        debug_assert!(pushed, "more than two modes stopped in one cycle");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeSnapshot {
    pub active: bool,
    pub indicator_on: bool,
    pub activated_at: Instant,
}

pub struct Controller<'a> {
    buttons: [ButtonChannel; 2],
    timers: [ActivityTimer; 2],
    arbiter: Arbiter<'a>,
}

impl<'a> Controller<'a> {
    pub fn new(config: &RecPlayConfig, flags: &'a ModeFlags) -> Self {
        let button = ButtonChannel::new(config.button_polarity, config.debounce());
        Self {
            buttons: [button.clone(), button],
            timers: [
                ActivityTimer::new(config.record_timeout()),
                ActivityTimer::new(config.play_timeout()),
            ],
            arbiter: Arbiter::new(flags),
        }
    }

    pub fn flags(&self) -> &'a ModeFlags {
        self.arbiter.flags()
    }

    pub fn snapshot(&self, mode: ModeId) -> ModeSnapshot {
        let state = self.arbiter.state(mode);
        ModeSnapshot {
            active: self.flags().is_active(mode),
            indicator_on: state.indicator_on,
            activated_at: state.activated_at,
        }
    }

    pub fn button(&self, mode: ModeId) -> &ButtonChannel {
        &self.buttons[mode.index()]
    }

    /// One cycle of the poll loop. Never blocks.
    pub fn poll(&mut self, levels: ButtonLevels, now: Instant) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        // Record is handled before Play when both fire together.
        for mode in ModeId::ALL {
            let raw = match mode {
                ModeId::Recording => levels.record,
                ModeId::Playing => levels.play,
            };
            let edge = self.buttons[mode.index()].poll(raw, now);
            if edge != Some(Edge::Pressed) {
                continue;
            }
            if let Decision::Start { token, preempted } =
                self.arbiter.on_pressed(mode, now)
            {
                if preempted {
                    outcome.stop(mode.other(), EndCause::Preempted);
                }
                outcome.started = Some(token);
            }
        }

        for mode in ModeId::ALL {
            let flags = self.arbiter.flags();
            let timer = self.timers[mode.index()];
            let state = self.arbiter.state_mut(mode);
            if timer.tick(mode, state, flags, now) {
                outcome.stop(mode, EndCause::Timeout);
            } else if state.indicator_on && !flags.is_active(mode) {
                state.indicator_on = false;
                info!(
                    "{} turned OFF after {} seconds (session ended)",
                    mode.label(),
                    elapsed_secs(now, state.activated_at)
                );
                outcome.stop(mode, EndCause::SessionEnded);
            }
        }

        outcome
    }

    /// Sample both pins and run one cycle. A pin that fails to read is
    /// treated as resting at its idle level.
    pub fn poll_pins<R: InputPin, P: InputPin>(
        &mut self,
        record: &mut R,
        play: &mut P,
        now: Instant,
    ) -> PollOutcome {
        let levels = ButtonLevels {
            record: read_level(record, self.buttons[0].polarity_idle()),
            play: read_level(play, self.buttons[1].polarity_idle()),
        };
        self.poll(levels, now)
    }

    /// Mirror the indicator state onto the LEDs.
    pub fn show<R, P>(&self, leds: &mut IndicatorLeds<R, P>)
    where
        R: embedded_hal::digital::OutputPin,
        P: embedded_hal::digital::OutputPin,
    {
        for mode in ModeId::ALL {
            leds.show(mode, self.arbiter.state(mode).indicator_on);
        }
    }
}

fn read_level<I: InputPin>(pin: &mut I, fallback: bool) -> bool {
    pin.is_high().unwrap_or(fallback)
}
