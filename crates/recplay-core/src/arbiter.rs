//! Exclusive mode arbiter.
//!
//! A press starts its mode unless the opposing mode is active or the mode's
//! own indicator is still lit. Pressing an active mode's button does not
//! stop it; only the activity timeout, the session finishing on its own, or
//! the opposing mode starting ends a mode.

use embassy_time::Instant;

use crate::mode::{ModeFlags, ModeId, SessionToken};

/// Per-mode state owned by the poll loop. The `active` half lives in the
/// shared [`ModeFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeState {
    pub indicator_on: bool,
    pub activated_at: Instant,
}

impl ModeState {
    pub const fn idle() -> Self {
        Self { indicator_on: false, activated_at: Instant::from_ticks(0) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IgnoreReason {
    /// The opposing mode is running.
    OtherActive,
    /// This mode's indicator is still on from the previous press.
    AlreadyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decision {
    /// The mode was started; `preempted` is true if the opposing mode had to
    /// be forced off.
    Start { token: SessionToken, preempted: bool },
    Ignored(IgnoreReason),
}

pub struct Arbiter<'a> {
    flags: &'a ModeFlags,
    modes: [ModeState; 2],
}

impl<'a> Arbiter<'a> {
    pub const fn new(flags: &'a ModeFlags) -> Self {
        Self { flags, modes: [ModeState::idle(), ModeState::idle()] }
    }

    pub fn flags(&self) -> &'a ModeFlags {
        self.flags
    }

    pub fn state(&self, mode: ModeId) -> &ModeState {
        &self.modes[mode.index()]
    }

    pub(crate) fn state_mut(&mut self, mode: ModeId) -> &mut ModeState {
        &mut self.modes[mode.index()]
    }

    pub fn on_pressed(&mut self, mode: ModeId, now: Instant) -> Decision {
        let other = mode.other();

        if self.flags.is_active(other) {
            debug!("{} press ignored: {} active", mode.label(), other.label());
            return Decision::Ignored(IgnoreReason::OtherActive);
        }
        if self.state(mode).indicator_on {
            debug!("{} press ignored: already on", mode.label());
            return Decision::Ignored(IgnoreReason::AlreadyActive);
        }

        let token = self.flags.activate(mode);
        *self.state_mut(mode) = ModeState { indicator_on: true, activated_at: now };

        // The opposing flag is known inactive here; what can remain is its
        // indicator, lit until the next settle after its session ended.
        let cancelled = self.flags.cancel(other);
        let other_state = self.state_mut(other);
        let preempted = cancelled || other_state.indicator_on;
        other_state.indicator_on = false;

        info!("{} turned ON", mode.label());
        Decision::Start { token, preempted }
    }
}
