//! The two mutually exclusive modes and the flags shared with sessions.
//!
//! Each mode flag is a single atomic word: bit 0 is `active`, the remaining
//! bits count activations. A running session holds a [`SessionToken`] naming
//! the generation it was started for, so a session that was cancelled can
//! never be revived by a later activation of the same mode.

use portable_atomic::{AtomicU32, Ordering};

const ACTIVE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeId {
    Recording,
    Playing,
}

impl ModeId {
    /// Poll-loop processing order when both buttons fire in the same cycle.
    pub const ALL: [ModeId; 2] = [ModeId::Recording, ModeId::Playing];

    pub const fn other(self) -> ModeId {
        match self {
            ModeId::Recording => ModeId::Playing,
            ModeId::Playing => ModeId::Recording,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            ModeId::Recording => 0,
            ModeId::Playing => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ModeId::Recording => "Record",
            ModeId::Playing => "Play",
        }
    }
}

/// Handle given to a streaming session for the activation that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionToken {
    mode: ModeId,
    generation: u32,
}

impl SessionToken {
    pub fn mode(&self) -> ModeId {
        self.mode
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn word(&self) -> u32 {
        (self.generation << 1) | ACTIVE
    }
}

struct ModeFlag {
    word: AtomicU32,
}

impl ModeFlag {
    const fn new() -> Self {
        Self { word: AtomicU32::new(0) }
    }

    fn activate(&self) -> u32 {
        let current = self.word.load(Ordering::Acquire);
        let generation = (current >> 1).wrapping_add(1) & (u32::MAX >> 1);
        self.word.store((generation << 1) | ACTIVE, Ordering::Release);
        generation
    }

    fn cancel(&self) -> bool {
        self.word.fetch_and(!ACTIVE, Ordering::AcqRel) & ACTIVE != 0
    }

    fn is_active(&self) -> bool {
        self.word.load(Ordering::Acquire) & ACTIVE != 0
    }
}

/// Mode flags shared between the poll loop (writer) and the running
/// session (reader). Suitable for a `static`.
pub struct ModeFlags {
    flags: [ModeFlag; 2],
}

impl Default for ModeFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeFlags {
    pub const fn new() -> Self {
        Self { flags: [ModeFlag::new(), ModeFlag::new()] }
    }

    fn flag(&self, mode: ModeId) -> &ModeFlag {
        &self.flags[mode.index()]
    }

    pub fn is_active(&self, mode: ModeId) -> bool {
        self.flag(mode).is_active()
    }

    /// True while `token` still names the live activation of its mode.
    pub fn is_current(&self, token: &SessionToken) -> bool {
        self.flag(token.mode).word.load(Ordering::Acquire) == token.word()
    }

    /// Start a new activation of `mode`, superseding any previous one.
    pub(crate) fn activate(&self, mode: ModeId) -> SessionToken {
        let generation = self.flag(mode).activate();
        SessionToken { mode, generation }
    }

    /// Clear `mode` regardless of which activation is live. Returns whether
    /// it was active.
    pub(crate) fn cancel(&self, mode: ModeId) -> bool {
        self.flag(mode).cancel()
    }

    /// Clear the flag on behalf of a finishing session. Only succeeds if the
    /// session still owns the flag; a newer activation is left untouched.
    pub fn release(&self, token: &SessionToken) -> bool {
        let owned = token.word();
        self.flag(token.mode)
            .word
            .compare_exchange(
                owned,
                owned & !ACTIVE,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
