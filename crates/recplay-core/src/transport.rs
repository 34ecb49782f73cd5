//! Audio transport collaborator (I2S-like sampling/playback peripheral).

use core::fmt::Debug;

use crate::config::AudioProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Capture,
    Playback,
}

/// Transfers wait until the peripheral has moved the data; a session awaiting
/// one never stalls the poll loop.
#[allow(async_fn_in_trait)]
pub trait AudioTransport {
    type Error: Debug;

    /// Tear down and reinstall the peripheral for `direction`. Called at the
    /// start of every session since capture and playback may use different
    /// profiles.
    async fn configure(
        &mut self,
        direction: Direction,
        profile: &AudioProfile,
    ) -> Result<(), Self::Error>;

    /// Fill `buf` with captured samples. Returns bytes read.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Queue `buf` for output. Returns bytes written.
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
}
