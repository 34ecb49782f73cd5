//! Streaming sessions.
//!
//! A session runs for the lifetime of one activation of its mode. It checks
//! its [`SessionToken`] at the top of every block, so cancellation takes
//! effect after the in-flight block completes. Whatever way a session ends,
//! it releases its mode flag before returning.

mod capture;
mod playback;

pub use capture::capture;
pub use playback::playback;

use crate::config::AudioProfile;
use crate::mode::{ModeId, SessionToken};
use crate::transport::AudioTransport;

/// Why the block loop stopped. None of these are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopReason {
    /// Mode cleared by timeout or the opposing button.
    Cancelled,
    /// Less than one block of capacity left, or the container is full.
    StorageFull,
    /// The transport returned no data.
    TransportExhausted,
    TransportError,
    StoreError,
    /// Every payload byte has been played.
    SourceExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionReport {
    pub token: SessionToken,
    /// Payload bytes moved between transport and store.
    pub bytes: u32,
    pub blocks: u32,
    pub stop: StopReason,
    /// Capture only: the header size fields were patched.
    pub finalized: bool,
}

impl SessionReport {
    pub fn mode(&self) -> ModeId {
        self.token.mode()
    }
}

/// A session that never entered its block loop.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError<T, S> {
    /// The activation was cancelled before the session began.
    Superseded,
    /// The block buffer cannot hold a single frame.
    BufferTooSmall,
    Configure(T),
    Open(S),
    Header(S),
}

/// Bytes moved per iteration: one configured block, capped by the buffer and
/// kept frame-aligned.
pub(crate) fn block_len(
    profile: &AudioProfile,
    frames: u32,
    buf_len: usize,
) -> usize {
    let align = profile.block_align().max(1) as usize;
    let len = profile.block_bytes(frames).min(buf_len);
    len - len % align
}

/// Push all of `buf` to the transport. Returns `Ok(false)` if the transport
/// stopped accepting data.
pub(crate) async fn write_all<T: AudioTransport>(
    transport: &mut T,
    buf: &[u8],
) -> Result<bool, T::Error> {
    let mut sent = 0;
    while sent < buf.len() {
        let n = transport.write(&buf[sent..]).await?;
        if n == 0 {
            return Ok(false);
        }
        sent += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_len_is_frame_aligned() {
        let stereo24 =
            AudioProfile { sample_rate: 48_000, channels: 2, bits_per_sample: 24 };
        assert_eq!(block_len(&stereo24, 1024, 1 << 16), 6144);
        assert_eq!(block_len(&stereo24, 1024, 1000), 996);
        assert_eq!(block_len(&stereo24, 1024, 5), 0);
    }
}
