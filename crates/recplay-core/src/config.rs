use derive_more::Display;
use embassy_time::Duration;
use heapless::String;

use crate::input::Polarity;

pub const MAX_NAME_LEN: usize = 32;
pub const MAX_DEVICE_ID_LEN: usize = 16;
/// Upper bound on one transfer block, either direction.
pub const MAX_BLOCK_BYTES: usize = 1 << 20;

pub type ArtifactName = String<MAX_NAME_LEN>;
pub type DeviceId = String<MAX_DEVICE_ID_LEN>;

/// Sample format of one direction of the audio transport.
///
/// Byte rate and block align are always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioProfile {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self { sample_rate: 16_000, channels: 1, bits_per_sample: 16 }
    }
}

impl AudioProfile {
    pub const fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub const fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Bytes in one transfer block of `frames` frames.
    pub const fn block_bytes(&self, frames: u32) -> usize {
        (frames as usize).saturating_mul(self.block_align() as usize)
    }

    /// Wall-clock length of `bytes` of audio in this format.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let rate = self.byte_rate().max(1) as u64;
        Duration::from_micros(bytes as u64 * 1_000_000 / rate)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::SampleRate);
        }
        if !matches!(self.channels, 1 | 2) {
            return Err(ConfigError::Channels(self.channels));
        }
        if !matches!(self.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(ConfigError::BitsPerSample(self.bits_per_sample));
        }
        if self.sample_rate.checked_mul(self.block_align() as u32).is_none() {
            return Err(ConfigError::ByteRateOverflow(self.sample_rate));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RemoteConfig {
    /// Identity this device polls for incoming artifacts.
    pub device_id: DeviceId,
    /// Device that receives our captures.
    pub peer_id: DeviceId,
    #[cfg_attr(feature = "serde", serde(default = "RemoteConfig::default_poll_ms"))]
    pub poll_interval_ms: u64,
    #[cfg_attr(feature = "serde", serde(default = "RemoteConfig::default_upload"))]
    pub upload_after_capture: bool,
}

impl RemoteConfig {
    pub const DEFAULT_POLL_MS: u64 = 60_000;

    pub fn new(device_id: DeviceId, peer_id: DeviceId) -> Self {
        Self {
            device_id,
            peer_id,
            poll_interval_ms: Self::DEFAULT_POLL_MS,
            upload_after_capture: true,
        }
    }

    #[cfg(feature = "serde")]
    fn default_poll_ms() -> u64 {
        Self::DEFAULT_POLL_MS
    }

    #[cfg(feature = "serde")]
    fn default_upload() -> bool {
        true
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RecPlayConfig {
    pub debounce_ms: u64,
    pub record_timeout_ms: u64,
    pub play_timeout_ms: u64,
    pub button_polarity: Polarity,
    /// Frames per transport transfer.
    pub block_frames: u32,
    pub capture: AudioProfile,
    pub playback: AudioProfile,
    pub capture_name: ArtifactName,
    pub download_name: ArtifactName,
    pub remote: Option<RemoteConfig>,
}

impl Default for RecPlayConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 30,
            record_timeout_ms: 10_000,
            play_timeout_ms: 10_000,
            button_polarity: Polarity::ActiveLow,
            block_frames: 1024,
            capture: AudioProfile::default(),
            playback: AudioProfile::default(),
            capture_name: name("recording.wav"),
            download_name: name("downloaded.wav"),
            remote: None,
        }
    }
}

fn name(s: &str) -> ArtifactName {
    let mut out = ArtifactName::new();
    // Only called with short literals.
    let _ = out.push_str(s);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[display("mode timeouts must be non-zero")]
    ZeroTimeout,
    #[display("block_frames must be non-zero")]
    ZeroBlock,
    #[display("block_frames {_0} exceeds the transfer buffer limit")]
    BlockTooLarge(u32),
    #[display("sample rate must be non-zero")]
    SampleRate,
    #[display("byte rate of {_0} Hz overflows the header field")]
    ByteRateOverflow(u32),
    #[display("unsupported channel count {_0}")]
    Channels(u16),
    #[display("unsupported bit depth {_0}")]
    BitsPerSample(u16),
    #[display("artifact names must be non-empty")]
    EmptyName,
    #[display("capture and download artifacts must differ")]
    NameClash,
    #[display("remote poll interval must be non-zero")]
    ZeroPollInterval,
}

impl RecPlayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.record_timeout_ms == 0 || self.play_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.block_frames == 0 {
            return Err(ConfigError::ZeroBlock);
        }
        self.capture.validate()?;
        self.playback.validate()?;
        if self.max_block_bytes() > MAX_BLOCK_BYTES {
            return Err(ConfigError::BlockTooLarge(self.block_frames));
        }
        if self.capture_name.is_empty() || self.download_name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.capture_name == self.download_name {
            return Err(ConfigError::NameClash);
        }
        if let Some(remote) = &self.remote {
            if remote.poll_interval_ms == 0 {
                return Err(ConfigError::ZeroPollInterval);
            }
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn record_timeout(&self) -> Duration {
        Duration::from_millis(self.record_timeout_ms)
    }

    pub fn play_timeout(&self) -> Duration {
        Duration::from_millis(self.play_timeout_ms)
    }

    /// Largest block either direction transfers, for sizing the shared
    /// buffer.
    pub fn max_block_bytes(&self) -> usize {
        self.capture
            .block_bytes(self.block_frames)
            .max(self.playback.block_bytes(self.block_frames))
    }
}
