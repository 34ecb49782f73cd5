//! Simulated I2S peripheral: a tone generator on the capture side and a
//! speaker sink on the playback side.

use std::f32::consts::TAU;
use std::fs::File;
use std::io::{BufWriter, Write};

use derive_more::Display;
use embassy_time::Timer;
use recplay_core::{AudioProfile, AudioTransport, Direction};
use tracing::{debug, info};

#[derive(Debug, Display)]
pub enum AudioError {
    NotConfigured,
    #[display("transport configured for {_0:?}")]
    WrongDirection(Direction),
    Speaker(std::io::Error),
}

impl std::error::Error for AudioError {}

pub struct SimAudio {
    setup: Option<(Direction, AudioProfile)>,
    tone_hz: f32,
    phase: f32,
    /// Capture frames left before the microphone runs dry.
    frames_left: Option<u64>,
    /// Sleep for the real duration of every transfer.
    paced: bool,
    speaker: Option<BufWriter<File>>,
    played: u64,
}

impl SimAudio {
    pub fn new(tone_hz: f32) -> Self {
        Self {
            setup: None,
            tone_hz,
            phase: 0.0,
            frames_left: None,
            paced: false,
            speaker: None,
            played: 0,
        }
    }

    /// Transfers take as long as the audio they carry.
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    /// Stop delivering samples after `frames` captured frames.
    pub fn with_capture_limit(mut self, frames: u64) -> Self {
        self.frames_left = Some(frames);
        self
    }

    /// Append everything played, as raw PCM, to `file`.
    pub fn with_speaker(mut self, file: File) -> Self {
        self.speaker = Some(BufWriter::new(file));
        self
    }

    /// Bytes accepted by the playback side so far.
    pub fn played(&self) -> u64 {
        self.played
    }

    fn profile_for(&self, direction: Direction) -> Result<AudioProfile, AudioError> {
        match self.setup {
            None => Err(AudioError::NotConfigured),
            Some((d, profile)) if d == direction => Ok(profile),
            Some((d, _)) => Err(AudioError::WrongDirection(d)),
        }
    }

    fn next_sample(&mut self, sample_rate: u32) -> f32 {
        let s = self.phase.sin() * 0.5;
        self.phase = (self.phase + TAU * self.tone_hz / sample_rate as f32) % TAU;
        s
    }

    async fn pace(&self, profile: &AudioProfile, bytes: usize) {
        if self.paced {
            Timer::after(profile.duration_of(bytes)).await;
        }
    }
}

/// Little-endian PCM encoding of `s` in `[-1, 1]`. 8-bit PCM is unsigned.
fn encode(s: f32, bits: u16, out: &mut [u8]) {
    match bits {
        8 => out[0] = ((s * i8::MAX as f32) as i16 + 128) as u8,
        16 => out.copy_from_slice(&((s * i16::MAX as f32) as i16).to_le_bytes()),
        24 => {
            let v = (s * 8_388_607.0) as i32;
            out.copy_from_slice(&v.to_le_bytes()[..3]);
        }
        _ => out.copy_from_slice(&((s * i32::MAX as f32) as i32).to_le_bytes()),
    }
}

impl AudioTransport for SimAudio {
    type Error = AudioError;

    async fn configure(
        &mut self,
        direction: Direction,
        profile: &AudioProfile,
    ) -> Result<(), AudioError> {
        if let Some(speaker) = self.speaker.as_mut() {
            speaker.flush().map_err(AudioError::Speaker)?;
        }
        info!(
            "Audio configured for {:?}: {} Hz, {} ch, {} bit",
            direction, profile.sample_rate, profile.channels, profile.bits_per_sample
        );
        self.setup = Some((direction, *profile));
        self.phase = 0.0;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError> {
        let profile = self.profile_for(Direction::Capture)?;
        let frame = profile.block_align() as usize;
        let sample = (profile.bits_per_sample / 8) as usize;

        let mut frames = (buf.len() / frame) as u64;
        if let Some(left) = self.frames_left.as_mut() {
            frames = frames.min(*left);
            *left -= frames;
        }
        let len = frames as usize * frame;
        for chunk in buf[..len].chunks_exact_mut(frame) {
            let s = self.next_sample(profile.sample_rate);
            for ch in chunk.chunks_exact_mut(sample) {
                encode(s, profile.bits_per_sample, ch);
            }
        }
        self.pace(&profile, len).await;
        Ok(len)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, AudioError> {
        let profile = self.profile_for(Direction::Playback)?;
        if let Some(speaker) = self.speaker.as_mut() {
            speaker.write_all(buf).map_err(AudioError::Speaker)?;
        }
        self.played += buf.len() as u64;
        debug!("Played {} bytes ({} total)", buf.len(), self.played);
        self.pace(&profile, buf.len()).await;
        Ok(buf.len())
    }
}
