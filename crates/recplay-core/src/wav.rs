//! Container header manager.
//!
//! Stored artifacts are canonical 44-byte-header PCM WAV files. The header is
//! written with zero size fields before streaming starts and the two size
//! fields are patched in place once the payload length is known.

use crate::config::AudioProfile;
use crate::store::{read_full, StoreFile};

pub const HEADER_LEN: usize = 44;
pub const PCM_FORMAT: u16 = 1;

const CHUNK_SIZE_OFFSET: u32 = 4;
const DATA_SIZE_OFFSET: u32 = 40;
/// Header bytes counted by the RIFF chunk size besides the payload.
const RIFF_OVERHEAD: u32 = HEADER_LEN as u32 - 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ContainerError {
    Truncated(usize),
    BadTag { offset: usize, found: [u8; 4] },
    UnsupportedFormat(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WavHeader {
    pub profile: AudioProfile,
    pub data_size: u32,
}

impl WavHeader {
    pub const fn new(profile: AudioProfile, data_size: u32) -> Self {
        Self { profile, data_size }
    }

    pub const fn chunk_size(&self) -> u32 {
        self.data_size.saturating_add(RIFF_OVERHEAD)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let p = &self.profile;
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&self.chunk_size().to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&16u32.to_le_bytes());
        out[20..22].copy_from_slice(&PCM_FORMAT.to_le_bytes());
        out[22..24].copy_from_slice(&p.channels.to_le_bytes());
        out[24..28].copy_from_slice(&p.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&p.byte_rate().to_le_bytes());
        out[32..34].copy_from_slice(&p.block_align().to_le_bytes());
        out[34..36].copy_from_slice(&p.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }

    /// Parse a canonical header. Byte rate and block align are not read
    /// back; they are always derived from the format fields.
    pub fn parse(bytes: &[u8]) -> Result<Self, ContainerError> {
        if bytes.len() < HEADER_LEN {
            return Err(ContainerError::Truncated(bytes.len()));
        }
        expect_tag(bytes, 0, b"RIFF")?;
        expect_tag(bytes, 8, b"WAVE")?;
        expect_tag(bytes, 12, b"fmt ")?;
        expect_tag(bytes, 36, b"data")?;

        let format = u16_at(bytes, 20);
        if format != PCM_FORMAT {
            return Err(ContainerError::UnsupportedFormat(format));
        }
        Ok(Self {
            profile: AudioProfile {
                channels: u16_at(bytes, 22),
                sample_rate: u32_at(bytes, 24),
                bits_per_sample: u16_at(bytes, 34),
            },
            data_size: u32_at(bytes, 40),
        })
    }
}

fn expect_tag(
    bytes: &[u8],
    offset: usize,
    tag: &[u8; 4],
) -> Result<(), ContainerError> {
    let mut found = [0u8; 4];
    found.copy_from_slice(&bytes[offset..offset + 4]);
    if &found != tag {
        return Err(ContainerError::BadTag { offset, found });
    }
    Ok(())
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Write a full header at the current position (the start of a fresh file).
pub fn write_header<F: StoreFile>(
    file: &mut F,
    profile: &AudioProfile,
    data_size: u32,
) -> Result<(), F::Error> {
    file.write(&WavHeader::new(*profile, data_size).to_bytes())
}

/// Rewrite only the two size fields. Leaves the position after the data
/// size field.
pub fn patch_sizes<F: StoreFile>(
    file: &mut F,
    data_size: u32,
) -> Result<(), F::Error> {
    file.seek(CHUNK_SIZE_OFFSET)?;
    file.write(&data_size.saturating_add(RIFF_OVERHEAD).to_le_bytes())?;
    file.seek(DATA_SIZE_OFFSET)?;
    file.write(&data_size.to_le_bytes())
}

/// What sits at the start of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaderProbe {
    /// Fewer than [`HEADER_LEN`] bytes.
    Short(usize),
    Valid(WavHeader),
    Foreign(ContainerError),
}

/// Read the header from the start of `file`, leaving the position right
/// after it.
pub fn read_header<F: StoreFile>(file: &mut F) -> Result<HeaderProbe, F::Error> {
    file.seek(0)?;
    let mut raw = [0u8; HEADER_LEN];
    let n = read_full(file, &mut raw)?;
    if n < HEADER_LEN {
        return Ok(HeaderProbe::Short(n));
    }
    Ok(match WavHeader::parse(&raw) {
        Ok(header) => HeaderProbe::Valid(header),
        Err(e) => HeaderProbe::Foreign(e),
    })
}

/// Largest payload the size fields can describe.
pub const MAX_DATA_SIZE: u32 = u32::MAX - RIFF_OVERHEAD;
