use super::{block_len, write_all, SessionError, SessionReport, StopReason};
use crate::config::RecPlayConfig;
use crate::mode::{ModeFlags, SessionToken};
use crate::store::{ByteStore, OpenMode, StoreFile};
use crate::transport::{AudioTransport, Direction};
use crate::wav::{self, HeaderProbe};

/// Play the payload of `name` to the transport until the activation ends or
/// the artifact is exhausted.
pub async fn playback<T, S>(
    flags: &ModeFlags,
    token: SessionToken,
    transport: &mut T,
    store: &S,
    config: &RecPlayConfig,
    name: &str,
    buf: &mut [u8],
) -> Result<SessionReport, SessionError<T::Error, S::Error>>
where
    T: AudioTransport,
    S: ByteStore,
{
    let result = play(flags, token, transport, store, config, name, buf).await;
    flags.release(&token);
    result
}

async fn play<T, S>(
    flags: &ModeFlags,
    token: SessionToken,
    transport: &mut T,
    store: &S,
    config: &RecPlayConfig,
    name: &str,
    buf: &mut [u8],
) -> Result<SessionReport, SessionError<T::Error, S::Error>>
where
    T: AudioTransport,
    S: ByteStore,
{
    if !flags.is_current(&token) {
        return Err(SessionError::Superseded);
    }
    let profile = &config.playback;
    let block = block_len(profile, config.block_frames, buf.len());
    if block == 0 {
        return Err(SessionError::BufferTooSmall);
    }
    let buf = &mut buf[..block];

    transport
        .configure(Direction::Playback, profile)
        .await
        .map_err(SessionError::Configure)?;

    let mut file = match store.open(name, OpenMode::Read) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to open {} for playback: {:?}", name, dbg_fmt!(e));
            return Err(SessionError::Open(e));
        }
    };

    let mut remaining = match wav::read_header(&mut file) {
        Ok(HeaderProbe::Valid(header)) => {
            if header.profile != *profile {
                warn!(
                    "{} was recorded as {:?}, playing as {:?}",
                    name, header.profile, profile
                );
            }
            // A zero size is an unpatched header: play whatever follows.
            (header.data_size > 0).then_some(header.data_size)
        }
        Ok(HeaderProbe::Short(n)) => {
            info!("{} has no payload ({} bytes)", name, n);
            let _ = file.close();
            return Ok(SessionReport {
                token,
                bytes: 0,
                blocks: 0,
                stop: StopReason::SourceExhausted,
                finalized: false,
            });
        }
        Ok(HeaderProbe::Foreign(e)) => {
            warn!("{} has a foreign header ({:?}), skipping it", name, e);
            None
        }
        Err(e) => {
            error!("Failed to read header of {}: {:?}", name, dbg_fmt!(e));
            let _ = file.close();
            return Err(SessionError::Header(e));
        }
    };
    info!("Playing {} in {} byte blocks", name, block);

    let mut total: u32 = 0;
    let mut blocks: u32 = 0;
    let stop = loop {
        if !flags.is_current(&token) {
            break StopReason::Cancelled;
        }

        let want = match remaining {
            Some(0) => break StopReason::SourceExhausted,
            Some(left) => block.min(left as usize),
            None => block,
        };
        let n = match file.read(&mut buf[..want]) {
            Ok(0) => break StopReason::SourceExhausted,
            Ok(n) => n,
            Err(e) => {
                warn!("Store read failed: {:?}", dbg_fmt!(e));
                break StopReason::StoreError;
            }
        };
        match write_all(transport, &buf[..n]).await {
            Ok(true) => {}
            Ok(false) => break StopReason::TransportExhausted,
            Err(e) => {
                warn!("Audio write failed: {:?}", dbg_fmt!(e));
                break StopReason::TransportError;
            }
        }
        total += n as u32;
        blocks += 1;
        if let Some(left) = remaining.as_mut() {
            *left -= n as u32;
        }
    };

    if let Err(e) = file.close() {
        warn!("Failed to close {}: {:?}", name, dbg_fmt!(e));
    }
    info!(
        "Playback stopped ({:?}): {} bytes in {} blocks",
        stop, total, blocks
    );
    Ok(SessionReport { token, bytes: total, blocks, stop, finalized: false })
}
