use super::{block_len, SessionError, SessionReport, StopReason};
use crate::config::RecPlayConfig;
use crate::mode::{ModeFlags, SessionToken};
use crate::store::{ByteStore, OpenMode, StoreFile};
use crate::transport::{AudioTransport, Direction};
use crate::wav::{self, MAX_DATA_SIZE};

/// Record from the transport into `config.capture_name` until the activation
/// ends, storage fills up or the transport stops delivering.
pub async fn capture<T, S>(
    flags: &ModeFlags,
    token: SessionToken,
    transport: &mut T,
    store: &S,
    config: &RecPlayConfig,
    buf: &mut [u8],
) -> Result<SessionReport, SessionError<T::Error, S::Error>>
where
    T: AudioTransport,
    S: ByteStore,
{
    let result = record(flags, token, transport, store, config, buf).await;
    flags.release(&token);
    result
}

async fn record<T, S>(
    flags: &ModeFlags,
    token: SessionToken,
    transport: &mut T,
    store: &S,
    config: &RecPlayConfig,
    buf: &mut [u8],
) -> Result<SessionReport, SessionError<T::Error, S::Error>>
where
    T: AudioTransport,
    S: ByteStore,
{
    if !flags.is_current(&token) {
        return Err(SessionError::Superseded);
    }
    let profile = &config.capture;
    let block = block_len(profile, config.block_frames, buf.len());
    if block == 0 {
        return Err(SessionError::BufferTooSmall);
    }
    let buf = &mut buf[..block];

    transport
        .configure(Direction::Capture, profile)
        .await
        .map_err(SessionError::Configure)?;

    let name = config.capture_name.as_str();
    let mut file = match store.open(name, OpenMode::Write) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to open {} for recording: {:?}", name, dbg_fmt!(e));
            return Err(SessionError::Open(e));
        }
    };
    if let Err(e) = wav::write_header(&mut file, profile, 0) {
        error!("Failed to write header: {:?}", dbg_fmt!(e));
        let _ = file.close();
        return Err(SessionError::Header(e));
    }
    info!("Recording to {} in {} byte blocks", name, block);

    let mut total: u32 = 0;
    let mut blocks: u32 = 0;
    let stop = loop {
        if !flags.is_current(&token) {
            break StopReason::Cancelled;
        }

        let n = match transport.read(buf).await {
            Ok(0) => break StopReason::TransportExhausted,
            Ok(n) => n.min(block),
            Err(e) => {
                warn!("Audio read failed: {:?}", dbg_fmt!(e));
                break StopReason::TransportError;
            }
        };
        if let Err(e) = file.write(&buf[..n]) {
            warn!("Store write failed: {:?}", dbg_fmt!(e));
            break StopReason::StoreError;
        }
        total += n as u32;
        blocks += 1;

        if store.capacity_remaining() < block as u64 {
            info!("Storage full after {} bytes", total);
            break StopReason::StorageFull;
        }
        if total > MAX_DATA_SIZE - block as u32 {
            info!("Container size limit reached after {} bytes", total);
            break StopReason::StorageFull;
        }
    };

    let finalized = if total > 0 {
        match wav::patch_sizes(&mut file, total) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to patch header sizes: {:?}", dbg_fmt!(e));
                false
            }
        }
    } else {
        warn!("Recording captured no audio; {} holds only a header", name);
        false
    };
    if let Err(e) = file.close() {
        warn!("Failed to close {}: {:?}", name, dbg_fmt!(e));
    }

    info!(
        "Recording stopped ({:?}): {} bytes in {} blocks",
        stop, total, blocks
    );
    Ok(SessionReport { token, bytes: total, blocks, stop, finalized })
}
