//! Networked blob store and the two sync operations built on it.
//!
//! The remote keeps one mailbox per device. A device polls its own mailbox
//! for an incoming artifact and uploads its captures into its peer's.

use core::convert::Infallible;
use core::fmt::Debug;

use crate::config::{RecPlayConfig, RemoteConfig};
use crate::store::{ByteStore, OpenMode, StoreFile};

#[allow(async_fn_in_trait)]
pub trait RemoteBlobStore {
    type Error: Debug;

    /// Whether the mailbox of `device` holds an artifact.
    async fn check_exists(&mut self, device: &str) -> Result<bool, Self::Error>;

    /// Read the blob starting at `offset`. `Ok(0)` means the end.
    async fn download(
        &mut self,
        device: &str,
        name: &str,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<usize, Self::Error>;

    /// Store `chunk` at `offset`. Offset 0 starts a fresh blob.
    async fn upload(
        &mut self,
        device: &str,
        name: &str,
        offset: u32,
        chunk: &[u8],
    ) -> Result<(), Self::Error>;

    async fn delete(&mut self, device: &str, name: &str) -> Result<(), Self::Error>;
}

/// Stand-in for builds without networking. Never has anything to fetch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRemote;

impl RemoteBlobStore for NoRemote {
    type Error = Infallible;

    async fn check_exists(&mut self, _device: &str) -> Result<bool, Infallible> {
        Ok(false)
    }

    async fn download(
        &mut self,
        _device: &str,
        _name: &str,
        _offset: u32,
        _buf: &mut [u8],
    ) -> Result<usize, Infallible> {
        Ok(0)
    }

    async fn upload(
        &mut self,
        _device: &str,
        _name: &str,
        _offset: u32,
        _chunk: &[u8],
    ) -> Result<(), Infallible> {
        Ok(())
    }

    async fn delete(&mut self, _device: &str, _name: &str) -> Result<(), Infallible> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncError<R, S> {
    Remote(R),
    Store(S),
    /// The download would not fit in the remaining capacity.
    StorageFull,
    /// The blob does not fit the container's size fields.
    TooLarge,
}

/// Pull the artifact waiting in our mailbox into `config.download_name`.
///
/// Returns the downloaded size, or `None` if the mailbox was empty. A failed
/// download leaves no partial file behind. The remote copy is deleted only
/// after the local one is complete.
pub async fn fetch_incoming<R, S>(
    remote: &mut R,
    store: &S,
    remote_cfg: &RemoteConfig,
    config: &RecPlayConfig,
    buf: &mut [u8],
) -> Result<Option<u32>, SyncError<R::Error, S::Error>>
where
    R: RemoteBlobStore,
    S: ByteStore,
{
    let device = remote_cfg.device_id.as_str();
    let name = config.capture_name.as_str();
    let local = config.download_name.as_str();

    if !remote.check_exists(device).await.map_err(SyncError::Remote)? {
        trace!("No incoming artifact for {}", device);
        return Ok(None);
    }
    info!("Downloading {} for {} into {}", name, device, local);

    let mut file = store.open(local, OpenMode::Write).map_err(SyncError::Store)?;
    let copied = download_into(remote, store, &mut file, device, name, buf).await;
    let closed = file.close().map_err(SyncError::Store);

    let total = match copied.and_then(|total| closed.map(|()| total)) {
        Ok(total) => total,
        Err(e) => {
            if let Err(re) = store.remove(local) {
                warn!("Failed to remove partial {}: {:?}", local, dbg_fmt!(re));
            }
            return Err(e);
        }
    };

    if total == 0 {
        warn!("Incoming {} was empty, discarding", name);
        if let Err(e) = store.remove(local) {
            warn!("Failed to remove {}: {:?}", local, dbg_fmt!(e));
        }
    } else {
        info!("Downloaded {} bytes", total);
    }

    // A failed delete only means the same artifact is fetched again later.
    if let Err(e) = remote.delete(device, name).await {
        warn!("Failed to delete remote {}: {:?}", name, dbg_fmt!(e));
    }
    Ok((total > 0).then_some(total))
}

async fn download_into<R, S>(
    remote: &mut R,
    store: &S,
    file: &mut S::File<'_>,
    device: &str,
    name: &str,
    buf: &mut [u8],
) -> Result<u32, SyncError<R::Error, S::Error>>
where
    R: RemoteBlobStore,
    S: ByteStore,
{
    let mut offset: u32 = 0;
    loop {
        let n = remote
            .download(device, name, offset, buf)
            .await
            .map_err(SyncError::Remote)?;
        if n == 0 {
            return Ok(offset);
        }
        let n = n.min(buf.len());
        if store.capacity_remaining() < n as u64 {
            return Err(SyncError::StorageFull);
        }
        file.write(&buf[..n]).map_err(SyncError::Store)?;
        offset = u32::try_from(n)
            .ok()
            .and_then(|n| offset.checked_add(n))
            .ok_or(SyncError::TooLarge)?;
    }
}

/// Push the local artifact `name` into the mailbox of `peer`. Returns the
/// uploaded size.
pub async fn upload_artifact<R, S>(
    remote: &mut R,
    store: &S,
    peer: &str,
    name: &str,
    buf: &mut [u8],
) -> Result<u32, SyncError<R::Error, S::Error>>
where
    R: RemoteBlobStore,
    S: ByteStore,
{
    let mut file = store.open(name, OpenMode::Read).map_err(SyncError::Store)?;
    let mut offset: u32 = 0;
    let sent = loop {
        let n = match file.read(buf) {
            Ok(0) => break Ok(offset),
            Ok(n) => n,
            Err(e) => break Err(SyncError::Store(e)),
        };
        if let Err(e) = remote.upload(peer, name, offset, &buf[..n]).await {
            break Err(SyncError::Remote(e));
        }
        match u32::try_from(n).ok().and_then(|n| offset.checked_add(n)) {
            Some(next) => offset = next,
            None => break Err(SyncError::TooLarge),
        }
    };
    if let Err(e) = file.close() {
        warn!("Failed to close {}: {:?}", name, dbg_fmt!(e));
    }
    let sent = sent?;
    info!("Uploaded {} bytes of {} to {}", sent, name, peer);
    Ok(sent)
}
