//! Remote blob store kept in a local directory, laid out like the pairing
//! server: `<root>/uploads/<device>/<file>`. Two simulators pointed at the
//! same root exchange artifacts.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use recplay_core::RemoteBlobStore;
use tracing::debug;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct DirRemote {
    uploads: PathBuf,
}

fn component(s: &str) -> io::Result<&str> {
    if s.is_empty() || s == "." || s == ".." || s.contains(['/', '\\']) {
        return Err(Error::InvalidName(s.to_string()).into());
    }
    Ok(s)
}

impl DirRemote {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { uploads: root.as_ref().join("uploads") }
    }

    fn mailbox(&self, device: &str) -> io::Result<PathBuf> {
        Ok(self.uploads.join(component(device)?))
    }

    fn blob(&self, device: &str, name: &str) -> io::Result<PathBuf> {
        Ok(self.mailbox(device)?.join(component(name)?))
    }
}

impl RemoteBlobStore for DirRemote {
    type Error = io::Error;

    async fn check_exists(&mut self, device: &str) -> io::Result<bool> {
        let mailbox = self.mailbox(device)?;
        let entries = match fs::read_dir(&mailbox) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        for entry in entries {
            if entry?.file_type()?.is_file() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn download(
        &mut self,
        device: &str,
        name: &str,
        offset: u32,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        let mut file = File::open(self.blob(device, name)?)?;
        file.seek(SeekFrom::Start(offset as u64))?;
        file.read(buf)
    }

    async fn upload(
        &mut self,
        device: &str,
        name: &str,
        offset: u32,
        chunk: &[u8],
    ) -> io::Result<()> {
        let path = self.blob(device, name)?;
        if offset == 0 {
            fs::create_dir_all(self.mailbox(device)?)?;
            debug!("Uploading {}", path.display());
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(offset == 0)
            .open(&path)?;
        file.seek(SeekFrom::Start(offset as u64))?;
        file.write_all(chunk)
    }

    async fn delete(&mut self, device: &str, name: &str) -> io::Result<()> {
        fs::remove_file(self.blob(device, name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[futures_test::test]
    async fn upload_lands_in_the_peer_mailbox() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = DirRemote::new(dir.path());
        assert!(!remote.check_exists("garage").await.unwrap());

        remote.upload("garage", "recording.wav", 0, b"RIFF").await.unwrap();
        remote.upload("garage", "recording.wav", 4, b"1234").await.unwrap();

        let path = dir.path().join("uploads/garage/recording.wav");
        assert_eq!(fs::read(path).unwrap(), b"RIFF1234");
        assert!(remote.check_exists("garage").await.unwrap());
        assert!(!remote.check_exists("kitchen").await.unwrap());
    }

    #[futures_test::test]
    async fn fresh_upload_replaces_old_blob() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = DirRemote::new(dir.path());
        remote.upload("garage", "a.wav", 0, b"a long old blob").await.unwrap();
        remote.upload("garage", "a.wav", 0, b"new").await.unwrap();

        let mut buf = [0u8; 32];
        assert_eq!(remote.download("garage", "a.wav", 0, &mut buf).await.unwrap(), 3);
        assert_eq!(&buf[..3], b"new");
    }

    #[futures_test::test]
    async fn download_reads_from_offset_then_delete_empties_mailbox() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = DirRemote::new(dir.path());
        remote.upload("kitchen", "r.wav", 0, b"0123456789").await.unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(remote.download("kitchen", "r.wav", 8, &mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(remote.download("kitchen", "r.wav", 10, &mut buf).await.unwrap(), 0);

        remote.delete("kitchen", "r.wav").await.unwrap();
        assert!(!remote.check_exists("kitchen").await.unwrap());
        let err = remote.download("kitchen", "r.wav", 0, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[futures_test::test]
    async fn device_ids_cannot_escape_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = DirRemote::new(dir.path());
        let err = remote.upload("..", "x.wav", 0, b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
