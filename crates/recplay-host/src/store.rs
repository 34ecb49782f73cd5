//! Byte store backed by a directory, standing in for the SD card.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use recplay_core::{ByteStore, OpenMode, StoreFile};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Artifacts live flat in `root`. `quota` plays the role of the card size.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    quota: u64,
}

impl FsStore {
    /// Fails while `root` is missing, like an absent card.
    pub fn mount(root: impl Into<PathBuf>, quota: u64) -> Result<Self> {
        let root = root.into();
        if !fs::metadata(&root).map(|m| m.is_dir()).unwrap_or(false) {
            return Err(Error::NotMounted(root.display().to_string()));
        }
        debug!("Mounted {} with {} byte quota", root.display(), quota);
        Ok(Self { root, quota })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> io::Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(Error::InvalidName(name.to_string()).into());
        }
        Ok(self.root.join(name))
    }

    /// Bytes held by all artifacts in the store.
    pub fn used(&self) -> io::Result<u64> {
        let mut used = 0;
        for entry in fs::read_dir(&self.root)? {
            let meta = entry?.metadata()?;
            if meta.is_file() {
                used += meta.len();
            }
        }
        Ok(used)
    }
}

pub struct FsFile {
    file: File,
}

impl StoreFile for FsFile {
    type Error = io::Error;

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, offset: u32) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset as u64)).map(|_| ())
    }

    fn close(mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }
}

impl ByteStore for FsStore {
    type Error = io::Error;
    type File<'a> = FsFile where Self: 'a;

    fn exists(&self, name: &str) -> bool {
        self.path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        fs::remove_file(self.path(name)?)
    }

    fn open(&self, name: &str, mode: OpenMode) -> io::Result<FsFile> {
        let path = self.path(name)?;
        let file = match mode {
            OpenMode::Write => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?,
            OpenMode::Read => File::open(path)?,
        };
        Ok(FsFile { file })
    }

    fn capacity_remaining(&self) -> u64 {
        match self.used() {
            Ok(used) => self.quota.saturating_sub(used),
            Err(e) => {
                warn!("Cannot size store: {}", e);
                0
            }
        }
    }
}
