//! Sequential byte store collaborator (SD-card-like filesystem).

use core::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenMode {
    /// Create or truncate, then write from the start.
    Write,
    Read,
}

/// An open artifact. Positions are absolute byte offsets.
pub trait StoreFile {
    type Error: Debug;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read up to `buf.len()` bytes. `Ok(0)` means end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    fn seek(&mut self, offset: u32) -> Result<(), Self::Error>;

    /// Flush and release the handle.
    fn close(self) -> Result<(), Self::Error>;
}

pub trait ByteStore {
    type Error: Debug;
    type File<'a>: StoreFile<Error = Self::Error>
    where
        Self: 'a;

    fn exists(&self, name: &str) -> bool;

    fn remove(&self, name: &str) -> Result<(), Self::Error>;

    fn open(
        &self,
        name: &str,
        mode: OpenMode,
    ) -> Result<Self::File<'_>, Self::Error>;

    /// Free bytes left for new data.
    fn capacity_remaining(&self) -> u64;
}

/// Fill `buf` completely unless the file ends first. Returns bytes read.
pub fn read_full<F: StoreFile>(
    file: &mut F,
    buf: &mut [u8],
) -> Result<usize, F::Error> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
