#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use embassy_time::Instant;
use recplay_core::{
    Arbiter, AudioProfile, AudioTransport, ButtonLevels, ByteStore, Controller,
    Decision, Direction, ModeId, OpenMode, RemoteBlobStore, SessionToken,
    StoreFile, WavHeader,
};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Press `mode` through the arbiter and return the started session.
pub fn start(arbiter: &mut Arbiter<'_>, mode: ModeId) -> SessionToken {
    match arbiter.on_pressed(mode, Instant::from_millis(0)) {
        Decision::Start { token, .. } => token,
        d => panic!("{:?} did not start: {:?}", mode, d),
    }
}

/// Active-low levels with only `mode`'s button held.
pub fn held(mode: Option<ModeId>) -> ButtonLevels {
    ButtonLevels {
        record: mode != Some(ModeId::Recording),
        play: mode != Some(ModeId::Playing),
    }
}

/// Press and release `mode` through the controller starting at `at_ms`.
pub fn press(ctl: &mut Controller<'_>, mode: ModeId, at_ms: u64) -> SessionToken {
    let mut started = None;
    for t in at_ms..=at_ms + 40 {
        if let Some(token) = ctl.poll(held(Some(mode)), Instant::from_millis(t)).started {
            started = Some(token);
        }
    }
    for t in at_ms + 41..=at_ms + 80 {
        ctl.poll(held(None), Instant::from_millis(t));
    }
    started.expect("press should start the mode")
}

pub fn wav_bytes(profile: AudioProfile, payload: &[u8]) -> Vec<u8> {
    let mut out = WavHeader::new(profile, payload.len() as u32).to_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| i as u8).collect()
}

// ---------------------------------------------------------------------------
// In-memory byte store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemError {
    NotFound,
    Full,
    Injected,
}

pub struct MemStore {
    files: RefCell<BTreeMap<String, Vec<u8>>>,
    capacity: u64,
    /// Writes allowed before every further write fails.
    writes_left: Cell<Option<usize>>,
    fail_reads: Cell<bool>,
    fail_open: Cell<bool>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::with_capacity(u64::MAX)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            files: RefCell::new(BTreeMap::new()),
            capacity,
            writes_left: Cell::new(None),
            fail_reads: Cell::new(false),
            fail_open: Cell::new(false),
        }
    }

    pub fn insert(&self, name: &str, bytes: Vec<u8>) {
        self.files.borrow_mut().insert(name.to_string(), bytes);
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(name).cloned()
    }

    pub fn fail_writes_after(&self, writes: usize) {
        self.writes_left.set(Some(writes));
    }

    pub fn fail_reads(&self) {
        self.fail_reads.set(true);
    }

    pub fn fail_open(&self) {
        self.fail_open.set(true);
    }

    fn used(&self) -> u64 {
        self.files.borrow().values().map(|f| f.len() as u64).sum()
    }
}

pub struct MemFile<'a> {
    store: &'a MemStore,
    name: String,
    pos: usize,
}

impl StoreFile for MemFile<'_> {
    type Error = MemError;

    fn write(&mut self, bytes: &[u8]) -> Result<(), MemError> {
        if let Some(left) = self.store.writes_left.get() {
            if left == 0 {
                return Err(MemError::Injected);
            }
            self.store.writes_left.set(Some(left - 1));
        }
        let used = self.store.used();
        let mut files = self.store.files.borrow_mut();
        let file = files.get_mut(&self.name).ok_or(MemError::NotFound)?;
        let end = self.pos + bytes.len();
        let growth = end.saturating_sub(file.len()) as u64;
        if used + growth > self.store.capacity {
            return Err(MemError::Full);
        }
        if end > file.len() {
            file.resize(end, 0);
        }
        file[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MemError> {
        if self.store.fail_reads.get() {
            return Err(MemError::Injected);
        }
        let files = self.store.files.borrow();
        let file = files.get(&self.name).ok_or(MemError::NotFound)?;
        let start = self.pos.min(file.len());
        let n = buf.len().min(file.len() - start);
        buf[..n].copy_from_slice(&file[start..start + n]);
        self.pos = start + n;
        Ok(n)
    }

    fn seek(&mut self, offset: u32) -> Result<(), MemError> {
        self.pos = offset as usize;
        Ok(())
    }

    fn close(self) -> Result<(), MemError> {
        Ok(())
    }
}

impl ByteStore for MemStore {
    type Error = MemError;
    type File<'a> = MemFile<'a> where Self: 'a;

    fn exists(&self, name: &str) -> bool {
        self.files.borrow().contains_key(name)
    }

    fn remove(&self, name: &str) -> Result<(), MemError> {
        self.files
            .borrow_mut()
            .remove(name)
            .map(|_| ())
            .ok_or(MemError::NotFound)
    }

    fn open(&self, name: &str, mode: OpenMode) -> Result<MemFile<'_>, MemError> {
        if self.fail_open.get() {
            return Err(MemError::Injected);
        }
        match mode {
            OpenMode::Write => {
                self.files.borrow_mut().insert(name.to_string(), Vec::new());
            }
            OpenMode::Read if !self.exists(name) => return Err(MemError::NotFound),
            OpenMode::Read => {}
        }
        Ok(MemFile { store: self, name: name.to_string(), pos: 0 })
    }

    fn capacity_remaining(&self) -> u64 {
        self.capacity.saturating_sub(self.used())
    }
}

// ---------------------------------------------------------------------------
// Mock audio transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioError {
    Configure,
    Read,
    Write,
}

/// Produces a counting byte pattern on capture and records everything played.
pub struct MockTransport<'a> {
    pub configured: Vec<(Direction, AudioProfile)>,
    /// Every byte handed out by `read`.
    pub captured: Vec<u8>,
    /// Every byte accepted by `write`.
    pub played: Vec<u8>,
    /// Reads served before the source runs dry.
    pub reads_left: Option<usize>,
    pub fail_read_at: Option<usize>,
    pub fail_write_at: Option<usize>,
    pub fail_configure: bool,
    /// Largest write accepted at once.
    pub max_write: Option<usize>,
    transfers: usize,
    next: u8,
    hook: Option<Box<dyn FnMut(usize) + 'a>>,
}

impl<'a> MockTransport<'a> {
    pub fn new() -> Self {
        Self {
            configured: Vec::new(),
            captured: Vec::new(),
            played: Vec::new(),
            reads_left: None,
            fail_read_at: None,
            fail_write_at: None,
            fail_configure: false,
            max_write: None,
            transfers: 0,
            next: 0,
            hook: None,
        }
    }

    pub fn with_reads(reads: usize) -> Self {
        Self { reads_left: Some(reads), ..Self::new() }
    }

    /// Run `hook` with the transfer count after every completed transfer.
    pub fn on_transfer(mut self, hook: impl FnMut(usize) + 'a) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    fn completed(&mut self) {
        self.transfers += 1;
        if let Some(hook) = self.hook.as_mut() {
            hook(self.transfers);
        }
    }
}

impl AudioTransport for MockTransport<'_> {
    type Error = AudioError;

    async fn configure(
        &mut self,
        direction: Direction,
        profile: &AudioProfile,
    ) -> Result<(), AudioError> {
        if self.fail_configure {
            return Err(AudioError::Configure);
        }
        self.configured.push((direction, *profile));
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError> {
        if self.fail_read_at == Some(self.transfers) {
            return Err(AudioError::Read);
        }
        match self.reads_left.as_mut() {
            Some(0) => return Ok(0),
            Some(left) => *left -= 1,
            None => {}
        }
        for b in buf.iter_mut() {
            *b = self.next;
            self.next = self.next.wrapping_add(1);
        }
        self.captured.extend_from_slice(buf);
        self.completed();
        Ok(buf.len())
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, AudioError> {
        if self.fail_write_at == Some(self.transfers) {
            return Err(AudioError::Write);
        }
        let n = buf.len().min(self.max_write.unwrap_or(usize::MAX));
        self.played.extend_from_slice(&buf[..n]);
        self.completed();
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Mock remote blob store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteError {
    Offline,
    NotFound,
}

/// Mailboxes keyed by `(device, name)`.
#[derive(Default)]
pub struct MockRemote {
    pub blobs: BTreeMap<(String, String), Vec<u8>>,
    /// Largest chunk handed out per download call.
    pub chunk: Option<usize>,
    /// Download calls served before the link drops.
    pub downloads_left: Option<usize>,
    pub fail_delete: bool,
    pub offline: bool,
}

impl MockRemote {
    pub fn with_blob(device: &str, name: &str, bytes: Vec<u8>) -> Self {
        let mut remote = Self::default();
        remote.blobs.insert((device.to_string(), name.to_string()), bytes);
        remote
    }

    pub fn blob(&self, device: &str, name: &str) -> Option<&Vec<u8>> {
        self.blobs.get(&(device.to_string(), name.to_string()))
    }
}

impl RemoteBlobStore for MockRemote {
    type Error = RemoteError;

    async fn check_exists(&mut self, device: &str) -> Result<bool, RemoteError> {
        if self.offline {
            return Err(RemoteError::Offline);
        }
        Ok(self.blobs.keys().any(|(d, _)| d == device))
    }

    async fn download(
        &mut self,
        device: &str,
        name: &str,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<usize, RemoteError> {
        match self.downloads_left.as_mut() {
            Some(0) => return Err(RemoteError::Offline),
            Some(left) => *left -= 1,
            None => {}
        }
        let chunk = self.chunk.unwrap_or(usize::MAX);
        let blob = self.blob(device, name).ok_or(RemoteError::NotFound)?;
        let start = (offset as usize).min(blob.len());
        let n = buf.len().min(chunk).min(blob.len() - start);
        buf[..n].copy_from_slice(&blob[start..start + n]);
        Ok(n)
    }

    async fn upload(
        &mut self,
        device: &str,
        name: &str,
        offset: u32,
        chunk: &[u8],
    ) -> Result<(), RemoteError> {
        if self.offline {
            return Err(RemoteError::Offline);
        }
        let blob = self
            .blobs
            .entry((device.to_string(), name.to_string()))
            .or_default();
        if offset == 0 {
            blob.clear();
        }
        assert_eq!(blob.len(), offset as usize, "upload offsets must be contiguous");
        blob.extend_from_slice(chunk);
        Ok(())
    }

    async fn delete(&mut self, device: &str, name: &str) -> Result<(), RemoteError> {
        if self.fail_delete {
            return Err(RemoteError::Offline);
        }
        self.blobs
            .remove(&(device.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or(RemoteError::NotFound)
    }
}
