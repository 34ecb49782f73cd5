//! The single long-lived owner of the audio transport, the byte store and the
//! remote. Sessions and remote syncs are served one at a time, so a new
//! session never touches the store before the previous one has finalized.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Receiver, Sender};
use heapless::Vec;

use crate::config::RecPlayConfig;
use crate::mode::{ModeFlags, ModeId, SessionToken};
use crate::remote::{fetch_incoming, upload_artifact, RemoteBlobStore};
use crate::session::{self, SessionReport};
use crate::store::ByteStore;
use crate::transport::AudioTransport;

/// Work queued for the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Run the session for a freshly started mode.
    Session(SessionToken),
    /// Poll the remote mailbox.
    FetchRemote,
}

/// Artifact the next playback session reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackSource {
    #[default]
    Capture,
    Download,
}

/// What handling one request amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunnerEvent {
    Finished(SessionReport),
    /// The session could not start or was superseded before it began.
    Aborted(ModeId),
    /// The token was already stale when dequeued.
    Skipped(SessionToken),
    Uploaded(u32),
    UploadFailed,
    Fetched(u32),
    NothingToFetch,
    FetchFailed,
    /// No remote is configured.
    RemoteDisabled,
}

pub type RunnerEvents = Vec<RunnerEvent, 2>;

/// Queue the session for a freshly started mode without waiting. When the
/// queue is full the activation is released instead, so the poll loop
/// settles the mode on its next cycle. Returns whether it was queued.
pub fn submit_session<M: RawMutex, const N: usize>(
    requests: Sender<'_, M, Request, N>,
    flags: &ModeFlags,
    token: SessionToken,
) -> bool {
    if requests.try_send(Request::Session(token)).is_ok() {
        return true;
    }
    warn!("Runner queue full, dropping {} session", token.mode().label());
    flags.release(&token);
    false
}

pub struct SessionRunner<'a, T, S, R> {
    flags: &'a ModeFlags,
    config: &'a RecPlayConfig,
    transport: T,
    store: S,
    remote: R,
    buf: &'a mut [u8],
    source: PlaybackSource,
}

impl<'a, T, S, R> SessionRunner<'a, T, S, R>
where
    T: AudioTransport,
    S: ByteStore,
    R: RemoteBlobStore,
{
    /// `buf` should hold [`RecPlayConfig::max_block_bytes`]; sessions shrink
    /// their blocks to fit otherwise.
    pub fn new(
        flags: &'a ModeFlags,
        config: &'a RecPlayConfig,
        transport: T,
        store: S,
        remote: R,
        buf: &'a mut [u8],
    ) -> Self {
        Self {
            flags,
            config,
            transport,
            store,
            remote,
            buf,
            source: PlaybackSource::default(),
        }
    }

    pub fn source(&self) -> PlaybackSource {
        self.source
    }

    pub fn set_source(&mut self, source: PlaybackSource) {
        self.source = source;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    fn playback_name(&self) -> &'a str {
        match self.source {
            PlaybackSource::Capture => self.config.capture_name.as_str(),
            PlaybackSource::Download => self.config.download_name.as_str(),
        }
    }

    /// Serve requests forever. Never returns.
    pub async fn run<M: RawMutex, const N: usize>(
        &mut self,
        requests: Receiver<'_, M, Request, N>,
    ) {
        loop {
            let request = requests.receive().await;
            for event in self.handle(request).await {
                debug!("Runner: {:?}", event);
            }
        }
    }

    pub async fn handle(&mut self, request: Request) -> RunnerEvents {
        let mut events = RunnerEvents::new();
        match request {
            Request::Session(token) => self.run_session(token, &mut events).await,
            Request::FetchRemote => {
                let _ = events.push(self.fetch().await);
            }
        }
        events
    }

    async fn run_session(&mut self, token: SessionToken, events: &mut RunnerEvents) {
        if !self.flags.is_current(&token) {
            debug!("Skipping stale {} session", token.mode().label());
            let _ = events.push(RunnerEvent::Skipped(token));
            return;
        }

        let result = match token.mode() {
            ModeId::Recording => {
                session::capture(
                    self.flags,
                    token,
                    &mut self.transport,
                    &self.store,
                    self.config,
                    &mut *self.buf,
                )
                .await
            }
            ModeId::Playing => {
                let name = self.playback_name();
                session::playback(
                    self.flags,
                    token,
                    &mut self.transport,
                    &self.store,
                    self.config,
                    name,
                    &mut *self.buf,
                )
                .await
            }
        };

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                error!("{} session aborted: {:?}", token.mode().label(), dbg_fmt!(e));
                let _ = events.push(RunnerEvent::Aborted(token.mode()));
                return;
            }
        };
        let _ = events.push(RunnerEvent::Finished(report));

        if report.mode() == ModeId::Recording && report.bytes > 0 {
            self.source = PlaybackSource::Capture;
            if let Some(event) = self.upload_capture().await {
                let _ = events.push(event);
            }
        }
    }

    async fn upload_capture(&mut self) -> Option<RunnerEvent> {
        let remote_cfg = self.config.remote.as_ref()?;
        if !remote_cfg.upload_after_capture {
            return None;
        }
        let result = upload_artifact(
            &mut self.remote,
            &self.store,
            remote_cfg.peer_id.as_str(),
            self.config.capture_name.as_str(),
            &mut *self.buf,
        )
        .await;
        Some(match result {
            Ok(bytes) => RunnerEvent::Uploaded(bytes),
            Err(e) => {
                warn!("Upload failed: {:?}", dbg_fmt!(e));
                RunnerEvent::UploadFailed
            }
        })
    }

    async fn fetch(&mut self) -> RunnerEvent {
        let Some(remote_cfg) = self.config.remote.as_ref() else {
            return RunnerEvent::RemoteDisabled;
        };
        let result = fetch_incoming(
            &mut self.remote,
            &self.store,
            remote_cfg,
            self.config,
            &mut *self.buf,
        )
        .await;
        match result {
            Ok(Some(bytes)) => {
                self.source = PlaybackSource::Download;
                RunnerEvent::Fetched(bytes)
            }
            Ok(None) => RunnerEvent::NothingToFetch,
            Err(e) => {
                warn!("Remote fetch failed: {:?}", dbg_fmt!(e));
                RunnerEvent::FetchFailed
            }
        }
    }
}
