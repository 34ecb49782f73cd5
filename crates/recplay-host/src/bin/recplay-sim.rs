//! Runs the record/playback appliance on the desktop.
//!
//! Buttons follow a script, the microphone is a tone generator, the storage
//! card is a directory and the LEDs are log lines. Sessions write real WAV
//! files into the card directory.

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::Parser;
use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Ticker, Timer};
use recplay_core::{
    submit_session, ByteStore, Controller, IndicatorLeds, ModeFlags, ModeId,
    PlaybackSource, RecPlayConfig, Request, RunnerEvent, SessionRunner,
};
use recplay_host::audio::SimAudio;
use recplay_host::buttons::ScriptedButton;
use recplay_host::cli::Cli;
use recplay_host::leds::LogLed;
use recplay_host::remote::DirRemote;
use recplay_host::store::FsStore;
use static_cell::StaticCell;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const POLL_PERIOD: Duration = Duration::from_millis(1);
const MOUNT_RETRY: Duration = Duration::from_secs(1);
const REQUEST_DEPTH: usize = 4;

type HostRunner = SessionRunner<'static, SimAudio, FsStore, DirRemote>;
type HostLeds = IndicatorLeds<LogLed, LogLed>;

static FLAGS: ModeFlags = ModeFlags::new();
static REQUESTS: Channel<CriticalSectionRawMutex, Request, REQUEST_DEPTH> =
    Channel::new();
static SCRIPT_DONE: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static RUNNER_BUSY: AtomicBool = AtomicBool::new(false);

static CONFIG: StaticCell<RecPlayConfig> = StaticCell::new();
static BLOCK_BUF: StaticCell<Vec<u8>> = StaticCell::new();

#[embassy_executor::task]
async fn runner_task(mut runner: HostRunner) {
    loop {
        let request = REQUESTS.receive().await;
        RUNNER_BUSY.store(true, Ordering::Release);
        for event in runner.handle(request).await {
            match event {
                RunnerEvent::Finished(report) => info!(
                    "{} session done: {:?}, {} bytes",
                    report.mode().label(),
                    report.stop,
                    report.bytes
                ),
                RunnerEvent::Fetched(bytes) => {
                    info!("Downloaded artifact ({} bytes) is now the playback source", bytes)
                }
                other => info!("Runner: {:?}", other),
            }
        }
        RUNNER_BUSY.store(false, Ordering::Release);
    }
}

#[embassy_executor::task]
async fn poll_task(
    mut controller: Controller<'static>,
    mut record: ScriptedButton,
    mut play: ScriptedButton,
    mut leds: HostLeds,
    script_end: Instant,
) {
    let mut ticker = Ticker::every(POLL_PERIOD);
    loop {
        let now = Instant::now();
        let outcome = controller.poll_pins(&mut record, &mut play, now);
        for (mode, cause) in &outcome.stopped {
            info!("{} stopped: {:?}", mode.label(), cause);
        }
        if let Some(token) = outcome.started {
            // The poll loop never waits on the runner.
            submit_session(REQUESTS.sender(), &FLAGS, token);
        }
        controller.show(&mut leds);

        if now >= script_end && !SCRIPT_DONE.signaled() {
            SCRIPT_DONE.signal(());
        }
        ticker.next().await;
    }
}

#[embassy_executor::task]
async fn remote_poll_task(interval: Duration) {
    let mut ticker = Ticker::every(interval);
    loop {
        ticker.next().await;
        REQUESTS.send(Request::FetchRemote).await;
    }
}

/// The card may be inserted late; keep trying.
async fn mount(root: &PathBuf, quota: u64) -> FsStore {
    loop {
        match FsStore::mount(root, quota) {
            Ok(store) => return store,
            Err(e) => {
                error!("Storage unavailable, retrying: {}", e);
                Timer::after(MOUNT_RETRY).await;
            }
        }
    }
}

fn idle() -> bool {
    REQUESTS.is_empty()
        && !RUNNER_BUSY.load(Ordering::Acquire)
        && ModeId::ALL.iter().all(|&m| !FLAGS.is_active(m))
}

async fn run(spawner: Spawner) -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config: &'static RecPlayConfig =
        CONFIG.init(cli.resolve_config().context("invalid configuration")?);
    info!("Configuration: {}", serde_json::to_string(config)?);

    let store = mount(&cli.store, cli.capacity).await;
    info!("Storage mounted at {}", store.root().display());

    let mut audio = SimAudio::new(cli.tone_hz);
    if !cli.unpaced {
        audio = audio.paced();
    }
    if let Some(secs) = cli.mic_seconds {
        audio = audio.with_capture_limit(secs * config.capture.sample_rate as u64);
    }
    if let Some(path) = &cli.speaker {
        let file = File::create(path)
            .with_context(|| format!("cannot create speaker file {}", path.display()))?;
        audio = audio.with_speaker(file);
    }
    let remote = DirRemote::new(cli.remote.clone().unwrap_or_else(|| PathBuf::from("remote")));

    let buf = BLOCK_BUF.init(vec![0u8; config.max_block_bytes()]);
    let mut runner =
        SessionRunner::new(&FLAGS, config, audio, store, remote, buf.as_mut_slice());
    if !runner.store().exists(&config.capture_name)
        && runner.store().exists(&config.download_name)
    {
        runner.set_source(PlaybackSource::Download);
    }

    let start = Instant::now();
    let bounce = Duration::from_millis(cli.bounce_ms);
    let record = cli.script.pin(ModeId::Recording, config.button_polarity, start, bounce);
    let play = cli.script.pin(ModeId::Playing, config.button_polarity, start, bounce);
    let leds = IndicatorLeds::new(LogLed::new("Record"), LogLed::new("Play"));
    let script_end = start + cli.script.end() + Duration::from_millis(cli.linger_ms);

    spawner.must_spawn(runner_task(runner));
    spawner.must_spawn(poll_task(
        Controller::new(config, &FLAGS),
        record,
        play,
        leds,
        script_end,
    ));
    if let Some(remote) = &config.remote {
        info!(
            "Remote sync as {} with peer {}, polling every {} ms",
            remote.device_id, remote.peer_id, remote.poll_interval_ms
        );
        REQUESTS.send(Request::FetchRemote).await;
        spawner.must_spawn(remote_poll_task(remote.poll_interval()));
    }

    SCRIPT_DONE.wait().await;
    while !idle() {
        Timer::after_millis(10).await;
    }
    info!("Script finished");
    Ok(())
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let code = match run(spawner).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };
    std::process::exit(code);
}
