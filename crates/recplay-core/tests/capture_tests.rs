mod common;

use common::{held, press, start, AudioError, MemError, MemStore, MockTransport};
use embassy_time::Instant;
use recplay_core::wav::{HeaderProbe, HEADER_LEN};
use recplay_core::{
    session, Arbiter, AudioProfile, Controller, Direction, ModeFlags, ModeId,
    RecPlayConfig, SessionError, StopReason, WavHeader,
};

const BLOCK: usize = 2048;

fn stored_header(store: &MemStore, name: &str) -> WavHeader {
    let bytes = store.get(name).expect("artifact should exist");
    WavHeader::parse(&bytes).expect("header should parse")
}

#[futures_test::test]
async fn records_until_transport_runs_dry() {
    let flags = ModeFlags::new();
    let config = RecPlayConfig::default();
    let store = MemStore::new();
    let mut transport = MockTransport::with_reads(3);
    let mut buf = vec![0u8; config.max_block_bytes()];
    let token = start(&mut Arbiter::new(&flags), ModeId::Recording);

    let report = session::capture(&flags, token, &mut transport, &store, &config, &mut buf)
        .await
        .unwrap();

    assert_eq!(report.bytes, 3 * BLOCK as u32);
    assert_eq!(report.blocks, 3);
    assert_eq!(report.stop, StopReason::TransportExhausted);
    assert!(report.finalized);
    assert!(!flags.is_active(ModeId::Recording));
    assert_eq!(
        transport.configured,
        vec![(Direction::Capture, AudioProfile::default())]
    );

    let bytes = store.get("recording.wav").unwrap();
    assert_eq!(bytes.len(), HEADER_LEN + 3 * BLOCK);
    assert_eq!(&bytes[HEADER_LEN..], transport.captured.as_slice());
    let header = stored_header(&store, "recording.wav");
    assert_eq!(header.data_size, 3 * BLOCK as u32);
    assert_eq!(header.chunk_size(), 3 * BLOCK as u32 + 36);
    assert_eq!(header.profile, config.capture);
}

#[futures_test::test]
async fn zero_length_capture_leaves_header_only() {
    let flags = ModeFlags::new();
    let config = RecPlayConfig::default();
    let store = MemStore::new();
    let mut transport = MockTransport::with_reads(0);
    let mut buf = vec![0u8; BLOCK];
    let token = start(&mut Arbiter::new(&flags), ModeId::Recording);

    let report = session::capture(&flags, token, &mut transport, &store, &config, &mut buf)
        .await
        .unwrap();

    assert_eq!(report.bytes, 0);
    assert!(!report.finalized);
    assert_eq!(store.get("recording.wav").unwrap().len(), HEADER_LEN);
    assert_eq!(stored_header(&store, "recording.wav").data_size, 0);
    assert!(!flags.is_active(ModeId::Recording));
}

#[futures_test::test]
async fn stops_when_less_than_a_block_is_left() {
    let flags = ModeFlags::new();
    let config = RecPlayConfig::default();
    let store = MemStore::with_capacity((HEADER_LEN + 2 * BLOCK + 100) as u64);
    let mut transport = MockTransport::new();
    let mut buf = vec![0u8; BLOCK];
    let token = start(&mut Arbiter::new(&flags), ModeId::Recording);

    let report = session::capture(&flags, token, &mut transport, &store, &config, &mut buf)
        .await
        .unwrap();

    assert_eq!(report.stop, StopReason::StorageFull);
    assert_eq!(report.bytes, 2 * BLOCK as u32);
    assert!(report.finalized);
    assert_eq!(stored_header(&store, "recording.wav").data_size, 2 * BLOCK as u32);
}

#[futures_test::test]
async fn transport_error_keeps_what_was_captured() {
    let flags = ModeFlags::new();
    let config = RecPlayConfig::default();
    let store = MemStore::new();
    let mut transport = MockTransport::new();
    transport.fail_read_at = Some(2);
    let mut buf = vec![0u8; BLOCK];
    let token = start(&mut Arbiter::new(&flags), ModeId::Recording);

    let report = session::capture(&flags, token, &mut transport, &store, &config, &mut buf)
        .await
        .unwrap();

    assert_eq!(report.stop, StopReason::TransportError);
    assert_eq!(report.bytes, 2 * BLOCK as u32);
    assert_eq!(stored_header(&store, "recording.wav").data_size, 2 * BLOCK as u32);
    assert!(!flags.is_active(ModeId::Recording));
}

#[futures_test::test]
async fn store_write_error_stops_capture() {
    let flags = ModeFlags::new();
    let config = RecPlayConfig::default();
    let store = MemStore::new();
    // Header plus one block.
    store.fail_writes_after(2);
    let mut transport = MockTransport::new();
    let mut buf = vec![0u8; BLOCK];
    let token = start(&mut Arbiter::new(&flags), ModeId::Recording);

    let report = session::capture(&flags, token, &mut transport, &store, &config, &mut buf)
        .await
        .unwrap();

    assert_eq!(report.stop, StopReason::StoreError);
    assert_eq!(report.bytes, BLOCK as u32);
    // The size patch fails too, so the placeholder header survives.
    assert!(!report.finalized);
    assert!(!flags.is_active(ModeId::Recording));
}

#[futures_test::test]
async fn timeout_cancels_after_in_flight_block() {
    let flags = ModeFlags::new();
    let config = RecPlayConfig::default();
    let store = MemStore::new();
    let mut ctl = Controller::new(&config, &flags);
    let token = press(&mut ctl, ModeId::Recording, 0);

    let mut transport = MockTransport::new().on_transfer(move |n| {
        if n == 2 {
            ctl.poll(held(None), Instant::from_millis(20_000));
        }
    });
    let mut buf = vec![0u8; BLOCK];

    let report = session::capture(&flags, token, &mut transport, &store, &config, &mut buf)
        .await
        .unwrap();

    assert_eq!(report.stop, StopReason::Cancelled);
    assert_eq!(report.blocks, 2);
    assert!(report.finalized);
    assert_eq!(stored_header(&store, "recording.wav").data_size, 2 * BLOCK as u32);
    assert!(!flags.is_active(ModeId::Recording));
}

#[futures_test::test]
async fn stale_token_never_touches_the_store() {
    let flags = ModeFlags::new();
    let config = RecPlayConfig::default();
    let store = MemStore::new();
    let mut ctl = Controller::new(&config, &flags);
    let token = press(&mut ctl, ModeId::Recording, 0);
    ctl.poll(held(None), Instant::from_millis(20_000));

    let mut transport = MockTransport::new();
    let mut buf = vec![0u8; BLOCK];
    let result =
        session::capture(&flags, token, &mut transport, &store, &config, &mut buf).await;

    assert_eq!(result, Err(SessionError::Superseded));
    assert!(store.get("recording.wav").is_none());
    assert!(transport.configured.is_empty());
}

#[futures_test::test]
async fn setup_failures_release_the_mode() {
    let config = RecPlayConfig::default();
    let mut buf = vec![0u8; BLOCK];

    let flags = ModeFlags::new();
    let store = MemStore::new();
    store.fail_open();
    let token = start(&mut Arbiter::new(&flags), ModeId::Recording);
    let result = session::capture(
        &flags,
        token,
        &mut MockTransport::new(),
        &store,
        &config,
        &mut buf,
    )
    .await;
    assert_eq!(result, Err(SessionError::Open(MemError::Injected)));
    assert!(!flags.is_active(ModeId::Recording));

    let flags = ModeFlags::new();
    let mut transport = MockTransport::new();
    transport.fail_configure = true;
    let token = start(&mut Arbiter::new(&flags), ModeId::Recording);
    let result = session::capture(
        &flags,
        token,
        &mut transport,
        &MemStore::new(),
        &config,
        &mut buf,
    )
    .await;
    assert_eq!(result, Err(SessionError::Configure(AudioError::Configure)));
    assert!(!flags.is_active(ModeId::Recording));
}

#[futures_test::test]
async fn buffer_smaller_than_a_frame_is_rejected() {
    let flags = ModeFlags::new();
    let config = RecPlayConfig::default();
    let token = start(&mut Arbiter::new(&flags), ModeId::Recording);
    let mut buf = [0u8; 1];
    let result = session::capture(
        &flags,
        token,
        &mut MockTransport::new(),
        &MemStore::new(),
        &config,
        &mut buf,
    )
    .await;
    assert_eq!(result, Err(SessionError::BufferTooSmall));
    assert!(!flags.is_active(ModeId::Recording));
}

#[futures_test::test]
async fn header_probe_reports_patched_sizes() {
    use recplay_core::{ByteStore, OpenMode};

    let flags = ModeFlags::new();
    let config = RecPlayConfig::default();
    let store = MemStore::new();
    let token = start(&mut Arbiter::new(&flags), ModeId::Recording);
    session::capture(
        &flags,
        token,
        &mut MockTransport::with_reads(1),
        &store,
        &config,
        &mut vec![0u8; BLOCK],
    )
    .await
    .unwrap();

    let mut file = store.open("recording.wav", OpenMode::Read).unwrap();
    match recplay_core::wav::read_header(&mut file).unwrap() {
        HeaderProbe::Valid(h) => assert_eq!(h.data_size, BLOCK as u32),
        other => panic!("unexpected probe {:?}", other),
    }
}
