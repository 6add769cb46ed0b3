//! Playback controller behaviour through `ChimeService` with the real WAV
//! decoder and an in-memory store.

use crate::mock_hw::{wav_of_len, MemStore, MockOutput, RecordingSink};

use chime::app::events::{AppEvent, PlaybackFailure, StopReason};
use chime::app::indicator::IndicatorState;
use chime::app::playback::{RingOutcome, RINGTONE_NAME};
use chime::app::service::ChimeService;
use chime::audio::WavDecoder;
use chime::config::SystemConfig;
use chime::error::{AudioError, StorageError};

type TestService = ChimeService<MemStore, WavDecoder, MockOutput>;

fn service(store: &MemStore) -> TestService {
    ChimeService::new(store.clone(), MockOutput::new(), &SystemConfig::default())
}

/// Tick until the session ends; returns the number of ticks taken.
fn play_out(svc: &mut TestService, sink: &mut RecordingSink) -> u32 {
    let mut ticks = 0;
    while svc.is_playing() {
        svc.tick(sink);
        ticks += 1;
        assert!(ticks < 10_000, "playback never finished");
    }
    ticks
}

#[test]
fn ring_plays_5000_byte_ringtone_to_the_end() {
    let store = MemStore::with_file(RINGTONE_NAME, wav_of_len(5000));
    let mut svc = service(&store);
    let mut sink = RecordingSink::new();

    assert_eq!(svc.ring(&mut sink), RingOutcome::Started);
    assert!(svc.is_playing());
    assert_eq!(svc.indicator(), IndicatorState::Playing);
    assert_eq!(store.open_handles(), 1);

    let ticks = play_out(&mut svc, &mut sink);

    // 4956 data bytes at 512 per tick.
    assert_eq!(ticks, 10);
    assert_eq!(svc.output().samples, 2478);
    assert_eq!(svc.output().starts, 1);
    assert_eq!(svc.output().stops, 1);
    assert_eq!(svc.indicator(), IndicatorState::Idle);
    assert_eq!(store.open_handles(), 0);
    assert_eq!(
        sink.events,
        vec![
            AppEvent::PlaybackStarted { size: 5000 },
            AppEvent::PlaybackFinished {
                position: 5000,
                reason: StopReason::EndOfStream
            },
        ]
    );
}

#[test]
fn second_ring_restarts_from_the_top_without_a_second_source() {
    let store = MemStore::with_file(RINGTONE_NAME, wav_of_len(5000));
    let mut svc = service(&store);
    let mut sink = RecordingSink::new();

    svc.ring(&mut sink);
    svc.tick(&mut sink);
    svc.tick(&mut sink);
    assert_eq!(svc.status().play_position, 44 + 1024);

    assert_eq!(svc.ring(&mut sink), RingOutcome::Restarted);
    assert_eq!(svc.status().play_position, 44, "restart reads from the start");
    assert_eq!(store.reads_opened(), 2);
    assert_eq!(store.peak_open(), 1, "old source closed before new one opened");
    assert_eq!(store.open_handles(), 1);
    assert_eq!(svc.output().stops, 1);
    assert_eq!(sink.last(), Some(&AppEvent::PlaybackRestarted { size: 5000 }));

    assert_eq!(play_out(&mut svc, &mut sink), 10);
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn ring_without_ringtone_is_absorbed() {
    let store = MemStore::new();
    let mut svc = service(&store);
    let mut sink = RecordingSink::new();

    let outcome = svc.ring(&mut sink);

    assert_eq!(
        outcome,
        RingOutcome::Absorbed(PlaybackFailure::Open(StorageError::NotFound))
    );
    assert!(!svc.is_playing());
    assert_eq!(svc.indicator(), IndicatorState::Idle);
    assert_eq!(store.open_handles(), 0);
    assert_eq!(svc.output().starts, 0);
}

#[test]
fn ring_with_empty_ringtone_is_absorbed() {
    let store = MemStore::with_file(RINGTONE_NAME, Vec::new());
    let mut svc = service(&store);
    let mut sink = RecordingSink::new();

    assert_eq!(
        svc.ring(&mut sink),
        RingOutcome::Absorbed(PlaybackFailure::EmptyAsset)
    );
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn ring_with_corrupt_ringtone_closes_the_source() {
    let store = MemStore::with_file(RINGTONE_NAME, b"definitely not a wav file".to_vec());
    let mut svc = service(&store);
    let mut sink = RecordingSink::new();

    let outcome = svc.ring(&mut sink);

    assert!(matches!(
        outcome,
        RingOutcome::Absorbed(PlaybackFailure::Decoder(_))
    ));
    assert!(!svc.is_playing());
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn output_start_failure_is_absorbed() {
    let store = MemStore::with_file(RINGTONE_NAME, wav_of_len(1000));
    let output = MockOutput {
        fail_start: true,
        ..MockOutput::default()
    };
    let mut svc: TestService = ChimeService::new(store.clone(), output, &SystemConfig::default());
    let mut sink = RecordingSink::new();

    assert_eq!(
        svc.ring(&mut sink),
        RingOutcome::Absorbed(PlaybackFailure::Decoder(AudioError::OutputFailed))
    );
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn failed_restart_leaves_no_session() {
    let store = MemStore::with_file(RINGTONE_NAME, wav_of_len(5000));
    let mut svc = service(&store);
    let mut sink = RecordingSink::new();

    svc.ring(&mut sink);
    store.state.borrow_mut().fail_open_read = true;

    assert!(matches!(svc.ring(&mut sink), RingOutcome::Absorbed(_)));
    assert!(!svc.is_playing());
    assert_eq!(svc.indicator(), IndicatorState::Idle);
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn truncated_source_ends_via_stall_guard() {
    let store = MemStore::with_file(RINGTONE_NAME, wav_of_len(5000));
    let config = SystemConfig {
        stall_tick_limit: 5,
        ..SystemConfig::default()
    };
    let mut svc: TestService = ChimeService::new(store.clone(), MockOutput::new(), &config);
    let mut sink = RecordingSink::new();

    svc.ring(&mut sink);
    svc.tick(&mut sink);
    // Another writer cuts the file short under the open session.
    store.put(RINGTONE_NAME, wav_of_len(600));

    let ticks = play_out(&mut svc, &mut sink);

    assert!(ticks <= 10);
    assert!(matches!(
        sink.last(),
        Some(AppEvent::PlaybackFinished {
            reason: StopReason::Stalled,
            ..
        })
    ));
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn tick_without_session_does_nothing() {
    let store = MemStore::with_file(RINGTONE_NAME, wav_of_len(5000));
    let mut svc = service(&store);
    let mut sink = RecordingSink::new();

    svc.tick(&mut sink);

    assert!(sink.events.is_empty());
    assert_eq!(store.reads_opened(), 0);
    assert_eq!(svc.output().samples, 0);
}
