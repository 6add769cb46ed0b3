//! Event loop ordering, provisioning exclusivity and command handling.

use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::mock_hw::{
    call_log, wav_of_len, FixedPlatform, MemStore, MockOutput, MockUpdater, QueueSource,
    RecordingSink, ScriptedPortal, ScriptedTrigger,
};

use chime::adapters::device_id::DeviceIdentity;
use chime::app::commands::{
    Chunk, Command, Response, UpdateEvent, UploadEvent, REBOOT_ACK, RING_ACK, ROOT_INFO,
    UPDATE_ACK, UPLOAD_ACK, UPLOAD_FORM,
};
use chime::app::event_loop::{EventLoop, LoopControl, RestartReason};
use chime::app::events::AppEvent;
use chime::app::indicator::IndicatorState;
use chime::app::playback::RINGTONE_NAME;
use chime::app::ports::{PortalOutcome, UpdateStatus};
use chime::app::service::ChimeService;
use chime::app::upload::UploadState;
use chime::audio::WavDecoder;
use chime::config::SystemConfig;
use chime::dispatch::CommandBus;
use chime::error::CommsError;
use chime::update::OtaError;

type TestLoop = EventLoop<MemStore, WavDecoder, MockOutput, MockUpdater>;

struct Rig {
    event_loop: TestLoop,
    store: MemStore,
    trigger: ScriptedTrigger,
    portal: ScriptedPortal,
    source: QueueSource,
    sink: RecordingSink,
}

impl Rig {
    fn new(store: MemStore) -> Self {
        Self::with(store, MockOutput::new(), MockUpdater::default())
    }

    fn with(store: MemStore, output: MockOutput, updater: MockUpdater) -> Self {
        let config = SystemConfig::default();
        let service = ChimeService::new(store.clone(), output, &config);
        let identity = DeviceIdentity::from_mac(&[0x24, 0x6F, 0x28, 0x12, 0x34, 0x56]);
        let mut event_loop = EventLoop::new(service, updater, identity, config);
        let mut sink = RecordingSink::new();
        event_loop.start(&mut sink);
        Self {
            event_loop,
            store,
            trigger: ScriptedTrigger::never(),
            portal: ScriptedPortal::returning(PortalOutcome::Connected),
            source: QueueSource::new(),
            sink,
        }
    }

    fn run(&mut self) -> LoopControl {
        self.event_loop.run_once(
            0,
            &mut self.trigger,
            &mut self.portal,
            &mut self.source,
            &FixedPlatform,
            &mut self.sink,
        )
    }
}

fn chime_with_ringtone() -> Rig {
    Rig::new(MemStore::with_file(RINGTONE_NAME, wav_of_len(5000)))
}

// ── Ordering ──────────────────────────────────────────────────

#[test]
fn iteration_runs_trigger_update_dispatch_then_one_tick() {
    let log = call_log();
    let store = MemStore::with_file(RINGTONE_NAME, wav_of_len(5000));
    let updater = MockUpdater {
        log: Some(Rc::clone(&log)),
        ..MockUpdater::default()
    };
    let mut rig = Rig::with(store, MockOutput::logged(&log), updater);
    rig.trigger.log = Some(Rc::clone(&log));
    rig.source.log = Some(Rc::clone(&log));

    rig.source.push(Command::Ring);
    assert_eq!(rig.run(), LoopControl::Continue);

    // The ring dispatched this iteration is already ticked once.
    assert_eq!(
        *log.borrow(),
        vec!["trigger", "update", "dispatch", "dispatch", "tick"]
    );

    log.borrow_mut().clear();
    rig.run();
    assert_eq!(*log.borrow(), vec!["trigger", "update", "dispatch", "tick"]);
}

#[test]
fn every_request_gets_a_reply_in_the_same_iteration() {
    let mut rig = chime_with_ringtone();
    let ring = rig.source.push(Command::Ring);
    let root = rig.source.push(Command::Root);
    let form = rig.source.push(Command::UploadInfo);
    let settings = rig.source.push(Command::Settings);

    rig.run();

    assert!(rig.source.pending.is_empty());
    assert_eq!(rig.source.replies.len(), 4);
    assert_eq!(rig.source.response_to(ring), Some(&Response::Ack(RING_ACK)));
    assert_eq!(rig.source.response_to(root), Some(&Response::Text(ROOT_INFO)));
    assert_eq!(rig.source.response_to(form), Some(&Response::Text(UPLOAD_FORM)));
    assert!(matches!(
        rig.source.response_to(settings),
        Some(Response::Settings(_))
    ));
}

#[test]
fn ring_to_ring_restarts_playback() {
    let mut rig = chime_with_ringtone();
    rig.source.push(Command::Ring);
    rig.run();
    rig.run();
    rig.source.push(Command::Ring);
    rig.run();

    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::PlaybackRestarted { .. })),
        1
    );
    // Restarted, then ticked once in the same iteration.
    assert_eq!(rig.event_loop.service().status().play_position, 44 + 512);
    assert_eq!(rig.store.peak_open(), 1);
}

// ── Provisioning ──────────────────────────────────────────────

#[test]
fn portal_blocks_dispatch_update_and_playback() {
    let log = call_log();
    let mut rig = chime_with_ringtone();
    rig.trigger = ScriptedTrigger::on(&[1]);
    rig.trigger.log = Some(Rc::clone(&log));
    rig.portal.log = Some(Rc::clone(&log));
    rig.source.log = Some(Rc::clone(&log));
    rig.source.push(Command::Ring);

    assert_eq!(rig.run(), LoopControl::Continue);

    assert_eq!(*log.borrow(), vec!["trigger", "portal"]);
    assert_eq!(rig.portal.last_timeout_secs, Some(180));
    assert_eq!(rig.source.pending.len(), 1, "queued ring waits for the portal");
    assert!(rig.source.replies.is_empty());
    assert!(rig.sink.events.contains(&AppEvent::ProvisioningEntered));
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::ProvisioningExited(PortalOutcome::Connected)));
    assert_eq!(rig.event_loop.service().indicator(), IndicatorState::Idle);

    // The next iteration serves the queued ring.
    rig.run();
    assert_eq!(rig.source.replies.len(), 1);
    assert!(rig.event_loop.service().is_playing());
}

#[test]
fn playback_is_suspended_while_the_portal_runs() {
    let mut rig = chime_with_ringtone();
    rig.trigger = ScriptedTrigger::on(&[2]);
    rig.source.push(Command::Ring);
    rig.run();
    let before = rig.event_loop.service().status().play_position;

    rig.run();

    let service = rig.event_loop.service();
    assert!(service.is_playing());
    assert_eq!(service.status().play_position, before);
    assert_eq!(service.indicator(), IndicatorState::Playing);

    rig.run();
    assert!(rig.event_loop.service().status().play_position > before);
}

#[test]
fn portal_timeout_restarts_the_device() {
    let mut rig = chime_with_ringtone();
    rig.trigger = ScriptedTrigger::on(&[1]);
    rig.portal = ScriptedPortal::returning(PortalOutcome::TimedOut);

    assert_eq!(
        rig.run(),
        LoopControl::Restart {
            delay_ms: 3000,
            reason: RestartReason::ProvisioningTimedOut
        }
    );
    assert_eq!(
        rig.event_loop.service().indicator(),
        IndicatorState::Provisioning
    );
}

#[test]
fn portal_failure_restarts_the_device() {
    let mut rig = chime_with_ringtone();
    rig.trigger = ScriptedTrigger::on(&[1]);
    rig.portal = ScriptedPortal::returning(PortalOutcome::Failed);

    assert!(matches!(
        rig.run(),
        LoopControl::Restart {
            reason: RestartReason::ProvisioningFailed,
            ..
        }
    ));
}

// ── Reboot / update ───────────────────────────────────────────

#[test]
fn reboot_replies_first_then_restarts() {
    let mut rig = chime_with_ringtone();
    let reboot = rig.source.push(Command::Reboot);
    rig.source.push(Command::Ring);

    let control = rig.run();

    assert_eq!(
        control,
        LoopControl::Restart {
            delay_ms: 1000,
            reason: RestartReason::RebootCommand
        }
    );
    assert_eq!(rig.source.response_to(reboot), Some(&Response::Ack(REBOOT_ACK)));
    assert_eq!(rig.source.pending.len(), 1, "nothing handled after reboot");
    assert!(!rig.event_loop.service().is_playing());
    assert_eq!(
        rig.sink.last(),
        Some(&AppEvent::RebootScheduled { delay_ms: 1000 })
    );
}

#[test]
fn staged_firmware_restarts_before_dispatch() {
    let log = call_log();
    let updater = MockUpdater {
        statuses: VecDeque::from([UpdateStatus::Busy, UpdateStatus::RebootRequired]),
        ..MockUpdater::default()
    };
    let mut rig = Rig::with(MemStore::new(), MockOutput::new(), updater);
    rig.source.log = Some(Rc::clone(&log));

    assert_eq!(rig.run(), LoopControl::Continue);
    log.borrow_mut().clear();

    assert!(matches!(
        rig.run(),
        LoopControl::Restart {
            reason: RestartReason::FirmwareUpdated,
            ..
        }
    ));
    assert!(log.borrow().is_empty(), "dispatch skipped");
}

#[test]
fn update_chunks_reach_the_updater() {
    let mut rig = Rig::new(MemStore::new());
    let begin = rig.source.push(Command::Update(UpdateEvent::Begin { size: 4 }));
    let data = rig.source.push(Command::Update(UpdateEvent::Chunk(
        Chunk::from_slice(&[1, 2, 3, 4]).unwrap(),
    )));

    rig.run();

    assert_eq!(rig.source.response_to(begin), Some(&Response::Ack(UPDATE_ACK)));
    assert_eq!(rig.source.response_to(data), Some(&Response::Ack(UPDATE_ACK)));
    assert_eq!(rig.event_loop.updater().handled.len(), 2);
}

#[test]
fn rejected_update_is_reported() {
    let updater = MockUpdater {
        reject: true,
        ..MockUpdater::default()
    };
    let mut rig = Rig::with(MemStore::new(), MockOutput::new(), updater);
    let id = rig.source.push(Command::Update(UpdateEvent::Begin { size: 10 }));

    rig.run();

    assert_eq!(
        rig.source.response_to(id),
        Some(&Response::Failed("update rejected"))
    );
    assert_eq!(
        rig.sink.last(),
        Some(&AppEvent::UpdateFailed(OtaError::BeginFailed))
    );
}

// ── Upload through dispatch ───────────────────────────────────

#[test]
fn upload_commands_store_the_ringtone() {
    let mut rig = Rig::new(MemStore::new());
    let payload = wav_of_len(2500);

    rig.source.push(Command::Upload(UploadEvent::Start));
    for piece in payload.chunks(1024) {
        rig.source.push(Command::Upload(UploadEvent::Chunk(
            Chunk::from_slice(piece).unwrap(),
        )));
    }
    let end = rig.source.push(Command::Upload(UploadEvent::End { total: 2500 }));
    rig.run();

    assert_eq!(rig.source.response_to(end), Some(&Response::Ack(UPLOAD_ACK)));
    assert_eq!(rig.store.file(RINGTONE_NAME), Some(payload));
    assert_eq!(rig.store.open_handles(), 0);
}

// ── Settings ──────────────────────────────────────────────────

#[test]
fn settings_report_has_no_side_effects() {
    let mut rig = chime_with_ringtone();
    let id = rig.source.push(Command::Settings);
    let events_before = rig.sink.events.len();

    rig.run();

    let Some(Response::Settings(report)) = rig.source.response_to(id) else {
        panic!("expected a settings report");
    };
    assert_eq!(report.identity.hostname.as_str(), "chime-123456");
    assert_eq!(report.uptime_secs, 3600);
    assert_eq!(report.network.ssid.as_str(), "home");
    assert!(report.chime.ringtone_present);
    assert_eq!(report.chime.ringtone_bytes, 5000);
    assert!(!report.chime.playing);

    let json = report.to_json().unwrap();
    assert!(json.contains("\"ringtone_bytes\":5000"));

    assert_eq!(rig.store.reads_opened(), 0);
    assert_eq!(rig.sink.events.len(), events_before);
    assert_eq!(rig.event_loop.service().indicator(), IndicatorState::Idle);
}

// ── Command bus ───────────────────────────────────────────────

#[test]
fn bus_request_is_answered_by_the_loop() {
    static BUS: CommandBus = CommandBus::new();

    let mut rig = chime_with_ringtone();
    let requester =
        std::thread::spawn(|| BUS.request(Command::Ring, Duration::from_secs(5)));

    let mut source = &BUS;
    for _ in 0..5000 {
        rig.event_loop.run_once(
            0,
            &mut rig.trigger,
            &mut rig.portal,
            &mut source,
            &FixedPlatform,
            &mut rig.sink,
        );
        if requester.is_finished() {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    let response = requester.join().unwrap();
    assert_eq!(response, Ok(Response::Ack(RING_ACK)));
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::PlaybackStarted { .. })),
        1
    );
}

#[test]
fn timed_out_upload_start_is_undone_by_the_loop() {
    static BUS: CommandBus = CommandBus::new();

    let mut rig = chime_with_ringtone();
    let result = BUS.request_or_undo(
        Command::Upload(UploadEvent::Start),
        Command::Upload(UploadEvent::Abort),
        Duration::ZERO,
    );
    assert_eq!(result, Err(CommsError::BusTimeout));

    let mut source = &BUS;
    for _ in 0..3 {
        rig.event_loop.run_once(
            0,
            &mut rig.trigger,
            &mut rig.portal,
            &mut source,
            &FixedPlatform,
            &mut rig.sink,
        );
    }

    let status = rig.event_loop.service().status();
    assert_eq!(status.upload, UploadState::Idle);
    assert!(rig.store.file(RINGTONE_NAME).is_none(), "no zero-length asset left");
    assert_eq!(rig.store.open_handles(), 0);
    assert_eq!(BUS.pending(), 0);
}
