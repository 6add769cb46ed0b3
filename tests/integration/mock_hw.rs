//! Mock hardware for integration tests.
//!
//! An in-memory ringtone store that counts open handles, a recording audio
//! output, and scripted versions of the loop's other collaborators. Every
//! mock can share a [`CallLog`] so tests can assert on the order in which
//! the loop touches them.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use chime::app::commands::{Command, Response, UpdateEvent};
use chime::app::events::AppEvent;
use chime::app::ports::{
    AssetReader, AssetWriter, AudioSink, EventSink, HeapStats, NetworkStatus, PcmFormat,
    PlatformPort, PortalOutcome, ProvisioningPort, ReconfigTrigger, RingtoneStore, StorageUsage,
    UpdatePort, UpdateStatus,
};
use chime::dispatch::{CommandSource, Reply, Request};
use chime::error::{AudioError, StorageError};
use chime::update::OtaError;

// ── Call log ──────────────────────────────────────────────────

pub type CallLog = Rc<RefCell<Vec<&'static str>>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

fn record(log: &Option<CallLog>, what: &'static str) {
    if let Some(log) = log {
        log.borrow_mut().push(what);
    }
}

// ── WAV fixtures ──────────────────────────────────────────────

/// Canonical 44-byte-header PCM WAV around `data`.
pub fn wav_bytes(channels: u16, bits: u16, sample_rate: u32, data: &[u8]) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let mut v = Vec::with_capacity(44 + data.len());
    v.extend_from_slice(b"RIFF");
    v.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
    v.extend_from_slice(b"WAVE");
    v.extend_from_slice(b"fmt ");
    v.extend_from_slice(&16u32.to_le_bytes());
    v.extend_from_slice(&1u16.to_le_bytes());
    v.extend_from_slice(&channels.to_le_bytes());
    v.extend_from_slice(&sample_rate.to_le_bytes());
    v.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    v.extend_from_slice(&block_align.to_le_bytes());
    v.extend_from_slice(&bits.to_le_bytes());
    v.extend_from_slice(b"data");
    v.extend_from_slice(&(data.len() as u32).to_le_bytes());
    v.extend_from_slice(data);
    v
}

/// A 16-bit mono WAV exactly `total` bytes long.
pub fn wav_of_len(total: usize) -> Vec<u8> {
    assert!(total >= 44);
    let data: Vec<u8> = (0..total - 44).map(|i| (i % 251) as u8).collect();
    wav_bytes(1, 16, 16_000, &data)
}

// ── In-memory ringtone store ──────────────────────────────────

#[derive(Default)]
pub struct StoreState {
    pub files: HashMap<String, Vec<u8>>,
    pub open_readers: u32,
    pub open_writers: u32,
    /// Highest number of handles ever open at once.
    pub peak_open: u32,
    pub reads_opened: u32,
    pub fail_open_read: bool,
    pub fail_open_write: bool,
    pub fail_delete: bool,
    pub fail_close: bool,
    /// Writes fail once the file would grow past this many bytes.
    pub fail_write_beyond: Option<usize>,
}

impl StoreState {
    fn note_open(&mut self) {
        self.peak_open = self.peak_open.max(self.open_readers + self.open_writers);
    }
}

/// Cloning yields another handle on the same state, so a test can keep a
/// probe while the service owns the store.
#[derive(Clone, Default)]
pub struct MemStore {
    pub state: Rc<RefCell<StoreState>>,
}

#[allow(dead_code)]
impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(name: &str, bytes: Vec<u8>) -> Self {
        let store = Self::new();
        store.put(name, bytes);
        store
    }

    pub fn put(&self, name: &str, bytes: Vec<u8>) {
        self.state.borrow_mut().files.insert(name.to_owned(), bytes);
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.state.borrow().files.get(name).cloned()
    }

    pub fn open_handles(&self) -> u32 {
        let s = self.state.borrow();
        s.open_readers + s.open_writers
    }

    pub fn peak_open(&self) -> u32 {
        self.state.borrow().peak_open
    }

    pub fn reads_opened(&self) -> u32 {
        self.state.borrow().reads_opened
    }
}

pub struct MemReader {
    state: Rc<RefCell<StoreState>>,
    name: String,
    position: u32,
    size: u32,
}

impl AssetReader for MemReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let state = self.state.borrow();
        // Reads see the current contents; a replaced or truncated file
        // simply ends early.
        let Some(file) = state.files.get(&self.name) else {
            return Ok(0);
        };
        let start = (self.position as usize).min(file.len());
        let n = buf.len().min(file.len() - start);
        buf[..n].copy_from_slice(&file[start..start + n]);
        self.position += n as u32;
        Ok(n)
    }

    fn position(&self) -> u32 {
        self.position
    }

    fn size(&self) -> u32 {
        self.size
    }
}

impl Drop for MemReader {
    fn drop(&mut self) {
        self.state.borrow_mut().open_readers -= 1;
    }
}

pub struct MemWriter {
    state: Rc<RefCell<StoreState>>,
    name: String,
    written: u32,
}

impl AssetWriter for MemWriter {
    fn write(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let mut state = self.state.borrow_mut();
        let limit = state.fail_write_beyond;
        let file = state.files.entry(self.name.clone()).or_default();
        if limit.is_some_and(|max| file.len() + data.len() > max) {
            return Err(StorageError::WriteFailed);
        }
        file.extend_from_slice(data);
        self.written += data.len() as u32;
        Ok(())
    }

    fn bytes_written(&self) -> u32 {
        self.written
    }

    fn close(self) -> Result<u32, StorageError> {
        if self.state.borrow().fail_close {
            return Err(StorageError::WriteFailed);
        }
        Ok(self.written)
    }
}

impl Drop for MemWriter {
    fn drop(&mut self) {
        self.state.borrow_mut().open_writers -= 1;
    }
}

impl RingtoneStore for MemStore {
    type Reader = MemReader;
    type Writer = MemWriter;

    fn open_read(&mut self, name: &str) -> Result<MemReader, StorageError> {
        let mut state = self.state.borrow_mut();
        if state.fail_open_read {
            return Err(StorageError::OpenFailed);
        }
        let size = state
            .files
            .get(name)
            .map(|f| f.len() as u32)
            .ok_or(StorageError::NotFound)?;
        state.open_readers += 1;
        state.reads_opened += 1;
        state.note_open();
        Ok(MemReader {
            state: Rc::clone(&self.state),
            name: name.to_owned(),
            position: 0,
            size,
        })
    }

    fn open_write(&mut self, name: &str) -> Result<MemWriter, StorageError> {
        let mut state = self.state.borrow_mut();
        if state.fail_open_write {
            return Err(StorageError::OpenFailed);
        }
        state.files.insert(name.to_owned(), Vec::new());
        state.open_writers += 1;
        state.note_open();
        Ok(MemWriter {
            state: Rc::clone(&self.state),
            name: name.to_owned(),
            written: 0,
        })
    }

    fn exists(&self, name: &str) -> bool {
        self.state.borrow().files.contains_key(name)
    }

    fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        let mut state = self.state.borrow_mut();
        if state.fail_delete {
            return Err(StorageError::DeleteFailed);
        }
        state.files.remove(name);
        Ok(())
    }

    fn asset_size(&self, name: &str) -> Option<u32> {
        self.state.borrow().files.get(name).map(|f| f.len() as u32)
    }

    fn usage(&self) -> StorageUsage {
        let used = self.state.borrow().files.values().map(|f| f.len() as u32).sum();
        StorageUsage {
            total_bytes: 1024 * 1024,
            used_bytes: used,
        }
    }
}

// ── Audio output ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockOutput {
    pub starts: u32,
    pub stops: u32,
    pub samples: u64,
    pub format: Option<PcmFormat>,
    pub running: bool,
    pub fail_start: bool,
    pub log: Option<CallLog>,
}

#[allow(dead_code)]
impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged(log: &CallLog) -> Self {
        Self {
            log: Some(Rc::clone(log)),
            ..Self::default()
        }
    }
}

impl AudioSink for MockOutput {
    fn start(&mut self, format: PcmFormat) -> Result<(), AudioError> {
        if self.fail_start {
            return Err(AudioError::OutputFailed);
        }
        self.starts += 1;
        self.format = Some(format);
        self.running = true;
        Ok(())
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        record(&self.log, "tick");
        self.samples += samples.len() as u64;
        Ok(())
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn last(&self) -> Option<&AppEvent> {
        self.events.last()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Reconfiguration trigger + portal ──────────────────────────

/// Fires on the listed poll numbers (1-based).
#[derive(Default)]
pub struct ScriptedTrigger {
    pub fire_on: Vec<u32>,
    polls: u32,
    pub log: Option<CallLog>,
}

#[allow(dead_code)]
impl ScriptedTrigger {
    pub fn never() -> Self {
        Self::default()
    }

    pub fn on(fire_on: &[u32]) -> Self {
        Self {
            fire_on: fire_on.to_vec(),
            ..Self::default()
        }
    }
}

impl ReconfigTrigger for ScriptedTrigger {
    fn poll(&mut self, _now_ms: u32) -> bool {
        record(&self.log, "trigger");
        self.polls += 1;
        self.fire_on.contains(&self.polls)
    }
}

pub struct ScriptedPortal {
    pub outcome: PortalOutcome,
    pub runs: u32,
    pub last_timeout_secs: Option<u32>,
    pub log: Option<CallLog>,
}

#[allow(dead_code)]
impl ScriptedPortal {
    pub fn returning(outcome: PortalOutcome) -> Self {
        Self {
            outcome,
            runs: 0,
            last_timeout_secs: None,
            log: None,
        }
    }
}

impl ProvisioningPort for ScriptedPortal {
    fn run_portal(&mut self, timeout_secs: u32) -> PortalOutcome {
        record(&self.log, "portal");
        self.runs += 1;
        self.last_timeout_secs = Some(timeout_secs);
        self.outcome
    }
}

// ── Update channel ────────────────────────────────────────────

#[derive(Default)]
pub struct MockUpdater {
    pub handled: Vec<UpdateEvent>,
    pub reject: bool,
    /// Statuses returned by successive `service` calls, then `Idle`.
    pub statuses: VecDeque<UpdateStatus>,
    pub log: Option<CallLog>,
}

impl UpdatePort for MockUpdater {
    fn handle(&mut self, event: UpdateEvent) -> Result<(), OtaError> {
        self.handled.push(event);
        if self.reject {
            Err(OtaError::BeginFailed)
        } else {
            Ok(())
        }
    }

    fn service(&mut self) -> UpdateStatus {
        record(&self.log, "update");
        self.statuses.pop_front().unwrap_or(UpdateStatus::Idle)
    }
}

// ── Command source ────────────────────────────────────────────

#[derive(Default)]
pub struct QueueSource {
    pub pending: VecDeque<Request>,
    pub replies: Vec<Reply>,
    next_id: u32,
    pub log: Option<CallLog>,
}

#[allow(dead_code)]
impl QueueSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command; returns its request id.
    pub fn push(&mut self, command: Command) -> u32 {
        self.next_id += 1;
        self.pending.push_back(Request {
            id: self.next_id,
            command,
        });
        self.next_id
    }

    pub fn response_to(&self, id: u32) -> Option<&Response> {
        self.replies.iter().find(|r| r.id == id).map(|r| &r.response)
    }
}

impl CommandSource for QueueSource {
    fn next_request(&mut self) -> Option<Request> {
        record(&self.log, "dispatch");
        self.pending.pop_front()
    }

    fn reply(&mut self, reply: Reply) {
        self.replies.push(reply);
    }
}

// ── Platform ──────────────────────────────────────────────────

pub struct FixedPlatform;

impl PlatformPort for FixedPlatform {
    fn uptime_secs(&self) -> u64 {
        3600
    }

    fn heap(&self) -> HeapStats {
        HeapStats {
            free_bytes: 150_000,
            min_free_bytes: 120_000,
        }
    }

    fn network(&self) -> NetworkStatus {
        NetworkStatus {
            connected: true,
            ssid: heapless::String::try_from("home").unwrap_or_default(),
            ip: heapless::String::try_from("192.168.1.40").unwrap_or_default(),
            rssi: Some(-55),
        }
    }
}
