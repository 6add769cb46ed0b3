//! Command bus between the HTTP handler task and the event loop.
//!
//! Uses `embassy-sync` bounded channels so the HTTP server's handler task
//! never touches controller state. Handlers enqueue a [`Request`] and block
//! (bounded) for the [`Reply`] carrying the same id; the loop drains the
//! request queue inside its dispatch step.
//!
//! ```text
//! ┌──────────────┐   Request    ┌──────────────┐
//! │ HTTP handler │────────────▶│  Event loop   │
//! │  (server)    │◀────────────│  (dispatch)   │
//! └──────────────┘    Reply     └──────────────┘
//! ```
//!
//! The ESP-IDF server runs every handler on one task, so at most one
//! request is outstanding; replies with an unknown id belong to requests
//! that already timed out and are discarded.

use core::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use crate::app::commands::{Command, Response};
use crate::error::CommsError;

/// Inbound command tagged with its correlation id.
#[derive(Debug)]
pub struct Request {
    pub id: u32,
    pub command: Command,
}

/// Outbound response for the request with the same id.
#[derive(Debug)]
pub struct Reply {
    pub id: u32,
    pub response: Response,
}

/// Where the event loop pulls commands from and sends answers to.
pub trait CommandSource {
    fn next_request(&mut self) -> Option<Request>;

    fn reply(&mut self, reply: Reply);
}

const REQUEST_DEPTH: usize = 4;
const REPLY_DEPTH: usize = 4;

/// Granularity of the requester's reply poll.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct CommandBus {
    requests: Channel<CriticalSectionRawMutex, Request, REQUEST_DEPTH>,
    replies: Channel<CriticalSectionRawMutex, Reply, REPLY_DEPTH>,
    next_id: AtomicU32,
}

/// Process-wide bus shared by the HTTP routes and `main`.
pub static BUS: CommandBus = CommandBus::new();

impl CommandBus {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            replies: Channel::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Send `command` to the loop and wait up to `timeout` for its answer.
    pub fn request(&self, command: Command, timeout: Duration) -> Result<Response, CommsError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.requests
            .try_send(Request { id, command })
            .map_err(|_| CommsError::BusFull)?;

        let deadline = Instant::now() + timeout;
        loop {
            while let Ok(reply) = self.replies.try_receive() {
                if reply.id == id {
                    return Ok(reply.response);
                }
                log::debug!("bus: discarding stale reply #{}", reply.id);
            }
            if Instant::now() >= deadline {
                log::warn!("bus: request #{id} timed out");
                return Err(CommsError::BusTimeout);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Like [`request`](Self::request), but when `command` times out it
    /// stays queued and the loop will still run it, so `undo` is queued
    /// right behind it.
    pub fn request_or_undo(
        &self,
        command: Command,
        undo: Command,
        timeout: Duration,
    ) -> Result<Response, CommsError> {
        let result = self.request(command, timeout);
        if matches!(result, Err(CommsError::BusTimeout)) {
            self.send_best_effort(undo, timeout);
        }
        result
    }

    /// Send `command` and only log if it cannot be delivered or answered.
    pub fn send_best_effort(&self, command: Command, timeout: Duration) {
        match self.request(command, timeout) {
            Ok(_) => {}
            // Queued: the loop runs it even though nobody waits for the answer.
            Err(CommsError::BusTimeout) => {
                log::warn!("bus: follow-up command queued but unanswered");
            }
            Err(e) => log::warn!("bus: follow-up command not delivered: {e}"),
        }
    }

    /// Requests waiting for the loop.
    pub fn pending(&self) -> usize {
        self.requests.len()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSource for &CommandBus {
    fn next_request(&mut self) -> Option<Request> {
        self.requests.try_receive().ok()
    }

    fn reply(&mut self, reply: Reply) {
        if let Err(TrySendError::Full(reply)) = self.replies.try_send(reply) {
            log::warn!("bus: reply queue full, dropping reply #{}", reply.id);
        }
    }
}
