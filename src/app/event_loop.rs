//! Cooperative main loop.
//!
//! One [`EventLoop::run_once`] call is one iteration, always in this order:
//!
//! 1. reconfiguration trigger (may enter the exclusive, blocking portal)
//! 2. update channel service
//! 3. command dispatch (drains every pending request)
//! 4. exactly one playback tick
//!
//! Dispatch may start a new playback session; the tick that follows always
//! sees the session dispatch left behind. While the portal runs nothing
//! else is serviced, and a running playback session is left suspended
//! until the portal returns.

use log::{info, warn};

use crate::adapters::device_id::DeviceIdentity;
use crate::config::SystemConfig;
use crate::dispatch::{CommandSource, Reply, Request};
use crate::settings::SettingsReport;

use super::commands::{
    Command, Response, REBOOT_ACK, RING_ACK, ROOT_INFO, UPDATE_ACK, UPLOAD_ACK, UPLOAD_FORM,
};
use super::events::AppEvent;
use super::ports::{
    AudioSink, Decoder, EventSink, PlatformPort, PortalOutcome, ProvisioningPort, ReconfigTrigger,
    RingtoneStore, UpdatePort, UpdateStatus,
};
use super::service::ChimeService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    RebootCommand,
    FirmwareUpdated,
    ProvisioningTimedOut,
    ProvisioningFailed,
}

/// What `main` should do after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    /// Pause for `delay_ms`, then restart the device.
    Restart { delay_ms: u32, reason: RestartReason },
}

pub struct EventLoop<S: RingtoneStore, D, O, U> {
    service: ChimeService<S, D, O>,
    updater: U,
    identity: DeviceIdentity,
    config: SystemConfig,
    iterations: u64,
}

impl<S, D, O, U> EventLoop<S, D, O, U>
where
    S: RingtoneStore,
    D: Decoder,
    O: AudioSink,
    U: UpdatePort,
{
    pub fn new(
        service: ChimeService<S, D, O>,
        updater: U,
        identity: DeviceIdentity,
        config: SystemConfig,
    ) -> Self {
        Self {
            service,
            updater,
            identity,
            config,
            iterations: 0,
        }
    }

    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.service.start(sink);
    }

    /// Run one iteration.
    pub fn run_once(
        &mut self,
        now_ms: u32,
        trigger: &mut impl ReconfigTrigger,
        portal: &mut impl ProvisioningPort,
        commands: &mut impl CommandSource,
        platform: &impl PlatformPort,
        sink: &mut impl EventSink,
    ) -> LoopControl {
        self.iterations += 1;

        // 1. Reconfiguration: exclusive mode, skips the rest of the iteration.
        if trigger.poll(now_ms) {
            return self.provision(portal, sink);
        }

        // 2. Update channel
        if self.updater.service() == UpdateStatus::RebootRequired {
            info!("firmware update staged, restarting");
            sink.emit(&AppEvent::RebootScheduled {
                delay_ms: self.config.reboot_delay_ms,
            });
            return LoopControl::Restart {
                delay_ms: self.config.reboot_delay_ms,
                reason: RestartReason::FirmwareUpdated,
            };
        }

        // 3. Dispatch
        if let Some(control) = self.dispatch(commands, platform, sink) {
            return control;
        }

        // 4. Playback
        self.service.tick(sink);
        LoopControl::Continue
    }

    pub fn service(&self) -> &ChimeService<S, D, O> {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut ChimeService<S, D, O> {
        &mut self.service
    }

    pub fn updater(&self) -> &U {
        &self.updater
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    // ── Internal ──────────────────────────────────────────────

    fn provision(
        &mut self,
        portal: &mut impl ProvisioningPort,
        sink: &mut impl EventSink,
    ) -> LoopControl {
        info!("reconfiguration requested, entering portal");
        self.service.enter_provisioning(sink);

        let outcome = portal.run_portal(self.config.portal_timeout_secs);
        sink.emit(&AppEvent::ProvisioningExited(outcome));

        let reason = match outcome {
            PortalOutcome::Connected => {
                self.service.exit_provisioning();
                return LoopControl::Continue;
            }
            PortalOutcome::TimedOut => RestartReason::ProvisioningTimedOut,
            PortalOutcome::Failed => RestartReason::ProvisioningFailed,
        };
        warn!("portal ended with {outcome:?}, restarting");
        LoopControl::Restart {
            delay_ms: self.config.restart_delay_ms,
            reason,
        }
    }

    /// Handle every queued request. Returns early after a reboot command;
    /// requests still queued behind it time out on the requester side.
    fn dispatch(
        &mut self,
        commands: &mut impl CommandSource,
        platform: &impl PlatformPort,
        sink: &mut impl EventSink,
    ) -> Option<LoopControl> {
        while let Some(Request { id, command }) = commands.next_request() {
            let reboot = command == Command::Reboot;
            let response = self.handle(command, platform, sink);
            commands.reply(Reply { id, response });

            if reboot {
                sink.emit(&AppEvent::RebootScheduled {
                    delay_ms: self.config.reboot_delay_ms,
                });
                return Some(LoopControl::Restart {
                    delay_ms: self.config.reboot_delay_ms,
                    reason: RestartReason::RebootCommand,
                });
            }
        }
        None
    }

    fn handle(
        &mut self,
        command: Command,
        platform: &impl PlatformPort,
        sink: &mut impl EventSink,
    ) -> Response {
        match command {
            Command::Ring => {
                self.service.ring(sink);
                Response::Ack(RING_ACK)
            }
            Command::Settings => Response::Settings(SettingsReport::collect(
                &self.identity,
                platform,
                self.service.status(),
            )),
            Command::Reboot => Response::Ack(REBOOT_ACK),
            Command::UploadInfo => Response::Text(UPLOAD_FORM),
            Command::Upload(event) => {
                self.service.upload(event, sink);
                Response::Ack(UPLOAD_ACK)
            }
            Command::Root => Response::Text(ROOT_INFO),
            Command::Update(event) => match self.updater.handle(event) {
                Ok(()) => Response::Ack(UPDATE_ACK),
                Err(e) => {
                    sink.emit(&AppEvent::UpdateFailed(e));
                    Response::Failed("update rejected")
                }
            },
        }
    }
}
