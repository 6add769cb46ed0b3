//! Chime firmware: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  HTTP server ──▶ CommandBus        FlashStore   I2sOutput     │
//! │  CaptivePortal   WifiManager       NvsAdapter   LogEventSink  │
//! │  ButtonTrigger   StatusLed         OtaUpdater   EspPlatform   │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  EventLoop: trigger · update · dispatch · playback     │  │
//! │  │  ChimeService: PlaybackController · UploadController   │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, PinDriver, Pull};
use esp_idf_hal::prelude::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use chime::adapters::audio_out::{I2sOutput, I2sPins};
use chime::adapters::device_id::{self, DeviceIdentity};
use chime::adapters::flash_store::FlashStore;
use chime::adapters::http;
use chime::adapters::log_sink::LogEventSink;
use chime::adapters::mdns::MdnsAdapter;
use chime::adapters::nvs::NvsAdapter;
use chime::adapters::platform::EspPlatform;
use chime::adapters::portal::CaptivePortal;
use chime::adapters::time::MonotonicClock;
use chime::adapters::wifi::{SharedWifi, WifiManager};
use chime::app::event_loop::{EventLoop, LoopControl};
use chime::app::events::AppEvent;
use chime::app::indicator::IndicatorState;
use chime::app::ports::{EventSink, PortalOutcome, ProvisioningPort};
use chime::app::service::ChimeService;
use chime::audio::WavDecoder;
use chime::config::SystemConfig;
use chime::dispatch::BUS;
use chime::drivers::button::ButtonTrigger;
use chime::drivers::status_led::StatusLed;
use chime::drivers::watchdog::Watchdog;
use chime::error::Error;
use chime::pins;
use chime::update::{self, OtaUpdater};

/// Forwards to the log sink and notes when the portal rejoined a network,
/// so mDNS can be re-registered on the new station interface.
struct MainSink {
    log: LogEventSink,
    rejoined: bool,
}

impl EventSink for MainSink {
    fn emit(&mut self, event: &AppEvent) {
        if matches!(event, AppEvent::ProvisioningExited(PortalOutcome::Connected)) {
            self.rejoined = true;
        }
        self.log.emit(event);
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Chime v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    update::check_rollback();

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Config ─────────────────────────────────────────────
    let config = match NvsAdapter::new() {
        Ok(nvs) => nvs.load_or_default(),
        Err(e) => {
            warn!("{}, running with defaults", Error::from(e));
            SystemConfig::default()
        }
    };

    let watchdog = Watchdog::new();
    let identity = DeviceIdentity::from_mac(&device_id::read_mac());
    info!(
        "Device ID: {} (hostname: {})",
        identity.device_id, identity.hostname
    );

    // ── 3. Storage (fatal on failure) ─────────────────────────
    let store = match FlashStore::mount() {
        Ok(store) => store,
        Err(e) => fatal_restart("storage mount", e.into(), config.restart_delay_ms),
    };

    // ── 4. Board I/O ──────────────────────────────────────────
    // SAFETY: each GPIO number is claimed once, here.
    let (button_pin, led_pin) = unsafe {
        (
            AnyInputPin::new(pins::BUTTON_GPIO),
            AnyOutputPin::new(pins::LED_GPIO),
        )
    };
    let mut button = PinDriver::input(button_pin)?;
    button.set_pull(Pull::Up)?;
    let mut trigger = ButtonTrigger::new(button);
    let led = Rc::new(RefCell::new(StatusLed::new(PinDriver::output(led_pin)?)));

    let output = I2sOutput::new(I2sPins {
        bclk: pins::I2S_BCLK_GPIO,
        ws: pins::I2S_WS_GPIO,
        dout: pins::I2S_DOUT_GPIO,
    });

    // ── 5. Network (fatal once provisioning fails too) ────────
    let wifi: SharedWifi = Arc::new(Mutex::new(WifiManager::new(
        peripherals.modem,
        sysloop,
        nvs_partition,
    )?));

    // Serves the portal form as well, so it comes up before the station.
    let _server = http::start_server(
        config.http_port,
        Duration::from_millis(u64::from(config.request_timeout_ms)),
    )?;

    let clock = MonotonicClock::new();
    let platform = EspPlatform::new(clock, Arc::clone(&wifi));
    // The portal blocks the loop, so it blinks the LED itself.
    let portal_led = Rc::clone(&led);
    let mut portal = CaptivePortal::new(
        Arc::clone(&wifi),
        identity.hostname.clone(),
        config.wifi_connect_retries,
        watchdog,
        move || {
            portal_led
                .borrow_mut()
                .render(IndicatorState::Provisioning, clock.now_ms());
        },
    );

    watchdog.pause();
    let joined = wifi
        .lock()
        .map_err(|_| anyhow::anyhow!("WiFi mutex poisoned"))?
        .connect_stored(config.wifi_connect_retries);
    watchdog.resume();
    if let Err(e) = joined {
        // First boot lands here too: nothing stored yet.
        warn!("{}, starting provisioning portal", e);
        match portal.run_portal(config.portal_timeout_secs) {
            PortalOutcome::Connected => info!("provisioned"),
            outcome => {
                warn!("portal ended with {:?}", outcome);
                fatal_restart("WiFi connect", e.into(), config.restart_delay_ms)
            }
        }
    }

    let mut mdns = MdnsAdapter::new(identity.clone(), config.http_port);
    mdns.start();

    // ── 6. Application core ───────────────────────────────────
    let service: ChimeService<FlashStore, WavDecoder, I2sOutput> =
        ChimeService::new(store, output, &config);
    let mut event_loop = EventLoop::new(service, OtaUpdater::new(), identity, config.clone());

    let mut sink = MainSink {
        log: LogEventSink::new(),
        rejoined: false,
    };
    event_loop.start(&mut sink);

    let mut commands = &BUS;
    let idle_yield = Duration::from_millis(u64::from(config.idle_yield_ms));

    info!("System ready. Entering event loop.");

    // ── 7. Event loop ─────────────────────────────────────────
    loop {
        let now_ms = clock.now_ms();
        let control = event_loop.run_once(
            now_ms,
            &mut trigger,
            &mut portal,
            &mut commands,
            &platform,
            &mut sink,
        );

        if let LoopControl::Restart { delay_ms, reason } = control {
            info!("Restarting in {} ms ({:?})", delay_ms, reason);
            restart_after(delay_ms);
        }

        if sink.rejoined {
            sink.rejoined = false;
            mdns.restart();
        }

        led.borrow_mut()
            .render(event_loop.service().indicator(), now_ms);
        watchdog.feed();

        // Playback needs every tick it can get; otherwise let the HTTP
        // task and the idle task run.
        if !event_loop.service().is_playing() {
            std::thread::sleep(idle_yield);
        }
    }
}

fn fatal_restart(what: &str, err: Error, delay_ms: u32) -> ! {
    error!("{} failed: {}, restarting", what, err);
    restart_after(delay_ms)
}

fn restart_after(delay_ms: u32) -> ! {
    std::thread::sleep(Duration::from_millis(u64::from(delay_ms)));
    // SAFETY: no invariants; the call does not return.
    unsafe { esp_idf_svc::sys::esp_restart() }
}
