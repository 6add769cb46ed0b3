//! Single-colour status LED.
//!
//! Renders the device [`IndicatorState`] on any `embedded-hal` output pin:
//!
//! | State        | Pattern                |
//! |--------------|------------------------|
//! | Idle         | off                    |
//! | Playing      | solid on               |
//! | Provisioning | 2 Hz blink (250 ms)    |
//!
//! On ESP-IDF the pin is a `PinDriver<_, Output>`; tests use a fake pin.

use embedded_hal::digital::OutputPin;

use crate::app::indicator::IndicatorState;

const BLINK_HALF_PERIOD_MS: u32 = 250;

pub struct StatusLed<P> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(mut pin: P) -> Self {
        let _ = pin.set_low();
        Self { pin, lit: false }
    }

    /// Drive the pin for `state` at time `now_ms`. Only level changes touch
    /// the GPIO.
    pub fn render(&mut self, state: IndicatorState, now_ms: u32) {
        let want = match state {
            IndicatorState::Idle => false,
            IndicatorState::Playing => true,
            IndicatorState::Provisioning => (now_ms / BLINK_HALF_PERIOD_MS) % 2 == 0,
        };
        if want == self.lit {
            return;
        }
        let result = if want {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if result.is_ok() {
            self.lit = want;
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}
