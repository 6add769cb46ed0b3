//! Debounced setup button with short and long press detection.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up (the BOOT button on most
//! ESP32 dev boards). The level is sampled once per loop iteration; the
//! gesture state machine below runs on those samples, so no ISR is needed.
//!
//! ## Gesture detection
//!
//! | Gesture     | Condition                       | Event        |
//! |-------------|---------------------------------|--------------|
//! | Short press | Released before `LONG_PRESS_MS` | `ShortPress` |
//! | Long press  | Held for `LONG_PRESS_MS`        | `LongPress`  |
//!
//! A long press fires while the button is still held and fires only once
//! per hold.

use embedded_hal::digital::InputPin;

use crate::app::ports::ReconfigTrigger;

const DEBOUNCE_MS: u32 = 50;
const LONG_PRESS_MS: u32 = 3000;

/// Button events emitted after gesture classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    ShortPress,
    LongPress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    DebounceWait { since_ms: u32 },
    Pressed { since_ms: u32 },
    /// Long press already reported; wait for release.
    Held,
}

#[derive(Debug)]
pub struct ButtonDriver {
    state: GestureState,
}

impl Default for ButtonDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonDriver {
    pub fn new() -> Self {
        Self {
            state: GestureState::Idle,
        }
    }

    /// Feed one level sample. `pressed` is the debounced-side logical level
    /// (true while the switch is closed).
    pub fn tick(&mut self, now_ms: u32, pressed: bool) -> Option<ButtonEvent> {
        match self.state {
            GestureState::Idle => {
                if pressed {
                    self.state = GestureState::DebounceWait { since_ms: now_ms };
                }
                None
            }

            GestureState::DebounceWait { since_ms } => {
                if !pressed {
                    // Bounce: never stable long enough.
                    self.state = GestureState::Idle;
                } else if now_ms.wrapping_sub(since_ms) >= DEBOUNCE_MS {
                    self.state = GestureState::Pressed { since_ms };
                }
                None
            }

            GestureState::Pressed { since_ms } => {
                if !pressed {
                    self.state = GestureState::Idle;
                    return Some(ButtonEvent::ShortPress);
                }
                if now_ms.wrapping_sub(since_ms) >= LONG_PRESS_MS {
                    self.state = GestureState::Held;
                    return Some(ButtonEvent::LongPress);
                }
                None
            }

            GestureState::Held => {
                if !pressed {
                    self.state = GestureState::Idle;
                }
                None
            }
        }
    }
}

/// Reconfiguration trigger: a long press on an active-low input pin.
pub struct ButtonTrigger<P> {
    pin: P,
    driver: ButtonDriver,
}

impl<P: InputPin> ButtonTrigger<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            driver: ButtonDriver::new(),
        }
    }
}

impl<P: InputPin> ReconfigTrigger for ButtonTrigger<P> {
    fn poll(&mut self, now_ms: u32) -> bool {
        // A pin read error counts as released.
        let pressed = self.pin.is_low().unwrap_or(false);
        match self.driver.tick(now_ms, pressed) {
            Some(ButtonEvent::LongPress) => true,
            Some(ButtonEvent::ShortPress) => {
                log::debug!("button: short press ignored");
                false
            }
            None => false,
        }
    }
}
