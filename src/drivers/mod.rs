//! Board drivers: setup button, status LED and task watchdog.

pub mod button;
pub mod status_led;
pub mod watchdog;
