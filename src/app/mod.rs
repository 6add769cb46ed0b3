//! Application core: pure domain logic, zero I/O.
//!
//! Business rules for the chime: playback and upload lifecycles, indicator
//! arbitration and the cooperative event loop. All interaction with
//! hardware happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals.

pub mod commands;
pub mod event_loop;
pub mod events;
pub mod indicator;
pub mod playback;
pub mod ports;
pub mod service;
pub mod upload;
