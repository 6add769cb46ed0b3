//! Chime firmware library.
//!
//! Exposes the pure-logic modules for integration testing. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod audio;
pub mod config;
pub mod dispatch;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod settings;
pub mod update;
